//! Compute node.

use std::cell::RefCell;
use std::rc::Rc;

use batchsim_core::{log_debug, log_error, Resource, Signal, SimulationContext, Store};

use crate::job::{JobId, NodeId, Task};
use crate::tracker::Tracker;

/// Node executing queued tasks one at a time.
///
/// The node bandwidth limits the number of concurrent dataset transfers to the node,
/// each transfer takes `dataset_size / bandwidth` time.
pub struct ComputeNode {
    id: NodeId,
    bandwidth: u32,
    inbox: Store<Rc<Task>>,
    bandwidth_lock: Resource,
    tracker: Rc<RefCell<Tracker>>,
    ctx: SimulationContext,
}

impl ComputeNode {
    pub fn new(id: NodeId, bandwidth: u32, tracker: Rc<RefCell<Tracker>>, ctx: SimulationContext) -> Self {
        Self {
            id,
            bandwidth,
            inbox: Store::new(),
            bandwidth_lock: Resource::new(bandwidth as usize),
            tracker,
            ctx,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    /// Queue of tasks assigned to the node and not yet picked up for execution.
    pub fn inbox(&self) -> &Store<Rc<Task>> {
        &self.inbox
    }

    pub fn bandwidth_lock(&self) -> &Resource {
        &self.bandwidth_lock
    }

    pub fn transfer_time(&self, dataset_size: f64) -> f64 {
        dataset_size / self.bandwidth as f64
    }

    /// Transfers a job dataset to the node and fires `ready` once it is there.
    pub async fn receive_dataset(self: Rc<Self>, job_id: JobId, dataset_size: f64, ready: Rc<Signal>) {
        let _slot = self.bandwidth_lock.acquire().await;
        let start_time = self.ctx.time();
        self.ctx.sleep(self.transfer_time(dataset_size)).await;
        let end_time = self.ctx.time();
        self.tracker
            .borrow_mut()
            .log_transfer(job_id, self.id, start_time, end_time, dataset_size);
        ready.fire();
    }

    /// Main loop of the node: takes tasks from the inbox and executes them sequentially.
    pub async fn process_tasks(self: Rc<Self>) {
        loop {
            let task = self.inbox.get().await;
            log_debug!(
                self.ctx,
                "got task {} of job {} with duration {:.3}",
                task.task_id,
                task.job_id,
                task.duration
            );

            let ready = match task.ready_signal() {
                Some(ready) => ready,
                None => {
                    log_error!(
                        self.ctx,
                        "task {} of job {} has no dataset transfer, skipping it",
                        task.task_id,
                        task.job_id
                    );
                    continue;
                }
            };
            ready.wait().await;

            let start_time = self.ctx.time();
            self.tracker
                .borrow_mut()
                .log_task_start(task.job_id, task.task_id, self.id, start_time);
            self.ctx.sleep(task.duration).await;
            let end_time = self.ctx.time();
            self.tracker
                .borrow_mut()
                .log_task_end(task.job_id, task.task_id, self.id, start_time, end_time);
        }
    }
}
