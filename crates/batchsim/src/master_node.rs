//! Master node: job placement and rescheduling.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use batchsim_core::{log_debug, log_info, log_warn, Signal, SimulationContext, Store};

use crate::compute_node::ComputeNode;
use crate::job::{Job, JobId, Task};
use crate::tracker::{OngoingTask, Tracker};

/// Period of the rescheduling loop.
pub const RESCHEDULE_PERIOD: f64 = 1.;

/// Master's bookkeeping of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobRecord {
    pub dataset_size: f64,
    pub nb_rescheduled: u32,
}

enum Reschedule {
    NotNeeded,
    Moved,
    NothingQueued,
}

/// Number of tasks sent to each of the `nb_nodes` nodes selected for a job.
///
/// Tasks left after giving this many tasks to every node are not assigned anywhere.
pub fn tasks_per_node(nb_tasks: usize, nb_nodes: usize) -> usize {
    (nb_tasks / nb_nodes).max(1)
}

pub struct MasterNode {
    inbox: Store<Job>,
    compute_nodes: Vec<Rc<ComputeNode>>,
    tracker: Rc<RefCell<Tracker>>,
    replication_factor: usize,
    total_nb_jobs: usize,
    all_jobs: RefCell<IndexMap<JobId, JobRecord>>,
    rescheduling_stopped_at: Cell<Option<f64>>,
    ctx: SimulationContext,
}

impl MasterNode {
    pub fn new(
        compute_nodes: Vec<Rc<ComputeNode>>,
        tracker: Rc<RefCell<Tracker>>,
        replication_factor: usize,
        total_nb_jobs: usize,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            inbox: Store::new(),
            compute_nodes,
            tracker,
            replication_factor,
            total_nb_jobs,
            all_jobs: RefCell::new(IndexMap::new()),
            rescheduling_stopped_at: Cell::new(None),
            ctx,
        }
    }

    /// Queues a new job for placement.
    pub fn submit(&self, job: Job) {
        self.inbox.put(job);
    }

    pub fn inbox(&self) -> &Store<Job> {
        &self.inbox
    }

    pub fn compute_nodes(&self) -> &[Rc<ComputeNode>] {
        &self.compute_nodes
    }

    pub fn job_record(&self, job_id: JobId) -> Option<JobRecord> {
        self.all_jobs.borrow().get(&job_id).copied()
    }

    pub fn nb_submitted_jobs(&self) -> usize {
        self.all_jobs.borrow().len()
    }

    pub fn nb_rescheduled_jobs(&self) -> usize {
        self.all_jobs
            .borrow()
            .values()
            .filter(|record| record.nb_rescheduled > 0)
            .count()
    }

    /// Time when the rescheduling loop exited, `None` while it runs or if it was never started.
    pub fn rescheduling_stopped_at(&self) -> Option<f64> {
        self.rescheduling_stopped_at.get()
    }

    /// Returns `k` nodes with the shortest inboxes, ties are broken by node index.
    pub fn select_least_loaded_nodes(&self, k: usize) -> Vec<Rc<ComputeNode>> {
        let mut indexes: Vec<usize> = (0..self.compute_nodes.len()).collect();
        indexes.sort_by_key(|&i| self.compute_nodes[i].inbox().len());
        indexes
            .into_iter()
            .take(k)
            .map(|i| self.compute_nodes[i].clone())
            .collect()
    }

    /// Main loop of the master: places submitted jobs one by one.
    pub async fn submit_jobs(self: Rc<Self>) {
        loop {
            let job = self.inbox.get().await;
            self.place_job(job);
        }
    }

    fn place_job(&self, job: Job) {
        log_debug!(
            self.ctx,
            "got job {} with {} tasks, dataset size {:.3}",
            job.id,
            job.tasks.len(),
            job.dataset_size
        );
        self.all_jobs.borrow_mut().insert(
            job.id,
            JobRecord {
                dataset_size: job.dataset_size,
                nb_rescheduled: 0,
            },
        );
        self.tracker.borrow_mut().register_job(job.id, self.ctx.time());

        let nodes = self.select_least_loaded_nodes(self.replication_factor);
        let tasks_per_node = tasks_per_node(job.tasks.len(), self.replication_factor);
        let mut unassigned = job.tasks.iter();
        for node in nodes {
            let ready = self.start_transfer(job.id, job.dataset_size, &node);
            let mut nb_sent = 0;
            for task in unassigned.by_ref().take(tasks_per_node) {
                task.set_ready_signal(ready.clone());
                node.inbox().put(task.clone());
                nb_sent += 1;
            }
            log_debug!(self.ctx, "sent {} tasks of job {} to node {}", nb_sent, job.id, node.id());
        }

        let nb_left = unassigned.count();
        if nb_left > 0 {
            log_warn!(
                self.ctx,
                "{} of {} tasks of job {} are not assigned to any node",
                nb_left,
                job.tasks.len(),
                job.id
            );
        }
    }

    fn start_transfer(&self, job_id: JobId, dataset_size: f64, node: &Rc<ComputeNode>) -> Rc<Signal> {
        let ready = self.ctx.create_signal();
        self.ctx
            .spawn(node.clone().receive_dataset(job_id, dataset_size, ready.clone()));
        ready
    }

    /// Periodically moves queued tasks of jobs whose processing lasts longer than their dataset transfer.
    ///
    /// Each job is rescheduled at most once. The loop stops when all jobs are submitted and no work is left.
    /// It also stops for good when a lagging job has no queued tasks on the node where it runs.
    pub async fn reschedule(self: Rc<Self>) {
        loop {
            self.ctx.sleep(RESCHEDULE_PERIOD).await;

            let ongoing: Vec<(JobId, OngoingTask)> = self
                .tracker
                .borrow()
                .ongoing_tasks()
                .iter()
                .map(|(&(job_id, _), &task)| (job_id, task))
                .collect();
            for (job_id, task) in ongoing {
                if let Reschedule::NothingQueued = self.reschedule_job(job_id, &task) {
                    log_warn!(
                        self.ctx,
                        "job {} has no queued tasks on node {}, rescheduling is stopped",
                        job_id,
                        task.node_id
                    );
                    self.rescheduling_stopped_at.set(Some(self.ctx.time()));
                    return;
                }
            }

            if self.is_finished() {
                log_info!(self.ctx, "all jobs are processed, rescheduling is finished");
                self.rescheduling_stopped_at.set(Some(self.ctx.time()));
                break;
            }
        }
    }

    fn reschedule_job(&self, job_id: JobId, running: &OngoingTask) -> Reschedule {
        let node = &self.compute_nodes[running.node_id];
        let elapsed = self.ctx.time() - running.start_time;
        let dataset_size = {
            let mut all_jobs = self.all_jobs.borrow_mut();
            let record = match all_jobs.get_mut(&job_id) {
                Some(record) => record,
                None => return Reschedule::NotNeeded,
            };
            if elapsed <= node.transfer_time(record.dataset_size) || record.nb_rescheduled >= 1 {
                return Reschedule::NotNeeded;
            }
            record.nb_rescheduled += 1;
            record.dataset_size
        };
        log_debug!(
            self.ctx,
            "job {} is rescheduled: task processing on node {} takes longer than transfer",
            job_id,
            node.id()
        );

        let mut moved: Vec<Rc<Task>> = node
            .inbox()
            .items()
            .into_iter()
            .filter(|task| task.job_id == job_id)
            .collect();
        if moved.is_empty() {
            return Reschedule::NothingQueued;
        }
        // newest half, tail of the queue first
        let nb_moved = (moved.len() + 1) / 2;
        moved.reverse();
        moved.truncate(nb_moved);
        node.inbox()
            .remove_where(|task| moved.iter().any(|m| Rc::ptr_eq(m, task)));

        let target = self.select_least_loaded_nodes(1).remove(0);
        let ready = self.start_transfer(job_id, dataset_size, &target);
        for task in moved {
            task.set_ready_signal(ready.clone());
            target.inbox().put(task);
        }
        log_debug!(
            self.ctx,
            "moved {} tasks of job {} from node {} to node {}",
            nb_moved,
            job_id,
            node.id(),
            target.id()
        );
        Reschedule::Moved
    }

    fn is_finished(&self) -> bool {
        self.nb_submitted_jobs() == self.total_nb_jobs
            && self.tracker.borrow().ongoing_tasks().is_empty()
            && self.inbox.is_empty()
            && self.compute_nodes.iter().all(|node| node.inbox().is_empty())
    }
}
