//! Jobs and tasks.

use std::cell::RefCell;
use std::rc::Rc;

use batchsim_core::Signal;

pub type JobId = u64;
pub type TaskId = u64;
pub type NodeId = usize;

/// Smallest schedulable unit of processing.
///
/// Tasks are shared between the master and compute nodes as `Rc<Task>` and compared by identity.
#[derive(Debug)]
pub struct Task {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub duration: f64,
    pub dataset_size: f64,
    ready_signal: RefCell<Option<Rc<Signal>>>,
}

impl Task {
    pub fn new(job_id: JobId, task_id: TaskId, duration: f64, dataset_size: f64) -> Self {
        Self {
            job_id,
            task_id,
            duration,
            dataset_size,
            ready_signal: RefCell::new(None),
        }
    }

    /// Returns the signal fired once the dataset is available at the node the task is queued on.
    pub fn ready_signal(&self) -> Option<Rc<Signal>> {
        self.ready_signal.borrow().clone()
    }

    /// Binds the task to a dataset transfer, replacing the previous one.
    pub fn set_ready_signal(&self, signal: Rc<Signal>) {
        *self.ready_signal.borrow_mut() = Some(signal);
    }
}

/// Collection of tasks with identical duration sharing one dataset.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub tasks: Vec<Rc<Task>>,
    pub dataset_size: f64,
    pub submission_time: f64,
}

impl Job {
    pub fn new(id: JobId, tasks_duration: f64, nb_tasks: usize, dataset_size: f64, submission_time: f64) -> Self {
        let tasks = (0..nb_tasks as TaskId)
            .map(|task_id| Rc::new(Task::new(id, task_id, tasks_duration, dataset_size)))
            .collect();
        Self {
            id,
            tasks,
            dataset_size,
            submission_time,
        }
    }
}
