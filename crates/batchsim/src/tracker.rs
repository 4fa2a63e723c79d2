//! Recording of transfers and task executions.

use std::fs::File;
use std::io::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use batchsim_core::{log_debug, log_warn, SimulationContext};

use crate::job::{JobId, NodeId, TaskId};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Transfer,
    Processing,
}

/// Entry of the events history.
///
/// Processing produces two entries per task: one without `end` when the task starts
/// and a complete one when it finishes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackedEvent {
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_id: Option<TaskId>,
    pub node_id: NodeId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub start: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transferred_bytes: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct OngoingTask {
    pub node_id: NodeId,
    pub start_time: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct JobTimes {
    pub start_time: f64,
    pub end_time: f64,
}

/// Passive recorder of everything that happens to jobs during the run.
///
/// Holds the set of currently running tasks, the events history and aggregate counters.
pub struct Tracker {
    ongoing_tasks: IndexMap<(JobId, TaskId), OngoingTask>,
    events_history: Vec<TrackedEvent>,
    total_nb_transfers: u64,
    total_transferred_bytes: f64,
    total_nb_tasks_processed: u64,
    total_tasks_duration: f64,
    total_wall_time: f64,
    tasks_duration_per_job: IndexMap<JobId, JobTimes>,
    ctx: SimulationContext,
}

impl Tracker {
    pub fn new(ctx: SimulationContext) -> Self {
        Self {
            ongoing_tasks: IndexMap::new(),
            events_history: Vec::new(),
            total_nb_transfers: 0,
            total_transferred_bytes: 0.,
            total_nb_tasks_processed: 0,
            total_tasks_duration: 0.,
            total_wall_time: 0.,
            tasks_duration_per_job: IndexMap::new(),
            ctx,
        }
    }

    /// Seeds the per-job timing entry. Repeated calls for the same job are ignored.
    pub fn register_job(&mut self, job_id: JobId, start_time: f64) {
        self.tasks_duration_per_job.entry(job_id).or_insert(JobTimes {
            start_time,
            end_time: 0.,
        });
    }

    pub fn log_transfer(&mut self, job_id: JobId, node_id: NodeId, start_time: f64, end_time: f64, dataset_size: f64) {
        self.events_history.push(TrackedEvent {
            job_id,
            task_id: None,
            node_id,
            kind: EventKind::Transfer,
            start: start_time,
            end: Some(end_time),
            transferred_bytes: Some(dataset_size),
        });
        log_debug!(
            self.ctx,
            "transfer for job {} to node {} took {:.3}",
            job_id,
            node_id,
            end_time - start_time
        );
        self.total_nb_transfers += 1;
        self.total_transferred_bytes += dataset_size;
    }

    pub fn log_task_start(&mut self, job_id: JobId, task_id: TaskId, node_id: NodeId, start_time: f64) {
        self.events_history.push(TrackedEvent {
            job_id,
            task_id: Some(task_id),
            node_id,
            kind: EventKind::Processing,
            start: start_time,
            end: None,
            transferred_bytes: None,
        });
        self.ongoing_tasks
            .insert((job_id, task_id), OngoingTask { node_id, start_time });
        log_debug!(self.ctx, "task {} of job {} started on node {}", task_id, job_id, node_id);
    }

    /// Records the completion of a running task.
    ///
    /// Returns `false` without recording anything if the task is not running,
    /// e.g. it was already reported as completed.
    pub fn log_task_end(
        &mut self,
        job_id: JobId,
        task_id: TaskId,
        node_id: NodeId,
        start_time: f64,
        end_time: f64,
    ) -> bool {
        if self.ongoing_tasks.shift_remove(&(job_id, task_id)).is_none() {
            log_warn!(
                self.ctx,
                "ignoring end of task {} of job {} which is not running",
                task_id,
                job_id
            );
            return false;
        }
        self.events_history.push(TrackedEvent {
            job_id,
            task_id: Some(task_id),
            node_id,
            kind: EventKind::Processing,
            start: start_time,
            end: Some(end_time),
            transferred_bytes: None,
        });
        log_debug!(self.ctx, "task {} of job {} completed on node {}", task_id, job_id, node_id);
        self.total_nb_tasks_processed += 1;
        self.total_tasks_duration += end_time - start_time;
        self.total_wall_time = self.total_wall_time.max(end_time);
        if let Some(times) = self.tasks_duration_per_job.get_mut(&job_id) {
            times.end_time = times.end_time.max(end_time);
        }
        true
    }

    /// Tasks which have started and not yet ended, in the order they started.
    pub fn ongoing_tasks(&self) -> &IndexMap<(JobId, TaskId), OngoingTask> {
        &self.ongoing_tasks
    }

    pub fn events_history(&self) -> &[TrackedEvent] {
        &self.events_history
    }

    pub fn total_nb_transfers(&self) -> u64 {
        self.total_nb_transfers
    }

    pub fn total_transferred_bytes(&self) -> f64 {
        self.total_transferred_bytes
    }

    pub fn total_nb_tasks_processed(&self) -> u64 {
        self.total_nb_tasks_processed
    }

    pub fn total_tasks_duration(&self) -> f64 {
        self.total_tasks_duration
    }

    /// Latest task end time seen so far.
    pub fn total_wall_time(&self) -> f64 {
        self.total_wall_time
    }

    pub fn tasks_duration_per_job(&self) -> &IndexMap<JobId, JobTimes> {
        &self.tasks_duration_per_job
    }

    /// Mean of `end_time - start_time` over registered jobs, or 0 if there are none.
    pub fn mean_job_processing_time(&self) -> f64 {
        if self.tasks_duration_per_job.is_empty() {
            return 0.;
        }
        let total: f64 = self
            .tasks_duration_per_job
            .values()
            .map(|times| times.end_time - times.start_time)
            .sum();
        total / self.tasks_duration_per_job.len() as f64
    }

    /// Writes the events history to a JSON file.
    pub fn save_events_history(&self, filename: &str) -> Result<(), String> {
        let data = serde_json::to_string_pretty(&self.events_history).map_err(|e| e.to_string())?;
        File::create(filename)
            .and_then(|mut file| file.write_all(data.as_bytes()))
            .map_err(|e| format!("Can't write events history to {}: {}", filename, e))
    }
}
