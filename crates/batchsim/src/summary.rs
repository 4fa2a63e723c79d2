//! Summary of a simulation run.

use serde::{Deserialize, Serialize};

use crate::tracker::Tracker;

/// Contains metrics collected from a simulation run.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct RunSummary {
    /// Latest task end time.
    pub total_wall_time: f64,
    /// Number of dataset transfers, including the ones caused by rescheduling.
    pub total_nb_transfers: u64,
    /// Total amount of transferred data (in MB).
    pub total_transferred_bytes: f64,
    pub total_nb_tasks_processed: u64,
    /// Sum of task execution times.
    pub total_tasks_duration: f64,
    /// Mean time between job registration and the end of its last task.
    pub mean_job_processing_time: f64,
    pub nb_rescheduled_jobs: usize,
    /// Simulation time when the run ended.
    pub simulation_time: f64,
}

impl RunSummary {
    pub fn new(tracker: &Tracker, nb_rescheduled_jobs: usize, simulation_time: f64) -> Self {
        Self {
            total_wall_time: tracker.total_wall_time(),
            total_nb_transfers: tracker.total_nb_transfers(),
            total_transferred_bytes: tracker.total_transferred_bytes(),
            total_nb_tasks_processed: tracker.total_nb_tasks_processed(),
            total_tasks_duration: tracker.total_tasks_duration(),
            mean_job_processing_time: tracker.mean_job_processing_time(),
            nb_rescheduled_jobs,
            simulation_time,
        }
    }
}
