//! Simulation configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Represents simulation configuration.
///
/// Key names match the ones used in configuration files, e.g. `min_dataset_size_MB`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Number of jobs produced by the generator.
    pub total_nb_jobs: usize,
    /// Number of compute nodes in the cluster.
    pub total_nb_compute_nodes: usize,
    /// Number of nodes the tasks of each job are initially spread across.
    pub replication_factor: usize,
    /// Minimum number of tasks in a job.
    pub min_nb_tasks_per_job: usize,
    /// Maximum number of tasks in a job.
    pub max_nb_tasks_per_job: usize,
    /// Minimum task duration in seconds.
    pub min_task_duration_sec: f64,
    /// Maximum task duration in seconds.
    pub max_task_duration_sec: f64,
    /// Minimum job dataset size in MB.
    #[serde(rename = "min_dataset_size_MB")]
    pub min_dataset_size_mb: f64,
    /// Maximum job dataset size in MB.
    #[serde(rename = "max_dataset_size_MB")]
    pub max_dataset_size_mb: f64,
    /// Rate of the exponential distribution of job inter-arrival times.
    pub jobs_inter_arrival_expovariate: f64,
    /// Bandwidth of each compute node in MB/s, also the number of concurrent transfers to the node.
    #[serde(rename = "compute_node_bw_MBps")]
    pub compute_node_bw_mbps: u32,
    /// Whether the master periodically reschedules tasks of lagging jobs.
    #[serde(default)]
    pub reschedule: bool,
}

impl SimulationConfig {
    /// Reads config from JSON file, or from YAML file if the file has `.yaml` or `.yml` extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("Can't read config from file {}: {}", path.display(), e))?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&data).map_err(|e| format!("Can't parse YAML config {}: {}", path.display(), e))
        } else {
            serde_json::from_str(&data).map_err(|e| format!("Can't parse JSON config {}: {}", path.display(), e))
        }
    }

    /// Checks that the config describes a runnable cluster.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_nb_jobs == 0 {
            return Err("total_nb_jobs must be positive".to_string());
        }
        if self.total_nb_compute_nodes == 0 {
            return Err("total_nb_compute_nodes must be positive".to_string());
        }
        if self.replication_factor == 0 || self.replication_factor > self.total_nb_compute_nodes {
            return Err(format!(
                "replication_factor must be in [1, {}], got {}",
                self.total_nb_compute_nodes, self.replication_factor
            ));
        }
        if self.compute_node_bw_mbps == 0 {
            return Err("compute_node_bw_MBps must be positive".to_string());
        }
        if self.min_nb_tasks_per_job == 0 {
            return Err("min_nb_tasks_per_job must be positive".to_string());
        }
        check_range(
            "nb_tasks_per_job",
            self.min_nb_tasks_per_job as f64,
            self.max_nb_tasks_per_job as f64,
        )?;
        check_range(
            "task_duration_sec",
            self.min_task_duration_sec,
            self.max_task_duration_sec,
        )?;
        check_range("dataset_size_MB", self.min_dataset_size_mb, self.max_dataset_size_mb)?;
        if !(self.jobs_inter_arrival_expovariate > 0. && self.jobs_inter_arrival_expovariate.is_finite()) {
            return Err(format!(
                "jobs_inter_arrival_expovariate must be positive, got {}",
                self.jobs_inter_arrival_expovariate
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<(), String> {
    if !(min >= 0. && min.is_finite() && max.is_finite()) {
        return Err(format!("min_{name} and max_{name} must be non-negative numbers"));
    }
    if min > max {
        return Err(format!("min_{name} ({min}) is greater than max_{name} ({max})"));
    }
    Ok(())
}
