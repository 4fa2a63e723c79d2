//! Replication factor campaign.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::batch_simulation::BatchSimulation;
use crate::config::SimulationConfig;

/// Contains result of one run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CampaignResult {
    pub replication_factor: usize,
    pub mean_job_processing_time: f64,
    pub total_transferred_bytes: f64,
    pub total_wall_time: f64,
}

/// Runs the base config once for every replication factor in `[1, total_nb_compute_nodes)`.
///
/// Every run uses the same seed, so all runs see the same jobs.
pub struct Campaign {
    base_config: SimulationConfig,
    seed: u64,
}

impl Campaign {
    pub fn new(base_config: SimulationConfig, seed: u64) -> Self {
        Self { base_config, seed }
    }

    /// Configs of all runs, ordered by replication factor.
    pub fn configs(&self) -> Vec<SimulationConfig> {
        (1..self.base_config.total_nb_compute_nodes)
            .map(|replication_factor| SimulationConfig {
                replication_factor,
                ..self.base_config.clone()
            })
            .collect()
    }

    /// Runs all simulations and returns results sorted by replication factor.
    pub fn run(&self, num_threads: usize) -> Result<Vec<CampaignResult>, String> {
        let configs = self.configs();
        for config in configs.iter() {
            config.validate()?;
        }
        let total_runs = configs.len();

        let finished_runs = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = channel();
        let pool = ThreadPool::new(num_threads.max(1));
        let start_time = Instant::now();
        for config in configs.into_iter() {
            let finished_runs = finished_runs.clone();
            let sender = sender.clone();
            let seed = self.seed;
            pool.execute(move || {
                let replication_factor = config.replication_factor;
                let result = BatchSimulation::new(seed, config).map(|mut sim| {
                    let summary = sim.run();
                    CampaignResult {
                        replication_factor,
                        mean_job_processing_time: summary.mean_job_processing_time,
                        total_transferred_bytes: summary.total_transferred_bytes,
                        total_wall_time: summary.total_wall_time,
                    }
                });
                // receiver outlives the pool
                let _ = sender.send(result);

                let finished = finished_runs.fetch_add(1, Ordering::SeqCst) + 1;
                print!("\r{}", " ".repeat(70));
                print!(
                    "\rFinished {}/{} runs in {:.2?}",
                    finished,
                    total_runs,
                    start_time.elapsed()
                );
                let _ = std::io::stdout().flush();
            });
        }
        drop(sender);
        pool.join();

        print!("\r{}", " ".repeat(70));
        println!("\rFinished {} runs in {:.2?}", total_runs, start_time.elapsed());

        let mut results = receiver.into_iter().collect::<Result<Vec<_>, String>>()?;
        results.sort_by_key(|result| result.replication_factor);
        Ok(results)
    }
}
