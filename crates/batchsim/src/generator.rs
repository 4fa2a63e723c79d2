//! Stochastic job arrivals.

use std::rc::Rc;

use rand_distr::Exp;

use batchsim_core::{log_debug, SimulationContext};

use crate::config::SimulationConfig;
use crate::job::{Job, JobId};
use crate::master_node::MasterNode;

/// Produces the configured number of jobs with random parameters and exponential inter-arrival times.
pub struct JobGenerator {
    total_nb_jobs: usize,
    nb_tasks: (usize, usize),
    task_duration: (f64, f64),
    dataset_size: (f64, f64),
    inter_arrival: Exp<f64>,
    master: Rc<MasterNode>,
    ctx: SimulationContext,
}

impl JobGenerator {
    pub fn new(config: &SimulationConfig, master: Rc<MasterNode>, ctx: SimulationContext) -> Result<Self, String> {
        let inter_arrival = Exp::new(config.jobs_inter_arrival_expovariate).map_err(|e| {
            format!(
                "Bad jobs_inter_arrival_expovariate {}: {}",
                config.jobs_inter_arrival_expovariate, e
            )
        })?;
        Ok(Self {
            total_nb_jobs: config.total_nb_jobs,
            nb_tasks: (config.min_nb_tasks_per_job, config.max_nb_tasks_per_job),
            task_duration: (config.min_task_duration_sec, config.max_task_duration_sec),
            dataset_size: (config.min_dataset_size_mb, config.max_dataset_size_mb),
            inter_arrival,
            master,
            ctx,
        })
    }

    pub async fn run(self) {
        for job_id in 0..self.total_nb_jobs as JobId {
            let nb_tasks = self.ctx.gen_range(self.nb_tasks.0..=self.nb_tasks.1);
            let task_duration = self.uniform(self.task_duration);
            let dataset_size = self.uniform(self.dataset_size);
            log_debug!(
                self.ctx,
                "new job {}: {} tasks of {:.3} s, dataset {:.3} MB",
                job_id,
                nb_tasks,
                task_duration,
                dataset_size
            );
            self.master
                .submit(Job::new(job_id, task_duration, nb_tasks, dataset_size, self.ctx.time()));

            let delay = self.ctx.sample_from_distribution(&self.inter_arrival);
            self.ctx.sleep(delay).await;
        }
    }

    fn uniform(&self, (min, max): (f64, f64)) -> f64 {
        if min == max {
            min
        } else {
            self.ctx.gen_range(min..=max)
        }
    }
}
