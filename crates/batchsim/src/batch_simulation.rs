//! Simulation of the whole cluster.

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use batchsim_core::Simulation;

use crate::compute_node::ComputeNode;
use crate::config::SimulationConfig;
use crate::generator::JobGenerator;
use crate::master_node::MasterNode;
use crate::summary::RunSummary;
use crate::tracker::Tracker;

/// Cluster of compute nodes with a master node and a job generator.
///
/// All processes are spawned on creation and start with the first simulation step,
/// in order: master, rescheduler (if enabled), compute nodes, generator.
pub struct BatchSimulation {
    sim: Simulation,
    config: SimulationConfig,
    tracker: Rc<RefCell<Tracker>>,
    master: Rc<MasterNode>,
}

impl BatchSimulation {
    pub fn new(seed: u64, config: SimulationConfig) -> Result<Self, String> {
        config.validate()?;
        let mut sim = Simulation::new(seed);

        let tracker = rc!(refcell!(Tracker::new(sim.create_context("tracker"))));
        let master_ctx = sim.create_context("master");
        let compute_nodes: Vec<Rc<ComputeNode>> = (0..config.total_nb_compute_nodes)
            .map(|id| {
                rc!(ComputeNode::new(
                    id,
                    config.compute_node_bw_mbps,
                    tracker.clone(),
                    sim.create_context(format!("compute-{}", id)),
                ))
            })
            .collect();
        let master = rc!(MasterNode::new(
            compute_nodes.clone(),
            tracker.clone(),
            config.replication_factor,
            config.total_nb_jobs,
            master_ctx,
        ));
        let generator = JobGenerator::new(&config, master.clone(), sim.create_context("generator"))?;

        sim.spawn(master.clone().submit_jobs());
        if config.reschedule {
            sim.spawn(master.clone().reschedule());
        }
        for node in compute_nodes {
            sim.spawn(node.process_tasks());
        }
        sim.spawn(generator.run());

        Ok(Self {
            sim,
            config,
            tracker,
            master,
        })
    }

    /// Runs the simulation until no process can make progress.
    pub fn run(&mut self) -> RunSummary {
        self.sim.step_until_no_events();
        self.summary()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            &self.tracker.borrow(),
            self.master.nb_rescheduled_jobs(),
            self.sim.time(),
        )
    }

    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn time(&self) -> f64 {
        self.sim.time()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tracker(&self) -> Rc<RefCell<Tracker>> {
        self.tracker.clone()
    }

    pub fn master(&self) -> Rc<MasterNode> {
        self.master.clone()
    }
}

/// Runs a single simulation with the given config and returns its tracker.
pub fn run_simulation(seed: u64, config: SimulationConfig) -> Result<Rc<RefCell<Tracker>>, String> {
    let mut sim = BatchSimulation::new(seed, config)?;
    sim.run();
    Ok(sim.tracker())
}
