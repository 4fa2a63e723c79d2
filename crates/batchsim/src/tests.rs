use std::cell::Cell;
use std::rc::Rc;

use sugars::{rc, refcell};

use batchsim_core::Simulation;

use crate::batch_simulation::BatchSimulation;
use crate::campaign::Campaign;
use crate::compute_node::ComputeNode;
use crate::config::SimulationConfig;
use crate::job::{Job, JobId, NodeId, Task, TaskId};
use crate::master_node::{tasks_per_node, MasterNode};
use crate::tracker::{EventKind, TrackedEvent, Tracker};

fn fixed_config(
    total_nb_jobs: usize,
    total_nb_compute_nodes: usize,
    replication_factor: usize,
    nb_tasks: usize,
    task_duration: f64,
    dataset_size: f64,
    bandwidth: u32,
) -> SimulationConfig {
    SimulationConfig {
        total_nb_jobs,
        total_nb_compute_nodes,
        replication_factor,
        min_nb_tasks_per_job: nb_tasks,
        max_nb_tasks_per_job: nb_tasks,
        min_task_duration_sec: task_duration,
        max_task_duration_sec: task_duration,
        min_dataset_size_mb: dataset_size,
        max_dataset_size_mb: dataset_size,
        jobs_inter_arrival_expovariate: 1e6,
        compute_node_bw_mbps: bandwidth,
        reschedule: false,
    }
}

fn random_config() -> SimulationConfig {
    SimulationConfig {
        total_nb_jobs: 30,
        total_nb_compute_nodes: 4,
        replication_factor: 2,
        min_nb_tasks_per_job: 1,
        max_nb_tasks_per_job: 9,
        min_task_duration_sec: 1.,
        max_task_duration_sec: 20.,
        min_dataset_size_mb: 5.,
        max_dataset_size_mb: 50.,
        jobs_inter_arrival_expovariate: 0.2,
        compute_node_bw_mbps: 2,
        reschedule: true,
    }
}

fn transfers(events: &[TrackedEvent]) -> Vec<(JobId, NodeId, f64, f64)> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Transfer)
        .map(|e| (e.job_id, e.node_id, e.start, e.end.unwrap()))
        .collect()
}

fn completed_tasks(events: &[TrackedEvent]) -> Vec<(JobId, TaskId, NodeId, f64, f64)> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Processing && e.end.is_some())
        .map(|e| (e.job_id, e.task_id.unwrap(), e.node_id, e.start, e.end.unwrap()))
        .collect()
}

fn started_tasks(events: &[TrackedEvent]) -> Vec<(JobId, TaskId, NodeId)> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Processing && e.end.is_none())
        .map(|e| (e.job_id, e.task_id.unwrap(), e.node_id))
        .collect()
}

fn completed_on_node(events: &[TrackedEvent], node_id: NodeId) -> Vec<(TaskId, f64, f64)> {
    completed_tasks(events)
        .into_iter()
        .filter(|t| t.2 == node_id)
        .map(|t| (t.1, t.3, t.4))
        .collect()
}

#[test]
fn tasks_per_node_rounds_down_to_at_least_one() {
    assert_eq!(tasks_per_node(4, 1), 4);
    assert_eq!(tasks_per_node(5, 2), 2);
    assert_eq!(tasks_per_node(7, 3), 2);
    assert_eq!(tasks_per_node(2, 3), 1);
}

#[test]
fn config_validation() {
    let valid = fixed_config(1, 3, 2, 4, 5., 20., 2);
    assert!(valid.validate().is_ok());

    let mut config = valid.clone();
    config.total_nb_compute_nodes = 0;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.replication_factor = 0;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.replication_factor = 4;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.compute_node_bw_mbps = 0;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.min_task_duration_sec = 10.;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.min_dataset_size_mb = -1.;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.min_nb_tasks_per_job = 0;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.jobs_inter_arrival_expovariate = 0.;
    assert!(config.validate().is_err());

    let mut config = valid;
    config.compute_node_bw_mbps = 0;
    assert!(BatchSimulation::new(42, config).is_err());
}

#[test]
fn config_from_files() {
    let dir = std::env::temp_dir();
    let json_path = dir.join(format!("batchsim-config-{}.json", std::process::id()));
    std::fs::write(
        &json_path,
        r#"{
            "total_nb_jobs": 10,
            "total_nb_compute_nodes": 4,
            "replication_factor": 2,
            "min_nb_tasks_per_job": 1,
            "max_nb_tasks_per_job": 8,
            "min_task_duration_sec": 1.0,
            "max_task_duration_sec": 10.0,
            "min_dataset_size_MB": 10,
            "max_dataset_size_MB": 100,
            "jobs_inter_arrival_expovariate": 0.5,
            "compute_node_bw_MBps": 10
        }"#,
    )
    .unwrap();
    let config = SimulationConfig::from_file(&json_path).unwrap();
    std::fs::remove_file(&json_path).unwrap();
    assert_eq!(config.min_dataset_size_mb, 10.);
    assert_eq!(config.max_dataset_size_mb, 100.);
    assert_eq!(config.compute_node_bw_mbps, 10);
    assert!(!config.reschedule);

    let yaml_path = dir.join(format!("batchsim-config-{}.yaml", std::process::id()));
    std::fs::write(&yaml_path, serde_yaml::to_string(&config).unwrap()).unwrap();
    let from_yaml = SimulationConfig::from_file(&yaml_path).unwrap();
    std::fs::remove_file(&yaml_path).unwrap();
    assert_eq!(from_yaml, config);

    assert!(SimulationConfig::from_file(dir.join("batchsim-missing-config.json")).is_err());
}

#[test]
fn tracker_ignores_second_end_of_task() {
    let mut sim = Simulation::new(42);
    let mut tracker = Tracker::new(sim.create_context("tracker"));
    tracker.register_job(0, 0.);
    tracker.register_job(0, 5.);
    tracker.log_task_start(0, 0, 1, 2.);
    assert!(tracker.ongoing_tasks().contains_key(&(0, 0)));

    assert!(tracker.log_task_end(0, 0, 1, 2., 7.));
    assert!(tracker.ongoing_tasks().is_empty());
    let nb_events = tracker.events_history().len();

    assert!(!tracker.log_task_end(0, 0, 1, 2., 9.));
    assert_eq!(tracker.events_history().len(), nb_events);
    assert_eq!(tracker.total_nb_tasks_processed(), 1);
    assert_eq!(tracker.total_tasks_duration(), 5.);
    assert_eq!(tracker.total_wall_time(), 7.);
    assert_eq!(tracker.tasks_duration_per_job()[&0].start_time, 0.);
    assert_eq!(tracker.tasks_duration_per_job()[&0].end_time, 7.);
}

#[test]
fn tracker_aggregates() {
    let mut sim = Simulation::new(42);
    let mut tracker = Tracker::new(sim.create_context("tracker"));
    assert_eq!(tracker.mean_job_processing_time(), 0.);

    tracker.register_job(0, 0.);
    tracker.register_job(1, 4.);
    tracker.log_transfer(0, 0, 0., 2., 10.);
    tracker.log_transfer(1, 1, 4., 5., 3.);
    tracker.log_task_start(0, 0, 0, 2.);
    tracker.log_task_start(1, 0, 1, 5.);
    tracker.log_task_end(1, 0, 1, 5., 8.);
    tracker.log_task_end(0, 0, 0, 2., 12.);

    assert_eq!(tracker.total_nb_transfers(), 2);
    assert_eq!(tracker.total_transferred_bytes(), 13.);
    assert_eq!(tracker.total_wall_time(), 12.);
    // (12 - 0 + 8 - 4) / 2
    assert_eq!(tracker.mean_job_processing_time(), 8.);

    let json = serde_json::to_value(&tracker.events_history()[0]).unwrap();
    assert_eq!(json["type"], "transfer");
    assert_eq!(json["transferred_bytes"], 10.);
    assert!(json.get("task_id").is_none());
}

#[test]
fn least_loaded_selection_is_stable() {
    let mut sim = Simulation::new(42);
    let tracker = rc!(refcell!(Tracker::new(sim.create_context("tracker"))));
    let nodes: Vec<Rc<ComputeNode>> = (0..4)
        .map(|id| {
            rc!(ComputeNode::new(
                id,
                1,
                tracker.clone(),
                sim.create_context(format!("compute-{}", id))
            ))
        })
        .collect();
    let master = MasterNode::new(nodes.clone(), tracker, 2, 1, sim.create_context("master"));

    let task = |task_id| Rc::new(Task::new(0, task_id, 1., 1.));
    nodes[0].inbox().put(task(0));
    nodes[0].inbox().put(task(1));
    nodes[2].inbox().put(task(2));

    let ids = |k| {
        master
            .select_least_loaded_nodes(k)
            .iter()
            .map(|node| node.id())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(1), vec![1]);
    assert_eq!(ids(2), vec![1, 3]);
    assert_eq!(ids(4), vec![1, 3, 2, 0]);
}

#[test]
fn single_replica_runs_tasks_sequentially() {
    let mut sim = BatchSimulation::new(42, fixed_config(1, 3, 1, 4, 5., 20., 2)).unwrap();
    let summary = sim.run();
    let tracker = sim.tracker();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    assert_eq!(transfers(events), vec![(0, 0, 0., 10.)]);
    assert_eq!(started_tasks(events), vec![(0, 0, 0), (0, 1, 0), (0, 2, 0), (0, 3, 0)]);
    assert_eq!(
        completed_on_node(events, 0),
        vec![(0, 10., 15.), (1, 15., 20.), (2, 20., 25.), (3, 25., 30.)]
    );
    assert_eq!(completed_tasks(events).len(), 4);
    assert_eq!(summary.total_wall_time, 30.);
    assert_eq!(summary.total_transferred_bytes, 20.);
    assert_eq!(summary.total_nb_tasks_processed, 4);
    assert_eq!(summary.mean_job_processing_time, 30.);
}

#[test]
fn tasks_beyond_even_split_are_never_assigned() {
    let mut sim = BatchSimulation::new(42, fixed_config(1, 3, 2, 5, 5., 10., 1)).unwrap();
    let summary = sim.run();
    let tracker = sim.tracker();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    assert_eq!(transfers(events), vec![(0, 0, 0., 10.), (0, 1, 0., 10.)]);
    assert_eq!(completed_on_node(events, 0), vec![(0, 10., 15.), (1, 15., 20.)]);
    assert_eq!(completed_on_node(events, 1), vec![(2, 10., 15.), (3, 15., 20.)]);
    assert!(events.iter().all(|e| e.task_id != Some(4)));
    assert_eq!(summary.total_nb_tasks_processed, 4);
    assert!(sim.master().compute_nodes().iter().all(|node| node.inbox().is_empty()));
}

#[test]
fn replicas_without_tasks_still_receive_dataset() {
    let mut sim = BatchSimulation::new(42, fixed_config(1, 3, 3, 2, 5., 10., 1)).unwrap();
    let summary = sim.run();
    let tracker = sim.tracker();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    assert_eq!(summary.total_nb_transfers, 3);
    assert_eq!(summary.total_nb_tasks_processed, 2);
    assert!(completed_on_node(events, 2).is_empty());
}

#[test]
fn lagging_job_is_rescheduled_once() {
    let mut config = fixed_config(1, 2, 1, 6, 15., 10., 1);
    config.reschedule = true;
    let mut sim = BatchSimulation::new(42, config).unwrap();
    let summary = sim.run();
    let tracker = sim.tracker();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    // task 0 starts at 10 and exceeds the transfer time of 10 at 21,
    // then the newest half of the queued tasks goes to the idle node
    assert_eq!(transfers(events), vec![(0, 0, 0., 10.), (0, 1, 21., 31.)]);
    assert_eq!(
        completed_on_node(events, 0),
        vec![(0, 10., 25.), (1, 25., 40.), (2, 40., 55.)]
    );
    assert_eq!(
        completed_on_node(events, 1),
        vec![(5, 31., 46.), (4, 46., 61.), (3, 61., 76.)]
    );
    assert_eq!(summary.total_nb_transfers, 2);
    assert_eq!(summary.total_transferred_bytes, 20.);
    assert_eq!(summary.total_wall_time, 76.);
    assert_eq!(summary.nb_rescheduled_jobs, 1);
    assert_eq!(sim.master().job_record(0).unwrap().nb_rescheduled, 1);
    assert!(tracker.ongoing_tasks().is_empty());
}

#[test]
fn rescheduling_stops_when_lagging_job_has_nothing_queued() {
    let mut config = fixed_config(2, 1, 1, 1, 15., 10., 1);
    config.reschedule = true;
    let mut sim = BatchSimulation::new(42, config).unwrap();
    let summary = sim.run();
    let master = sim.master();

    // job 0 lags at 21 with no queued tasks, so job 1 lagging at 36 is never considered
    assert_eq!(master.job_record(0).unwrap().nb_rescheduled, 1);
    assert_eq!(master.job_record(1).unwrap().nb_rescheduled, 0);
    assert_eq!(master.rescheduling_stopped_at(), Some(21.));
    assert_eq!(summary.total_nb_transfers, 2);
    assert_eq!(summary.total_nb_tasks_processed, 2);
    assert_eq!(summary.total_wall_time, 40.);
}

#[test]
fn rescheduler_tick_precedes_wake_ups_at_transfer_end() {
    let mut sim = Simulation::new(42);
    let tracker = rc!(refcell!(Tracker::new(sim.create_context("tracker"))));
    let nodes: Vec<Rc<ComputeNode>> = (0..2)
        .map(|id| {
            rc!(ComputeNode::new(
                id,
                1,
                tracker.clone(),
                sim.create_context(format!("compute-{}", id))
            ))
        })
        .collect();
    let master = rc!(MasterNode::new(nodes.clone(), tracker.clone(), 1, 2, sim.create_context("master")));
    sim.spawn(master.clone().submit_jobs());
    sim.spawn(master.clone().reschedule());
    for node in &nodes {
        sim.spawn(node.clone().process_tasks());
    }
    // job 0 keeps node 0 busy until 29.5, the dataset of job 1 reaches node 1 exactly at tick 30
    master.submit(Job::new(0, 4.75, 2, 20., 0.));
    master.submit(Job::new(1, 5., 1, 30., 0.));

    sim.step_until_no_events();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    assert_eq!(transfers(events), vec![(0, 0, 0., 20.), (1, 1, 0., 30.)]);
    assert_eq!(completed_on_node(events, 0), vec![(0, 20., 24.75), (1, 24.75, 29.5)]);
    assert_eq!(completed_on_node(events, 1), vec![(0, 30., 35.)]);
    // the tick at 30 was scheduled before the transfer end woke the node,
    // so it sees no running tasks and empty queues
    assert_eq!(master.rescheduling_stopped_at(), Some(30.));
    assert_eq!(master.nb_rescheduled_jobs(), 0);
    assert_eq!(sim.time(), 35.);
}

#[test]
fn concurrent_transfers_are_limited_by_bandwidth() {
    let mut sim = Simulation::new(42);
    let tracker = rc!(refcell!(Tracker::new(sim.create_context("tracker"))));
    let node = rc!(ComputeNode::new(0, 2, tracker.clone(), sim.create_context("compute-0")));
    let master = rc!(MasterNode::new(vec![node.clone()], tracker.clone(), 1, 3, sim.create_context("master")));
    sim.spawn(master.clone().submit_jobs());
    sim.spawn(node.clone().process_tasks());
    for job_id in 0..3 {
        master.submit(Job::new(job_id, 1., 1, 10., 0.));
    }

    let max_in_use = rc!(Cell::new(0));
    let monitor_ctx = sim.create_context("monitor");
    let monitor_node = node.clone();
    let monitor_max = max_in_use.clone();
    sim.spawn(async move {
        for _ in 0..12 {
            monitor_ctx.sleep(1.).await;
            let lock = monitor_node.bandwidth_lock();
            assert!(lock.in_use() <= monitor_node.bandwidth() as usize);
            monitor_max.set(monitor_max.get().max(lock.in_use()));
        }
    });

    sim.step_until_no_events();
    let tracker = tracker.borrow();
    let events = tracker.events_history();

    assert_eq!(max_in_use.get(), 2);
    assert_eq!(transfers(events), vec![(0, 0, 0., 5.), (1, 0, 0., 5.), (2, 0, 5., 10.)]);
    assert_eq!(completed_on_node(events, 0), vec![(0, 5., 6.), (0, 6., 7.), (0, 10., 11.)]);
    assert_eq!(node.bandwidth_lock().in_use(), 0);
    assert_eq!(node.bandwidth_lock().queue_len(), 0);
}

#[test]
fn no_rescheduling_when_disabled() {
    let mut sim = BatchSimulation::new(42, fixed_config(1, 2, 1, 6, 15., 10., 1)).unwrap();
    let summary = sim.run();

    assert_eq!(summary.total_nb_transfers, 1);
    assert_eq!(summary.nb_rescheduled_jobs, 0);
    assert_eq!(summary.total_wall_time, 100.);
}

#[test]
fn random_run_keeps_invariants() {
    let config = random_config();
    let mut sim = BatchSimulation::new(123, config.clone()).unwrap();
    let summary = sim.run();
    let tracker = sim.tracker();
    let tracker = tracker.borrow();
    let events = tracker.events_history();
    let master = sim.master();

    assert!(tracker.ongoing_tasks().is_empty());
    assert_eq!(master.nb_submitted_jobs(), config.total_nb_jobs);
    assert_eq!(tracker.tasks_duration_per_job().len(), config.total_nb_jobs);
    for job_id in 0..config.total_nb_jobs as JobId {
        assert!(master.job_record(job_id).unwrap().nb_rescheduled <= 1);
    }

    let transfers = transfers(events);
    assert_eq!(transfers.len() as u64, summary.total_nb_transfers);
    let bytes: f64 = events.iter().filter_map(|e| e.transferred_bytes).sum();
    assert!((bytes - summary.total_transferred_bytes).abs() < 1e-9);

    let completed = completed_tasks(events);
    assert_eq!(completed.len() as u64, summary.total_nb_tasks_processed);
    assert_eq!(started_tasks(events).len(), completed.len());
    for &(job_id, _, node_id, start, end) in completed.iter() {
        assert!(end >= start);
        assert!(transfers
            .iter()
            .any(|t| t.0 == job_id && t.1 == node_id && t.3 <= start));
    }

    for node_id in 0..config.total_nb_compute_nodes {
        let on_node = completed_on_node(events, node_id);
        for pair in on_node.windows(2) {
            assert!(pair[1].1 >= pair[0].2);
        }
    }
}

#[test]
fn same_seed_same_run() {
    let run = |seed| {
        let mut sim = BatchSimulation::new(seed, random_config()).unwrap();
        let summary = sim.run();
        let events = sim.tracker().borrow().events_history().to_vec();
        (summary, events)
    };
    assert_eq!(run(7), run(7));
}

#[test]
fn campaign_sweeps_replication_factor() {
    let mut base = random_config();
    base.total_nb_jobs = 10;
    let campaign = Campaign::new(base.clone(), 42);
    let configs = campaign.configs();
    assert_eq!(
        configs.iter().map(|c| c.replication_factor).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let results = campaign.run(2).unwrap();
    assert_eq!(results.len(), 3);
    for (result, config) in results.iter().zip(configs) {
        assert_eq!(result.replication_factor, config.replication_factor);
        let summary = BatchSimulation::new(42, config).unwrap().run();
        assert_eq!(result.mean_job_processing_time, summary.mean_job_processing_time);
        assert_eq!(result.total_transferred_bytes, summary.total_transferred_bytes);
        assert_eq!(result.total_wall_time, summary.total_wall_time);
    }
}

