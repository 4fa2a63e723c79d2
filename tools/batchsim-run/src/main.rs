use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Builder;
use log::info;

use batchsim::{BatchSimulation, SimulationConfig};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs a single simulation of the batch-processing cluster
struct Args {
    /// Path to JSON or YAML file with simulation config
    #[arg(short, long)]
    config: PathBuf,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Log level (error, warn, info, debug, trace), overrides RUST_LOG
    #[arg(short, long)]
    log_level: Option<String>,

    /// Path to produced JSON file with events history
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Path to produced JSON file with run summary
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn init_logger(log_level: Option<&str>) {
    let mut builder = Builder::from_default_env();
    builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    if let Some(level) = log_level {
        builder.parse_filters(level);
    } else if std::env::var_os("RUST_LOG").is_none() {
        builder.parse_filters("info");
    }
    builder.init();
}

fn run(args: Args) -> Result<(), String> {
    let config = SimulationConfig::from_file(&args.config)?;
    info!("Simulation begins with config: {:?}", config);

    let mut sim = BatchSimulation::new(args.seed, config)?;
    let summary = sim.run();

    info!("total wall time: {}", summary.total_wall_time);
    info!("total transferred bytes: {}", summary.total_transferred_bytes);
    info!(
        "mean job processing time (end_time - submission_time): {}",
        summary.mean_job_processing_time
    );

    if let Some(path) = args.trace {
        sim.tracker()
            .borrow()
            .save_events_history(&path.to_string_lossy())?;
    }
    if let Some(path) = args.summary {
        let data = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        std::fs::write(&path, data).map_err(|e| format!("Can't write summary to {}: {}", path.display(), e))?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level.as_deref());
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
