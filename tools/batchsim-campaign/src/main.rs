use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Builder;
use log::info;

use batchsim::campaign::Campaign;
use batchsim::SimulationConfig;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs the cluster simulation for every replication factor from 1 to the number of nodes (exclusive)
struct Args {
    /// Path to JSON or YAML file with base simulation config
    #[arg(short, long)]
    config: PathBuf,

    /// Random seed shared by all runs
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of threads to use (default - use all available cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Path to produced JSON file with campaign results
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), String> {
    let config = SimulationConfig::from_file(&args.config)?;
    let threads = args
        .threads
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1);

    let results = Campaign::new(config, args.seed).run(threads)?;
    for result in results.iter() {
        info!(
            "replication factor {}: mean job processing time {:.3}, transferred bytes {:.3}, wall time {:.3}",
            result.replication_factor,
            result.mean_job_processing_time,
            result.total_transferred_bytes,
            result.total_wall_time
        );
    }

    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .config
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        args.config
            .with_file_name([stem.as_str(), "-results"].concat())
            .with_extension("json")
    });
    let data = serde_json::to_string_pretty(&results).map_err(|e| e.to_string())?;
    std::fs::write(&output, data).map_err(|e| format!("Can't write results to {}: {}", output.display(), e))
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
