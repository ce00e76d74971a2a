use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use unsafe_bench::config::{self, Experiment, Layout, OverrideRegistry};
use unsafe_bench::paths;
use unsafe_bench::pipeline::ExperimentRunner;
use unsafe_bench::stats::{self, Aggregator};

const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Run instrumented unsafe-code benchmarks and aggregate their telemetry"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run experiments over the benchmark workloads
    Run {
        /// Run a single experiment by id
        #[arg(short, long)]
        experiment: Option<String>,

        /// Run all experiments
        #[arg(long)]
        all: bool,

        /// Run a single workload instead of auto-discovering all
        #[arg(short, long)]
        workload: Option<String>,

        /// Custom output directory (default: results/<timestamp>)
        #[arg(short, long)]
        output: Option<String>,

        /// Pipeline root containing benchmarks/ and perf/
        #[arg(long, default_value = ".")]
        root: String,

        /// YAML file replacing the built-in workload override table
        #[arg(long)]
        workload_config: Option<PathBuf>,
    },
    /// Aggregate an output directory and print the report table
    Report {
        /// Output directory to aggregate
        #[arg(default_value = DEFAULT_RESULTS_DIR)]
        dir: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            experiment,
            all,
            workload,
            output,
            root,
            workload_config,
        } => run(experiment, all, workload, output, root, workload_config),
        Commands::Report { dir } => report(dir),
    }
}

fn run(
    experiment: Option<String>,
    all: bool,
    workload: Option<String>,
    output: Option<String>,
    root: String,
    workload_config: Option<PathBuf>,
) -> Result<()> {
    if !all && experiment.is_none() {
        anyhow::bail!("Please specify --experiment or --all");
    }

    let experiments: Vec<&Experiment> = match &experiment {
        Some(id) => {
            let exp = Experiment::find(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown experiment '{id}', expected one of: {}",
                    Experiment::ids().join(", ")
                )
            })?;
            vec![exp]
        }
        None => config::builtin_experiments().iter().collect(),
    };

    let root = PathBuf::from(paths::expand_path_str(&root))
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("Failed to resolve pipeline root: {e}"))?;
    let layout = Layout::new(&root);

    let overrides = match &workload_config {
        Some(path) => config::load_overrides(path)?,
        None => OverrideRegistry::builtin(),
    };

    let workloads = match workload {
        Some(name) => vec![name],
        None => layout.discover_workloads()?,
    };

    let output_dir = match output {
        Some(dir) => PathBuf::from(paths::expand_path_str(&dir)),
        None => {
            let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
            root.join(DEFAULT_RESULTS_DIR).join(timestamp.to_string())
        }
    };

    let runner = ExperimentRunner::new(layout, overrides, output_dir)?;
    let output_dir = runner.output_dir().clone();
    runner.run(&experiments, &workloads)?;

    info!("=== Aggregating results ===");
    let mut aggregator = Aggregator::new(&output_dir);
    aggregator.collect_all();
    stats::print_table(aggregator.stats());
    stats::write_json(aggregator.stats(), &output_dir.join("report.json"))?;

    info!("Full results in: {}", output_dir.display());
    Ok(())
}

fn report(dir: String) -> Result<()> {
    let dir = PathBuf::from(paths::expand_path_str(&dir));

    let mut aggregator = Aggregator::new(&dir);
    aggregator.collect_all();
    stats::print_table(aggregator.stats());
    if dir.is_dir() {
        stats::write_json(aggregator.stats(), &dir.join("report.json"))?;
    }
    Ok(())
}
