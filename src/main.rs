use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use superstore_etl::config::{EtlConfig, DEFAULT_CONFIG_PATH};
use superstore_etl::infra::LogAlertAdapter;
use superstore_etl::logging;
use superstore_etl::observability;
use superstore_etl::pipeline::{Scheduler, Stage, StageReport};

#[derive(Parser)]
#[command(name = "superstore_etl")]
#[command(about = "Superstore sales ETL: ingest, clean and aggregate")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and validate the raw extract (bronze)
    Ingest,
    /// Clean the raw extract and write the cleaned table (silver)
    Transform,
    /// Build the summary tables from the cleaned table (gold)
    Analytics,
    /// Run bronze, silver and gold in order with retries
    Run,
}

fn print_stage(report: &StageReport) {
    println!("\n📊 {}:", report.stage);
    println!("   Rows in: {}", report.rows_in);
    println!("   Rows out: {}", report.rows_out);
    for note in &report.notes {
        println!("   {}", note);
    }
    for artifact in &report.artifacts {
        println!(
            "   Wrote {} ({} rows, sha256 {})",
            artifact.path.display(),
            artifact.rows,
            artifact.sha256
        );
    }
}

fn run_single(stage: Stage, config: &EtlConfig) -> anyhow::Result<()> {
    let report = stage
        .run(config)
        .with_context(|| format!("{} failed", stage.task_name()))?;
    print_stage(&report);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EtlConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let _guard = logging::init_logging(&config.logging);
    observability::init_metrics();
    info!("Configuration loaded from {}", cli.config.display());

    match cli.command {
        Commands::Ingest => run_single(Stage::Bronze, &config)?,
        Commands::Transform => run_single(Stage::Silver, &config)?,
        Commands::Analytics => run_single(Stage::Gold, &config)?,
        Commands::Run => {
            let scheduler = Scheduler::superstore(&config, Box::new(LogAlertAdapter));
            let report = scheduler.run().await;

            for task in &report.tasks {
                match &task.report {
                    Some(stage) => print_stage(stage),
                    None => println!("\n⚠️  {}: {:?}", task.task, task.state),
                }
            }
            println!("\n{}", serde_json::to_string_pretty(&report)?);

            if let Some(snapshot) = observability::metrics::render() {
                info!("Metrics snapshot:\n{}", snapshot);
            }
            if !report.succeeded() {
                error!("Run {} failed", report.run_id);
                anyhow::bail!("run {} failed", report.run_id);
            }
        }
    }

    Ok(())
}
