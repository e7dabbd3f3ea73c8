use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use csv_ingest::app::ports::ObjectStorePort;
use csv_ingest::config::Config;
use csv_ingest::constants::{DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
use csv_ingest::event::UploadEvent;
use csv_ingest::infra::FsObjectStore;
use csv_ingest::pipeline::ingestion::content_digest;
use csv_ingest::{logging, metrics, IngestSummary, IngestUseCase};

#[derive(Parser)]
#[command(name = "csv_ingest")]
#[command(about = "Idempotent CSV ingestion: validate uploads and split them into processed and error partitions")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = ENV_CONFIG_PATH, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print a Prometheus snapshot of run metrics to stderr on exit
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one uploaded object
    Run {
        /// Object key inside the source bucket
        #[arg(long)]
        key: String,
        /// Source bucket (defaults to store.source_bucket)
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Process the object named in an upload notification payload
    Event {
        /// File containing the notification JSON
        #[arg(long)]
        file: PathBuf,
    },
    /// Load and validate the configured schema, then print its columns
    CheckSchema,
    /// Print the content digest of a local file
    Digest {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { key, bucket } => {
            let (config, _guard) = start(&cli.config, cli.print_metrics)?;
            let bucket = bucket.unwrap_or_else(|| config.store.source_bucket.clone());
            let summary = build_use_case(&config).run_from(&bucket, &key).await?;
            print_summary(&summary)?;
        }
        Commands::Event { file } => {
            let (config, _guard) = start(&cli.config, cli.print_metrics)?;
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let event = UploadEvent::from_json(&payload).context("invalid upload notification")?;
            info!(bucket = %event.bucket, key = %event.key, "received upload notification");
            let summary = build_use_case(&config)
                .run_from(&event.bucket, &event.key)
                .await?;
            print_summary(&summary)?;
        }
        Commands::CheckSchema => {
            let (config, _guard) = start(&cli.config, cli.print_metrics)?;
            print_schema(&config);
        }
        // Needs no configuration
        Commands::Digest { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            println!("{}", content_digest(&bytes));
        }
    }

    // Only set when start() installed the recorder
    if let Some(snapshot) = metrics::render() {
        eprintln!("{}", snapshot);
    }
    Ok(())
}

/// Load configuration, then bring up logging and, when asked, metrics.
fn start(path: &Path, print_metrics: bool) -> Result<(Config, Option<WorkerGuard>)> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    let guard = logging::init_logging(&config.logging);
    if print_metrics {
        metrics::init_metrics();
    }
    Ok((config, guard))
}

fn build_use_case(config: &Config) -> IngestUseCase {
    let store: Arc<dyn ObjectStorePort> = Arc::new(FsObjectStore::new(config.store.root.clone()));
    info!(root = %config.store.root.display(), "using filesystem object store");
    IngestUseCase::new(store, config.schema.clone(), config.ingest_settings())
}

fn print_schema(config: &Config) {
    println!("schema OK: {} column(s)", config.schema.columns().len());
    // Compiled columns keep definition order
    for (spec, column) in config
        .schema_definition
        .columns
        .iter()
        .zip(config.schema.columns())
    {
        let mut flags = Vec::new();
        if column.required {
            flags.push("required");
        }
        if column.unique {
            flags.push("unique");
        }
        println!(
            "  {:<24} {:<8} {:<16} {} rule(s)",
            column.name,
            column.column_type,
            flags.join(","),
            spec.rules.len()
        );
    }
}

fn print_summary(summary: &IngestSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
