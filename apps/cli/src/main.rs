//! dxsync entry point.

mod app;
mod config;
mod secrets;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dxsync",
    version,
    about = "Push a table snapshot into a DX dataset"
)]
struct Cli {
    /// Source dataset id
    #[arg(long)]
    dataset_id: String,

    /// Source table name, also used to name the destination dataset
    #[arg(long)]
    table_name: String,

    /// Newline-delimited JSON file with one row per line
    #[arg(long)]
    records: PathBuf,

    /// JSON file describing the table's columns and primary key
    #[arg(long)]
    schema: Option<PathBuf>,

    #[arg(long, help = "Config file path")]
    config: Option<PathBuf>,

    /// Bytes per resumable chunk (overrides config)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Payloads above this many bytes are sent in chunks (overrides config)
    #[arg(long)]
    chunk_threshold: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting dxsync");

    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply_env(|k| std::env::var(k).ok());
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(threshold) = cli.chunk_threshold {
        config.chunk_threshold = threshold;
    }
    if config.chunk_size == 0 {
        anyhow::bail!("chunk size must be greater than zero");
    }

    let args = app::RunArgs {
        dataset_id: cli.dataset_id,
        table_name: cli.table_name,
        records: cli.records,
        schema: cli.schema,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(app::run(args, config))?;

    tracing::info!(
        dataset = %report.dataset_id,
        rows = report.rows,
        bytes = report.bytes,
        mode = %report.mode,
        started_at = %report.started_at.to_rfc3339(),
        finished_at = %report.finished_at.to_rfc3339(),
        "done"
    );
    Ok(())
}
