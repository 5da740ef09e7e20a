//! Wires the collaborators together and runs one sync.

use std::path::PathBuf;

use anyhow::Context;
use dxsync_platform::Client;
use dxsync_sync::{NdjsonSource, SnapshotSync, SyncConfig, SyncEvent, SyncReport};
use dxsync_transfer::HttpTransport;
use tracing::{debug, info};

use crate::config::Config;
use crate::secrets;

/// Inputs for one run, taken from the command line.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub dataset_id: String,
    pub table_name: String,
    pub records: PathBuf,
    pub schema: Option<PathBuf>,
}

/// Builds the sync settings from the resolved configuration.
pub fn sync_config(args: &RunArgs, config: &Config) -> SyncConfig {
    SyncConfig {
        workspace_id: config.workspace_id.clone(),
        chunk_size: config.chunk_size,
        chunk_threshold: config.chunk_threshold,
        retry: config.retry.to_policy(),
        ..SyncConfig::new(&args.dataset_id, &args.table_name)
    }
}

pub async fn run(args: RunArgs, config: Config) -> anyhow::Result<SyncReport> {
    info!(
        source = %format!("{}.{}", args.dataset_id, args.table_name),
        base_url = %config.base_url,
        "source dataset"
    );

    let credentials = secrets::load_credentials(&config.secrets, |k| std::env::var(k).ok())?;
    let client = Client::new(&credentials, config.request_timeout())
        .context("building DX client")?
        .with_base_url(&config.base_url);
    let transport =
        HttpTransport::new(config.request_timeout()).context("building upload transport")?;

    let mut source = NdjsonSource::new(&args.records);
    if let Some(schema) = &args.schema {
        source = source.with_schema(schema);
    }

    let mut sync = SnapshotSync::new(&client, &source, &transport);
    let events = sync.take_events();
    let drain = events.map(|mut rx| {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log_event(&event);
            }
        })
    });

    let result = sync.run(&sync_config(&args, &config)).await;
    drop(sync);
    if let Some(handle) = drain {
        let _ = handle.await;
    }

    Ok(result?)
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::DatasetResolved {
            dataset_id,
            created: true,
        } => info!(dataset = %dataset_id, "created destination dataset"),
        other => debug!(event = ?other, "sync event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_takes_configured_values() {
        let args = RunArgs {
            dataset_id: "warehouse".into(),
            table_name: "orders".into(),
            records: PathBuf::from("orders.ndjson"),
            schema: None,
        };
        let config = Config {
            workspace_id: Some("1001".into()),
            chunk_size: 256 * 1024,
            chunk_threshold: 1024,
            ..Config::default()
        };

        let sync = sync_config(&args, &config);
        assert_eq!(sync.source_dataset, "warehouse");
        assert_eq!(sync.table_name, "orders");
        assert_eq!(sync.workspace_id.as_deref(), Some("1001"));
        assert_eq!(sync.chunk_size, 256 * 1024);
        assert_eq!(sync.chunk_threshold, 1024);
        assert_eq!(sync.retry.max_attempts, config.retry.max_attempts);
    }
}
