use std::time::Duration;

use chrono::{DateTime, Utc};
use dxsync_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, RetryPolicy, TransferMode};

/// Settings for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Source dataset the table lives in. Only used for log context.
    pub source_dataset: String,
    /// Source table name; also names the destination dataset.
    pub table_name: String,
    /// Target workspace id, as configured (parsed at selection time).
    pub workspace_id: Option<String>,
    /// Bytes per resumable chunk.
    pub chunk_size: usize,
    /// Payloads above this many bytes use the resumable protocol.
    pub chunk_threshold: u64,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn new(source_dataset: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            source_dataset: source_dataset.into(),
            table_name: table_name.into(),
            workspace_id: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }
}

/// Events emitted while a sync runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Source rows fetched and encoded.
    Encoded { rows: usize, bytes: u64 },
    /// The credentials were accepted.
    Authenticated { app_id: String },
    /// Installation chosen for the target workspace.
    InstallationSelected { installation_id: i64, workspace_id: i64 },
    /// Destination dataset found or created.
    DatasetResolved { dataset_id: String, created: bool },
    /// Upload URL obtained; transfer starting.
    UploadStarted { mode: TransferMode, bytes: u64 },
    /// A resumable chunk was acknowledged.
    ChunkAcknowledged { acknowledged_bytes: u64, total_bytes: u64 },
    /// Run finished successfully.
    Completed { dataset_id: String },
    /// Run failed.
    Failed { error: String },
}

/// Outcome of a successful sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub dataset_id: String,
    pub dataset_created: bool,
    pub rows: usize,
    pub bytes: u64,
    pub mode: TransferMode,
    pub chunks_sent: u32,
    pub upload_elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
