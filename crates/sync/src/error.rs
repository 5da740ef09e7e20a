//! Sync error types.

/// Errors produced during a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("platform error: {0}")]
    Platform(#[from] dxsync_platform::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] dxsync_transfer::TransferError),

    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("no valid installations found")]
    NoInstallations,

    #[error("no target workspace id specified")]
    MissingWorkspaceId,

    #[error("invalid workspace id: {0:?}")]
    InvalidWorkspaceId(String),

    #[error("installation for workspace {0} not found")]
    InstallationNotFound(i64),
}
