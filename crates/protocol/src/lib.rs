//! Wire types for the DX dataset directory API.
//!
//! Everything here is plain serde data. The HTTP client lives in
//! `dxsync-platform`; the sync flow in `dxsync-sync` only sees these types.

pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{CreateDatasetRequest, ListResponse, UploadUrlRequest};
pub use types::{
    DatasetInfo, DatasetSchema, Identity, Installation, PropertyType, SchemaProperty, UploadMode,
    UploadTarget, UploadType,
};
