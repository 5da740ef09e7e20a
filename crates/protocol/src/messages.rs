use serde::{Deserialize, Serialize};

use crate::types::{DatasetSchema, UploadMode, UploadType};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Creates a dataset inside an installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatasetRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub schema: DatasetSchema,
}

/// Requests a signed upload URL for a dataset.
///
/// Leaving `upload_type` unset asks for a single-shot URL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub mode: UploadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_type: Option<UploadType>,
}

impl UploadUrlRequest {
    /// Single-shot replace.
    pub fn replace() -> Self {
        Self {
            mode: UploadMode::Replace,
            upload_type: None,
        }
    }

    /// Resumable replace.
    pub fn resumable_replace() -> Self {
        Self {
            mode: UploadMode::Replace,
            upload_type: Some(UploadType::Resumable),
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Envelope for list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}
