//! CSV payload encoding and resumable chunked uploads.
//!
//! A snapshot is encoded once into an in-memory [`PayloadBuffer`] and then
//! pushed to a signed URL, either with a single PUT or with the resumable
//! range protocol driven by [`ChunkedUploader`].

mod chunked;
mod payload;
mod progress;
mod retry;
mod transport;
mod types;

pub use chunked::{ChunkReader, ChunkedUploader, content_range, upload_single};
pub use payload::{PayloadBuffer, Record, Value, encode_records};
pub use progress::{ProgressCallback, SpeedCalculator, TransferProgress};
pub use retry::RetryPolicy;
pub use transport::{
    HttpTransport, PutRequest, PutResponse, RangeTransport, TransportError, TransportErrorKind,
};
pub use types::{Chunk, TransferMode, UploadReport, UploadSession};

/// Default chunk size for resumable uploads: 16 MiB.
///
/// Resumable endpoints expect every non-final chunk to be a multiple of 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Payloads larger than this many bytes go through the resumable protocol.
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Content type sent with every payload PUT.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("no records to encode")]
    EmptyInput,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk upload failed with status {status}: {body}")]
    ChunkUpload { status: u16, body: String },

    #[error("upload rejected with status {status}: {body}")]
    UploadRejected { status: u16, body: String },

    #[error("declared size {declared} does not match payload size {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("transport failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}
