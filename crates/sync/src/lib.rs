//! Snapshot sync flow from a record source into a DX dataset.
//!
//! This crate holds the business logic of one sync run. It talks to the
//! platform through [`DatasetDirectory`] and reads rows through
//! [`RecordSource`], so the flow is testable with mocks.
//!
//! # Pipeline
//!
//! 1. **Fetch**: read the source rows and encode them as CSV
//! 2. **Authenticate**: confirm the credentials with `whoami`
//! 3. **Resolve**: pick the installation for the target workspace
//! 4. **Find or create**: look up the dataset by name, create it on a miss
//! 5. **Upload**: single PUT for small payloads, resumable chunks otherwise

pub mod directory;
pub mod error;
pub mod installation;
pub mod schema;
pub mod source;
pub mod sync;
pub mod types;

pub use directory::DatasetDirectory;
pub use error::SyncError;
pub use installation::select_installation;
pub use schema::dataset_schema;
pub use source::{FieldSchema, NdjsonSource, RecordSource, TableSchema};
pub use sync::{DATASET_DESCRIPTION, SnapshotSync};
pub use types::{SyncConfig, SyncEvent, SyncReport};
