//! Snapshot sync orchestrator.
//!
//! Runs one full sync of a source table into its DX dataset and reports
//! progress over an mpsc channel.

use chrono::Utc;
use dxsync_protocol::{CreateDatasetRequest, DatasetInfo, Installation, UploadUrlRequest};
use dxsync_transfer::{
    ChunkedUploader, PayloadBuffer, RangeTransport, TransferMode, UploadReport, encode_records,
    upload_single,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::directory::DatasetDirectory;
use crate::error::SyncError;
use crate::installation::select_installation;
use crate::schema::dataset_schema;
use crate::source::RecordSource;
use crate::types::{SyncConfig, SyncEvent, SyncReport};

/// Description given to datasets this tool creates.
pub const DATASET_DESCRIPTION: &str = "Dataset created through dxsync";

/// Orchestrates a snapshot sync.
pub struct SnapshotSync<'a> {
    directory: &'a dyn DatasetDirectory,
    source: &'a dyn RecordSource,
    transport: &'a dyn RangeTransport,
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl<'a> SnapshotSync<'a> {
    pub fn new(
        directory: &'a dyn DatasetDirectory,
        source: &'a dyn RecordSource,
        transport: &'a dyn RangeTransport,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            directory,
            source,
            transport,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped if the receiver is not drained fast enough.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.events_rx.take()
    }

    /// Runs the sync. Emits `Completed` or `Failed` as the last event.
    pub async fn run(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        info!(
            source = %format!("{}.{}", config.source_dataset, config.table_name),
            "starting sync"
        );

        match self.run_inner(config).await {
            Ok(report) => {
                self.emit(SyncEvent::Completed {
                    dataset_id: report.dataset_id.clone(),
                });
                info!(
                    dataset = %report.dataset_id,
                    created = report.dataset_created,
                    rows = report.rows,
                    bytes = report.bytes,
                    mode = %report.mode,
                    chunks = report.chunks_sent,
                    elapsed_ms = report.upload_elapsed.as_millis() as u64,
                    "sync completed"
                );
                Ok(report)
            }
            Err(e) => {
                let err_msg = e.to_string();
                self.emit(SyncEvent::Failed {
                    error: err_msg.clone(),
                });
                error!(table = %config.table_name, error = %err_msg, "sync failed");
                Err(e)
            }
        }
    }

    async fn run_inner(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();

        // 1. Fetch and encode before touching the platform.
        let records = self.source.fetch_records().await?;
        let payload = encode_records(&records)?;
        info!(
            rows = payload.row_count(),
            bytes = payload.len(),
            "encoded payload"
        );
        self.emit(SyncEvent::Encoded {
            rows: payload.row_count(),
            bytes: payload.len(),
        });

        // 2. Authenticate
        let identity = self.directory.whoami().await?;
        info!(app_id = %identity.app_id, "authenticated to DX API");
        self.emit(SyncEvent::Authenticated {
            app_id: identity.app_id,
        });

        // 3. Resolve installation
        let installations = self.directory.installations().await?;
        let installation = select_installation(&installations, config.workspace_id.as_deref())?;
        info!(
            installation = installation.id,
            workspace = installation.workspace_id,
            "target installation found"
        );
        self.emit(SyncEvent::InstallationSelected {
            installation_id: installation.id,
            workspace_id: installation.workspace_id,
        });

        // 4. Find or create dataset
        let (dataset, created) = self
            .find_or_create_dataset(installation, &config.table_name)
            .await?;
        self.emit(SyncEvent::DatasetResolved {
            dataset_id: dataset.id.clone(),
            created,
        });

        // 5. Upload
        let upload = self
            .upload(installation, &dataset, &payload, config)
            .await?;

        Ok(SyncReport {
            dataset_id: dataset.id,
            dataset_created: created,
            rows: payload.row_count(),
            bytes: payload.len(),
            mode: upload.mode,
            chunks_sent: upload.chunks_sent,
            upload_elapsed: upload.elapsed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn find_or_create_dataset(
        &self,
        installation: &Installation,
        name: &str,
    ) -> Result<(DatasetInfo, bool), SyncError> {
        if let Some(existing) = self.directory.find_dataset(installation, name).await? {
            info!(dataset = %existing.id, name, "found dataset, updating");
            return Ok((existing, false));
        }

        info!(name, "dataset not found, creating");
        let table = self.source.table_schema().await?;
        let request = CreateDatasetRequest {
            name: name.to_string(),
            description: DATASET_DESCRIPTION.to_string(),
            schema: dataset_schema(&table),
        };
        debug!(
            properties = request.schema.properties.len(),
            primary_key = ?request.schema.primary_key,
            "dataset schema"
        );
        let created = self
            .directory
            .create_dataset(installation, &request)
            .await?;
        info!(dataset = %created.id, name, "dataset created");
        Ok((created, true))
    }

    async fn upload(
        &self,
        installation: &Installation,
        dataset: &DatasetInfo,
        payload: &PayloadBuffer,
        config: &SyncConfig,
    ) -> Result<UploadReport, SyncError> {
        let mode = TransferMode::for_size(payload.len(), config.chunk_threshold);
        let request = match mode {
            TransferMode::SingleShot => UploadUrlRequest::replace(),
            TransferMode::Resumable => UploadUrlRequest::resumable_replace(),
        };
        info!(
            bytes = payload.len(),
            threshold = config.chunk_threshold,
            %mode,
            "sending payload"
        );

        let target = self
            .directory
            .upload_target(installation, &dataset.id, request)
            .await?;
        self.emit(SyncEvent::UploadStarted {
            mode,
            bytes: payload.len(),
        });

        let report = match mode {
            TransferMode::SingleShot => {
                upload_single(self.transport, &config.retry, payload, &target.url).await?
            }
            TransferMode::Resumable => {
                let events_tx = self.events_tx.clone();
                ChunkedUploader::new(self.transport)
                    .with_retry(config.retry.clone())
                    .on_progress(Box::new(move |p| {
                        info!(
                            acknowledged = p.acknowledged_bytes,
                            total = p.total_bytes,
                            percent = %format_args!("{:.1}", p.percentage()),
                            bytes_per_sec = p.bytes_per_second as u64,
                            "chunk acknowledged"
                        );
                        let _ = events_tx.try_send(SyncEvent::ChunkAcknowledged {
                            acknowledged_bytes: p.acknowledged_bytes,
                            total_bytes: p.total_bytes,
                        });
                    }))
                    .upload(payload, payload.len(), &target.url, config.chunk_size)
                    .await?
            }
        };
        Ok(report)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events_tx.try_send(event);
    }
}
