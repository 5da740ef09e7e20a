//! Dataset directory trait.
//!
//! `DatasetDirectory` is the platform as seen by the sync flow. The CLI uses
//! the [`dxsync_platform::Client`] implementation below; tests use mocks.

use std::future::Future;
use std::pin::Pin;

use dxsync_protocol::{
    CreateDatasetRequest, DatasetInfo, Identity, Installation, UploadTarget, UploadUrlRequest,
};

use crate::error::SyncError;

type DirFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SyncError>> + Send + 'a>>;

/// Installations and datasets on the DX platform.
pub trait DatasetDirectory: Send + Sync {
    /// Returns the authenticated identity.
    fn whoami(&self) -> DirFuture<'_, Identity>;

    /// Lists the installations visible to the application.
    fn installations(&self) -> DirFuture<'_, Vec<Installation>>;

    /// Looks up a dataset by name. A miss is `Ok(None)`.
    fn find_dataset<'a>(
        &'a self,
        installation: &'a Installation,
        name: &'a str,
    ) -> DirFuture<'a, Option<DatasetInfo>>;

    /// Creates a dataset.
    fn create_dataset<'a>(
        &'a self,
        installation: &'a Installation,
        request: &'a CreateDatasetRequest,
    ) -> DirFuture<'a, DatasetInfo>;

    /// Obtains the signed URL for replacing a dataset's contents.
    fn upload_target<'a>(
        &'a self,
        installation: &'a Installation,
        dataset_id: &'a str,
        request: UploadUrlRequest,
    ) -> DirFuture<'a, UploadTarget>;
}

impl DatasetDirectory for dxsync_platform::Client {
    fn whoami(&self) -> DirFuture<'_, Identity> {
        Box::pin(async move { Ok(dxsync_platform::Client::whoami(self).await?) })
    }

    fn installations(&self) -> DirFuture<'_, Vec<Installation>> {
        Box::pin(async move { Ok(dxsync_platform::Client::installations(self).await?) })
    }

    fn find_dataset<'a>(
        &'a self,
        installation: &'a Installation,
        name: &'a str,
    ) -> DirFuture<'a, Option<DatasetInfo>> {
        Box::pin(async move {
            Ok(dxsync_platform::Client::find_dataset(self, installation, name).await?)
        })
    }

    fn create_dataset<'a>(
        &'a self,
        installation: &'a Installation,
        request: &'a CreateDatasetRequest,
    ) -> DirFuture<'a, DatasetInfo> {
        Box::pin(async move {
            Ok(dxsync_platform::Client::create_dataset(self, installation, request).await?)
        })
    }

    fn upload_target<'a>(
        &'a self,
        installation: &'a Installation,
        dataset_id: &'a str,
        request: UploadUrlRequest,
    ) -> DirFuture<'a, UploadTarget> {
        Box::pin(async move {
            Ok(
                dxsync_platform::Client::upload_target(self, installation, dataset_id, request)
                    .await?,
            )
        })
    }
}
