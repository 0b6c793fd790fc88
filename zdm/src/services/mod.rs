//! Provider collaborators
//!
//! The passes talk to the source and destination only through the
//! [`RecordingSource`] and [`DestinationStore`] traits; the Zoom and Google
//! Drive clients are the production implementations.

pub mod drive_client;
pub mod zoom_client;

pub use drive_client::{DriveClient, DriveError};
pub use zoom_client::{ZoomClient, ZoomError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use zdm_common::{ProviderRecording, RecordingFile};

/// Result of a source-side deletion request that reached the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Already gone (404)
    NotFound,
    /// Any other HTTP status
    Rejected(u16),
}

/// Source provider: lists, downloads and deletes recordings
#[async_trait]
pub trait RecordingSource: Send + Sync {
    /// All sessions recorded by `host` between `from` and `to` (inclusive)
    async fn list_recordings(
        &self,
        host: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderRecording>>;

    /// Download one file to `dest`, returning the bytes written.
    ///
    /// Temporary files are the implementation's own to remove on failure;
    /// the caller clears `dest` and any directories made for it.
    async fn download_file(&self, file: &RecordingFile, dest: &Path) -> Result<u64>;

    /// Delete every recording file of a session.
    ///
    /// `Err` means the request never got an HTTP answer.
    async fn delete_recording(&self, meeting_uuid: &str, trash: bool) -> Result<DeleteOutcome>;
}

/// Destination storage: existence checks and uploads under the root folder
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// True iff a non-trashed file named `name` sits in exactly `folder`
    async fn file_exists(&self, folder: &[String], name: &str) -> Result<bool>;

    /// Upload a local file into `folder`, creating missing folders.
    ///
    /// Retries are handled inside; `Ok(false)` means every attempt failed and
    /// the failure was recorded in the failed-upload log.
    async fn upload_file(&self, local: &Path, folder: &[String], name: &str) -> Result<bool>;
}
