//! Startup upload of pending crash logs.
//!
//! Each log file moves through `Pending → Uploading → Deleted`. The moment it
//! is deleted is the [`DeletePolicy`]:
//!
//! | Policy | Deleted when | On failed upload |
//! |--------|--------------|------------------|
//! | `BeforeDispatch` | right before the request is sent | report is lost |
//! | `AfterAck` | after a 2xx response | file stays pending |
//!
//! Uploads are strictly sequential: one request in flight at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::headers::DeviceHeaders;
use crate::platform::NativePlatform;
use crate::storage::{LogDirectory, StorageError};
use crate::transport::{upload_url, UploadRequest, UploadTransport};

/// When a log file is removed relative to its upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete before the request is sent; never retried.
    #[default]
    BeforeDispatch,
    /// Delete once the endpoint acknowledged with a 2xx status.
    AfterAck,
}

/// Lifecycle of one log file during an upload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFileState {
    Pending,
    Uploading,
    Deleted,
}

/// Result of one log file's upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub path: PathBuf,
    pub state: LogFileState,
    /// Whether a request was sent for this file
    pub dispatched: bool,
    /// HTTP status, when the request completed
    pub status: Option<u16>,
}

impl UploadRecord {
    pub fn delivered(&self) -> bool {
        matches!(self.status, Some(status) if is_ack(status))
    }
}

/// Totals for one upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub records: Vec<UploadRecord>,
}

impl UploadSummary {
    /// Requests dispatched.
    pub fn attempted(&self) -> usize {
        self.records.iter().filter(|r| r.dispatched).count()
    }

    /// Requests acknowledged with 2xx.
    pub fn delivered(&self) -> usize {
        self.records.iter().filter(|r| r.delivered()).count()
    }

    /// Files not acknowledged, unreadable ones included.
    pub fn failed(&self) -> usize {
        self.records.len() - self.delivered()
    }

    /// Files removed from disk.
    pub fn deleted(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == LogFileState::Deleted)
            .count()
    }

    /// Files left for the next startup.
    pub fn retained(&self) -> usize {
        self.records.len() - self.deleted()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_ack(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Drains the log directory to the upload endpoint.
pub struct LogUploader {
    dir: LogDirectory,
    url: String,
    package_id: String,
    max_upload_bytes: u64,
    delete_policy: DeletePolicy,
    platform: Arc<dyn NativePlatform>,
    transport: Arc<dyn UploadTransport>,
}

impl LogUploader {
    pub fn new(
        dir: LogDirectory,
        base_url: &str,
        app_id: &str,
        package_id: impl Into<String>,
        platform: Arc<dyn NativePlatform>,
        transport: Arc<dyn UploadTransport>,
    ) -> Self {
        Self {
            dir,
            url: upload_url(base_url, app_id),
            package_id: package_id.into(),
            max_upload_bytes: crate::storage::DEFAULT_MAX_UPLOAD_BYTES,
            delete_policy: DeletePolicy::default(),
            platform,
            transport,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Purges stray files and returns the pending log paths.
    pub fn scan(&self) -> Result<Vec<PathBuf>, StorageError> {
        self.dir.scan()
    }

    /// Scans the directory and uploads everything found.
    pub async fn run(&self) -> Result<UploadSummary, StorageError> {
        let logs = self.scan()?;
        if logs.is_empty() {
            tracing::debug!(dir = %self.dir.path().display(), "no pending crash logs");
        }
        Ok(self.upload_all(&logs).await)
    }

    /// Uploads each log in order, awaiting every request before the next.
    pub async fn upload_all(&self, paths: &[PathBuf]) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for path in paths {
            summary.records.push(self.upload_one(path).await);
        }

        if !summary.is_empty() {
            tracing::info!(
                attempted = summary.attempted(),
                delivered = summary.delivered(),
                deleted = summary.deleted(),
                retained = summary.retained(),
                "crash log upload finished"
            );
        }
        summary
    }

    async fn upload_one(&self, path: &Path) -> UploadRecord {
        let mut record = UploadRecord {
            path: path.to_path_buf(),
            state: LogFileState::Pending,
            dispatched: false,
            status: None,
        };

        let payload = match self.dir.read_payload(path, self.max_upload_bytes, || {
            DeviceHeaders::collect(&self.package_id, self.platform.as_ref(), Utc::now())
        }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable crash log");
                return record;
            }
        };

        let request = UploadRequest::for_log(&self.url, path, payload);

        record.state = LogFileState::Uploading;
        if self.delete_policy == DeletePolicy::BeforeDispatch {
            // Gone before the request resolves, whatever its outcome.
            if remove_log(path) {
                record.state = LogFileState::Deleted;
            }
        }

        record.dispatched = true;
        match self.transport.send(request).await {
            Ok(status) => {
                record.status = Some(status);
                if is_ack(status) {
                    tracing::debug!(path = %path.display(), status, "crash log uploaded");
                } else {
                    tracing::warn!(path = %path.display(), status, "crash log upload rejected");
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "crash log upload failed");
            }
        }

        if self.delete_policy == DeletePolicy::AfterAck {
            record.state = if record.delivered() && remove_log(path) {
                LogFileState::Deleted
            } else {
                LogFileState::Pending
            };
        }
        record
    }
}

fn remove_log(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete crash log");
            false
        }
    }
}
