//! The log directory, used as a durable queue of pending crash logs.
//!
//! Only files with the `.log` extension belong here. Anything else is treated
//! as corrupt or foreign and removed on scan without being read.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::headers::DeviceHeaders;
use crate::writer::LOG_FILE_EXTENSION;

/// Default upload ceiling in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 199_800;

/// Marker placed between fresh headers and a truncated tail.
pub const TRUNCATION_MARKER: &str = "\n[...]";

/// Log directory errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read log file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A pending log file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PendingLog {
    pub path: PathBuf,
    pub size: u64,
}

/// Handle to the directory holding crash logs.
#[derive(Debug, Clone)]
pub struct LogDirectory {
    path: PathBuf,
}

impl LogDirectory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory if it does not exist yet.
    pub fn ensure(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.path).map_err(|source| StorageError::Directory {
            path: self.path.clone(),
            source,
        })
    }

    /// Returns the pending log files, sorted by name, after deleting every
    /// file that is not a log.
    ///
    /// # Side Effects
    ///
    /// - **Creates** the directory if missing
    /// - **Deletes** regular files without the `.log` extension
    /// - Subdirectories are left alone
    pub fn scan(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.scan_pending()?.into_iter().map(|log| log.path).collect())
    }

    /// Like [`scan`](Self::scan), also reporting file sizes.
    pub fn scan_pending(&self) -> Result<Vec<PendingLog>, StorageError> {
        self.ensure()?;

        let dir_err = |source: std::io::Error| StorageError::Directory {
            path: self.path.clone(),
            source,
        };

        let mut logs = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(dir_err)? {
            let entry = entry.map_err(dir_err)?;
            let metadata = entry.metadata().map_err(dir_err)?;
            if !metadata.is_file() {
                continue;
            }

            let path = entry.path();
            if is_log_file(&path) {
                logs.push(PendingLog {
                    path,
                    size: metadata.len(),
                });
            } else {
                match fs::remove_file(&path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "removed stray file"),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to remove stray file"
                        )
                    }
                }
            }
        }

        logs.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(logs)
    }

    /// Reads a log for upload, truncating it to its last `max_bytes` bytes.
    ///
    /// Files at or under the ceiling are returned verbatim. Larger files are
    /// returned as `headers + "\n[...]" + tail`, with headers produced by
    /// `headers` at the time of reading.
    pub fn read_payload<F>(
        &self,
        path: &Path,
        max_bytes: u64,
        headers: F,
    ) -> Result<Vec<u8>, StorageError>
    where
        F: FnOnce() -> DeviceHeaders,
    {
        let read_err = |source: std::io::Error| StorageError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(read_err)?;
        let len = file.metadata().map_err(read_err)?.len();

        if len <= max_bytes {
            let mut bytes = Vec::with_capacity(len as usize);
            file.read_to_end(&mut bytes).map_err(read_err)?;
            return Ok(bytes);
        }

        file.seek(SeekFrom::Start(len - max_bytes)).map_err(read_err)?;
        let mut tail = Vec::with_capacity(max_bytes as usize);
        file.read_to_end(&mut tail).map_err(read_err)?;

        let mut payload = headers().to_block().into_bytes();
        payload.extend_from_slice(TRUNCATION_MARKER.as_bytes());
        payload.extend_from_slice(&tail);

        tracing::debug!(
            path = %path.display(),
            original = len,
            kept = tail.len(),
            "truncated log for upload"
        );
        Ok(payload)
    }
}

/// Returns true when the path carries the reserved log extension.
pub fn is_log_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == LOG_FILE_EXTENSION)
        .unwrap_or(false)
}
