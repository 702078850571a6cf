//! Wires capture, writer and uploader to the host lifecycle.
//!
//! ```text
//! awake   → replay pending logs (if exception logging), start native crash manager
//! enable  → register capture handlers (if exception logging)
//! disable → unregister capture handlers; an in-flight upload keeps running
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::capture::{CaptureFilter, ExceptionCapture, NotificationHost};
use crate::config::{ConfigError, CrashLogConfig};
use crate::platform::NativePlatform;
use crate::storage::{LogDirectory, StorageError};
use crate::transport::UploadTransport;
use crate::uploader::{LogUploader, UploadSummary};
use crate::writer::LogWriter;

/// Reporter errors.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No Tokio runtime to upload {pending} pending crash log(s)")]
    NoRuntime { pending: usize },
}

/// Crash reporting for one host application.
pub struct CrashReporter {
    config: CrashLogConfig,
    dir: LogDirectory,
    platform: Arc<dyn NativePlatform>,
    transport: Arc<dyn UploadTransport>,
    capture: ExceptionCapture,
}

impl CrashReporter {
    /// Validates the configuration and builds the pipeline. Nothing is
    /// registered or uploaded until [`awake`](Self::awake) and
    /// [`enable`](Self::enable).
    pub fn new(
        config: CrashLogConfig,
        platform: Arc<dyn NativePlatform>,
        host: Arc<dyn NotificationHost>,
        transport: Arc<dyn UploadTransport>,
    ) -> Result<Self, ReporterError> {
        config.validate()?;

        let dir = LogDirectory::new(config.log_dir());
        let filter = CaptureFilter::new(
            LogWriter::new(dir.path(), config.package_id.clone(), Arc::clone(&platform)),
            config.exception_kinds,
        );
        let capture = ExceptionCapture::new(host, filter, config.exception_logging);

        Ok(Self {
            config,
            dir,
            platform,
            transport,
            capture,
        })
    }

    pub fn config(&self) -> &CrashLogConfig {
        &self.config
    }

    pub fn log_dir(&self) -> &LogDirectory {
        &self.dir
    }

    pub fn capture(&self) -> &ExceptionCapture {
        &self.capture
    }

    /// Builds an uploader for this reporter's directory and endpoint.
    pub fn uploader(&self) -> LogUploader {
        LogUploader::new(
            self.dir.clone(),
            &self.config.base_url,
            &self.config.app_id,
            self.config.package_id.clone(),
            Arc::clone(&self.platform),
            Arc::clone(&self.transport),
        )
        .with_max_upload_bytes(self.config.max_upload_bytes)
        .with_delete_policy(self.config.delete_policy)
    }

    /// Startup: replays pending logs in a background task, then starts the
    /// native crash manager.
    ///
    /// Returns the upload task when there was anything to upload. The task
    /// runs on the current Tokio runtime. Without one the logs stay on disk
    /// and [`ReporterError::NoRuntime`] is returned. The crash manager is
    /// started whether or not the replay succeeds.
    pub fn awake(&self) -> Result<Option<JoinHandle<UploadSummary>>, ReporterError> {
        let replay = if self.config.exception_logging {
            self.replay()
        } else {
            Ok(None)
        };

        self.platform.start_crash_manager(&self.config.app_id);
        replay
    }

    fn replay(&self) -> Result<Option<JoinHandle<UploadSummary>>, ReporterError> {
        let logs = self.dir.scan()?;
        if logs.is_empty() {
            return Ok(None);
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(count = logs.len(), "no runtime, crash logs left for the next start");
            return Err(ReporterError::NoRuntime {
                pending: logs.len(),
            });
        };

        tracing::info!(count = logs.len(), "uploading pending crash logs");
        let uploader = self.uploader();
        Ok(Some(runtime.spawn(async move { uploader.upload_all(&logs).await })))
    }

    /// Registers exception capture with the host.
    pub fn enable(&self) -> Result<(), ReporterError> {
        if self.config.exception_logging {
            self.dir.ensure()?;
        }
        self.capture.enable();
        Ok(())
    }

    /// Unregisters exception capture. Does not cancel a running upload.
    pub fn disable(&self) {
        self.capture.disable();
    }
}
