//! Crashlog - crash log capture and upload for embedded runtimes
//!
//! Persists unhandled exceptions to a local log directory and uploads the
//! pending logs to a HockeyApp-compatible endpoint on the next start.
//!
//! # Features
//!
//! - Exception capture wired through host-supplied notification channels
//! - One log file per crash, with device headers
//! - Startup upload with tail truncation of oversized logs
//! - Configurable delete-before-dispatch or delete-after-ack policy
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crashlog::{CrashLogConfig, CrashReporter, HttpTransport, StaticPlatform};
//! # use crashlog::{ExceptionHandler, LogHandler, NotificationHost};
//! # struct Host;
//! # impl NotificationHost for Host {
//! #     fn subscribe_exceptions(&self, _: ExceptionHandler) {}
//! #     fn unsubscribe_exceptions(&self) {}
//! #     fn subscribe_log_messages(&self, _: LogHandler) {}
//! #     fn unsubscribe_log_messages(&self) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = CrashLogConfig::new("abc123", "com.example.game");
//!     config.exception_logging = true;
//!
//!     let reporter = CrashReporter::new(
//!         config,
//!         Arc::new(StaticPlatform::default()),
//!         Arc::new(Host),
//!         Arc::new(HttpTransport::new()),
//!     )?;
//!     let upload = reporter.awake()?;
//!     reporter.enable()?;
//!
//!     // Your application code...
//!
//!     if let Some(upload) = upload {
//!         upload.await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod event;
pub mod headers;
pub mod platform;
pub mod reporter;
pub mod storage;
pub mod transport;
pub mod uploader;
pub mod writer;

pub use capture::{
    CaptureFilter, CaptureResult, ExceptionCapture, ExceptionHandler, LogHandler, NotificationHost,
};
pub use config::{ConfigError, CrashLogConfig};
pub use event::{
    CrashEvent, ExceptionInfo, ExceptionKindPolicy, ExceptionPayload, LogSeverity,
    UnhandledException,
};
pub use headers::DeviceHeaders;
pub use platform::{NativePlatform, StaticPlatform};
pub use reporter::{CrashReporter, ReporterError};
pub use storage::{LogDirectory, PendingLog, StorageError, DEFAULT_MAX_UPLOAD_BYTES};
pub use transport::{
    HttpTransport, TransportError, UploadRequest, UploadTransport, DEFAULT_BASE_URL,
};
pub use uploader::{DeletePolicy, LogFileState, LogUploader, UploadRecord, UploadSummary};
pub use writer::{LogWriter, WriteError};
