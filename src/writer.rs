//! Persists crash events as log files.
//!
//! One event becomes one file named `LogFile_<session>.log`, where the session
//! is the local time with millisecond precision. Names sort chronologically.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use crate::event::CrashEvent;
use crate::headers::DeviceHeaders;
use crate::platform::NativePlatform;

/// File name prefix of every log file.
pub const LOG_FILE_PREFIX: &str = "LogFile_";
/// Extension reserved for log files.
pub const LOG_FILE_EXTENSION: &str = "log";

/// Log writer errors.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the session identifier for a crash observed at `now`.
pub fn session_id(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d-%H_%M_%S_%3f").to_string()
}

/// Returns the log file name for a session.
pub fn log_file_name(session: &str) -> String {
    format!("{}{}.{}", LOG_FILE_PREFIX, session, LOG_FILE_EXTENSION)
}

/// Writes crash events into a log directory.
///
/// Writing is synchronous and single-attempt. The directory must already
/// exist; see [`LogDirectory::ensure`](crate::storage::LogDirectory::ensure).
pub struct LogWriter {
    dir: PathBuf,
    package_id: String,
    platform: Arc<dyn NativePlatform>,
}

impl LogWriter {
    pub fn new<P: AsRef<Path>>(
        dir: P,
        package_id: impl Into<String>,
        platform: Arc<dyn NativePlatform>,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            package_id: package_id.into(),
            platform,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists a crash observed now. Returns the path written.
    pub fn write(&self, message: &str, stack_trace: &str) -> Result<PathBuf, WriteError> {
        self.write_at(message, stack_trace, Local::now())
    }

    /// Persists a crash observed at `now`.
    pub fn write_at(
        &self,
        message: &str,
        stack_trace: &str,
        now: DateTime<Local>,
    ) -> Result<PathBuf, WriteError> {
        self.write_event(&CrashEvent::new(message, stack_trace, now))
    }

    /// Persists an already-built event.
    pub fn write_event(&self, event: &CrashEvent) -> Result<PathBuf, WriteError> {
        let headers = DeviceHeaders::collect(
            &self.package_id,
            self.platform.as_ref(),
            event.timestamp.with_timezone(&Utc),
        );
        let path = self.dir.join(log_file_name(&session_id(event.timestamp)));

        let contents = format!("{}{}\n", headers.to_block(), event.body());

        let io_err = |source: std::io::Error| WriteError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;

        tracing::info!(
            path = %path.display(),
            frames = event.stack_trace_lines.len(),
            "crash log written"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StaticPlatform;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn writer(dir: &Path) -> LogWriter {
        let platform = StaticPlatform::new(Some("2.0".into()), "Android OS 10 / API-29", "Pixel");
        LogWriter::new(dir, "com.example.game", Arc::new(platform))
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn session_id_has_millisecond_precision() {
        let now = fixed_time() + chrono::Duration::milliseconds(7);

        assert_eq!(session_id(now), "2024-01-01-10_00_00_007");
        assert_eq!(log_file_name("x"), "LogFile_x.log");
    }

    #[test]
    fn write_skips_blank_stack_lines() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path())
            .write_at("NullRef", "Foo.Bar()\n\nBaz.Qux()", fixed_time())
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let frames: Vec<&str> = contents.lines().filter(|l| l.starts_with("  at ")).collect();

        assert_eq!(frames, vec!["  at Foo.Bar()", "  at Baz.Qux()"]);
    }

    #[test]
    fn write_lays_out_headers_then_body() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path())
            .write_at("boom\nagain", "Main()", fixed_time())
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "LogFile_2024-01-01-10_00_00_000.log"
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines[0], "Package: com.example.game");
        assert_eq!(lines[1], "Version: 2.0");
        assert_eq!(lines[2], "Android: 10");
        assert_eq!(lines[3], "Model: Pixel");
        assert!(lines[4].starts_with("Date: "));
        assert!(lines[4].contains("GMT"));
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "boom again");
        assert_eq!(lines[7], "  at Main()");
        assert!(contents.ends_with("  at Main()\n\n"));
    }

    #[test]
    fn write_appends_on_name_collision() {
        let dir = TempDir::new().unwrap();
        let writer = writer(dir.path());

        let first = writer.write_at("one", "A()", fixed_time()).unwrap();
        let second = writer.write_at("two", "B()", fixed_time()).unwrap();

        assert_eq!(first, second);
        let contents = std::fs::read_to_string(&first).unwrap();
        assert!(contents.contains("\none\n"));
        assert!(contents.contains("\ntwo\n"));
    }

    #[test]
    fn write_fails_without_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("logs");

        let result = writer(&missing).write_at("x", "", fixed_time());

        assert!(matches!(result, Err(WriteError::Io { .. })));
    }
}
