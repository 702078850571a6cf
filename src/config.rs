//! Reporter configuration.
//!
//! Usually supplied by the host before startup; the CLI also loads it from a
//! TOML file:
//!
//! ```toml
//! app_id = "abc123"
//! package_id = "com.example.game"
//! exception_logging = true
//! storage_dir = "/data/data/com.example.game/files"
//! delete_policy = "after_ack"
//! exception_kinds = "any_exception"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::ExceptionKindPolicy;
use crate::storage::DEFAULT_MAX_UPLOAD_BYTES;
use crate::transport::DEFAULT_BASE_URL;
use crate::uploader::DeletePolicy;

/// Name of the log directory under the storage directory.
pub const LOG_DIR_NAME: &str = "logs";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("app_id must not be empty")]
    MissingAppId,

    #[error("max_upload_bytes must be greater than zero")]
    ZeroUploadCeiling,
}

/// Configuration for the crash log pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashLogConfig {
    /// App identifier used in the upload URL and by the native crash manager
    pub app_id: String,
    /// Package identifier, written to the `Package` header
    pub package_id: String,
    /// Gates both exception capture and startup replay
    pub exception_logging: bool,
    /// App-private storage; logs live in `<storage_dir>/logs`
    pub storage_dir: PathBuf,
    /// Upload API base, without the app identifier
    pub base_url: String,
    /// Larger logs are cut down to their tail before upload
    pub max_upload_bytes: u64,
    pub delete_policy: DeletePolicy,
    pub exception_kinds: ExceptionKindPolicy,
}

impl Default for CrashLogConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            package_id: String::new(),
            exception_logging: false,
            storage_dir: PathBuf::from("."),
            base_url: DEFAULT_BASE_URL.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            delete_policy: DeletePolicy::default(),
            exception_kinds: ExceptionKindPolicy::default(),
        }
    }
}

impl CrashLogConfig {
    pub fn new(app_id: impl Into<String>, package_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            package_id: package_id.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks the values needed before the reporter starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::MissingAppId);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadCeiling);
        }
        Ok(())
    }

    /// Directory holding pending crash logs.
    pub fn log_dir(&self) -> PathBuf {
        self.storage_dir.join(LOG_DIR_NAME)
    }
}
