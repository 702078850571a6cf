//! Native platform bridge.
//!
//! The host implements [`NativePlatform`] on top of its mobile plugin. None of
//! these calls has an error channel: a missing value is reported as `None` or
//! an empty string.

/// Queries and commands answered by the native layer.
pub trait NativePlatform: Send + Sync {
    /// Hands the app identifier to the native crash manager.
    fn start_crash_manager(&self, app_id: &str);

    /// Version of the running application, if the native layer knows it.
    fn app_version(&self) -> Option<String>;

    /// Platform string shaped like `"Android OS 4.4.2 / API-19 (KOT49H)"`.
    fn operating_system(&self) -> String;

    /// Device model name.
    fn device_model(&self) -> String;
}

/// A [`NativePlatform`] answering from fixed values.
///
/// Used by the CLI, where device metadata comes from flags, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPlatform {
    pub app_version: Option<String>,
    pub operating_system: String,
    pub device_model: String,
}

impl StaticPlatform {
    pub fn new(
        app_version: Option<String>,
        operating_system: impl Into<String>,
        device_model: impl Into<String>,
    ) -> Self {
        Self {
            app_version,
            operating_system: operating_system.into(),
            device_model: device_model.into(),
        }
    }
}

impl NativePlatform for StaticPlatform {
    fn start_crash_manager(&self, app_id: &str) {
        tracing::debug!(app_id, "no native crash manager to start");
    }

    fn app_version(&self) -> Option<String> {
        self.app_version.clone()
    }

    fn operating_system(&self) -> String {
        self.operating_system.clone()
    }

    fn device_model(&self) -> String {
        self.device_model.clone()
    }
}
