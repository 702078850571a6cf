//! Device headers written at the top of every log file.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::platform::NativePlatform;

/// Prefix stripped from the platform string to get the bare OS version.
const OS_NAME_PREFIX: &str = "Android OS ";

/// One `Key: value` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// Ordered device/runtime headers, computed fresh for each log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceHeaders(Vec<Header>);

impl DeviceHeaders {
    /// Collects headers from the native layer at the given instant.
    ///
    /// Order: `Package`, `Version`, `Android`, `Model`, `Date`.
    pub fn collect(package_id: &str, platform: &dyn NativePlatform, now: DateTime<Utc>) -> Self {
        let mut headers = Self::default();
        headers.push("Package", package_id);
        headers.push("Version", platform.app_version().unwrap_or_default());
        headers.push("Android", parse_os_version(&platform.operating_system()));
        headers.push("Model", platform.device_model());
        headers.push("Date", format_date(now));
        headers
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Header {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    /// Renders every header followed by a newline.
    pub fn to_block(&self) -> String {
        self.0.iter().map(|h| format!("{}\n", h)).collect()
    }
}

/// Extracts the OS version from a `"name/version"`-shaped platform string.
///
/// `"Android OS 4.4.2 / API-19 (KOT49H)"` becomes `"4.4.2"`. The padding
/// around the `/` separator is trimmed so the header value carries no
/// trailing space.
pub fn parse_os_version(operating_system: &str) -> String {
    let name = operating_system.split('/').next().unwrap_or_default();
    name.replace(OS_NAME_PREFIX, "").trim().to_string()
}

/// Formats a UTC instant as `Mon Jan 01 10:00:00 GMT+00:00 2024`.
pub fn format_date(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %H:%M:%S GMT%:z %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StaticPlatform;
    use chrono::TimeZone;

    #[test]
    fn collect_orders_headers() {
        let platform = StaticPlatform::new(
            Some("1.2.3".into()),
            "Android OS 4.4.2 / API-19 (KOT49H/1234)",
            "Nexus 5",
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let headers = DeviceHeaders::collect("com.example.game", &platform, now);

        assert_eq!(
            headers.to_block(),
            "Package: com.example.game\n\
             Version: 1.2.3\n\
             Android: 4.4.2\n\
             Model: Nexus 5\n\
             Date: Mon Jan 01 10:00:00 GMT+00:00 2024\n"
        );
    }

    #[test]
    fn missing_version_is_empty() {
        let platform = StaticPlatform::default();
        let headers = DeviceHeaders::collect("pkg", &platform, Utc::now());

        assert_eq!(headers.get("Version"), Some(""));
    }

    #[test]
    fn parse_os_version_without_slash() {
        assert_eq!(parse_os_version("Android OS 9"), "9");
        assert_eq!(parse_os_version(""), "");
    }

    #[test]
    fn parse_os_version_trims_separator_padding() {
        assert_eq!(parse_os_version("Android OS 13 / API-33"), "13");
        assert_eq!(parse_os_version("  Android OS 8.1.0/API-27"), "8.1.0");
        assert_eq!(parse_os_version("Fuchsia 1 / x"), "Fuchsia 1");
    }
}
