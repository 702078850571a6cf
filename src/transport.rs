//! Transport layer for crash log delivery.
//!
//! Builds the multipart upload request and sends it over HTTP.
//!
//! # Wire Format
//!
//! ```text
//! POST {base_url}/{app_id}/crashes/upload
//! Content-Type: multipart/form-data; boundary=<boundary>
//!
//! --<boundary>
//! Content-Disposition: form-data; name="log"; filename="<path>"
//! Content-Type: text/plain
//!
//! <payload>
//! --<boundary>--
//! ```
//!
//! The boundary is the hex SHA-256 digest of the payload, so it is stable for
//! a given payload and does not occur inside it in practice.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Default HockeyApp API base.
pub const DEFAULT_BASE_URL: &str = "https://rink.hockeyapp.net/api/2/apps";

/// Path appended after the app identifier.
pub const CRASHES_PATH: &str = "crashes/upload";

/// Form field carrying the log.
pub const LOG_FIELD: &str = "log";

/// Content type declared for the log field.
pub const LOG_CONTENT_TYPE: &str = "text/plain";

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Returns the upload URL for an app.
pub fn upload_url(base_url: &str, app_id: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), app_id, CRASHES_PATH)
}

/// A multipart form holding one binary field.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    field: String,
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

impl MultipartForm {
    /// Creates a form with a single binary field.
    pub fn binary(
        field: impl Into<String>,
        data: Vec<u8>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let boundary = hex::encode(Sha256::digest(&data));
        Self {
            boundary,
            field: field.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Content type of the whole form, boundary quoted.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary=\"{}\"", self.boundary)
    }

    /// Encodes the form body.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.data.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(&self.field),
                escape_quoted(&self.filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.content_type).as_bytes());
        body.extend_from_slice(&self.data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

/// Percent-encodes the characters that would end a quoted header parameter
/// or the header line itself.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// One upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl UploadRequest {
    /// Builds the request for one log payload.
    ///
    /// The request's content type is the form's with quotes removed.
    pub fn for_log(url: impl Into<String>, log_path: &Path, payload: Vec<u8>) -> Self {
        let form = MultipartForm::binary(
            LOG_FIELD,
            payload,
            log_path.display().to_string(),
            LOG_CONTENT_TYPE,
        );
        Self {
            url: url.into(),
            content_type: form.content_type().replace('"', ""),
            body: form.encode(),
        }
    }
}

/// Sends upload requests.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Sends the request and returns the HTTP status code.
    async fn send(&self, request: UploadRequest) -> Result<u16, TransportError>;
}

/// [`UploadTransport`] over `reqwest`, with the client's default timeouts.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(&self, request: UploadRequest) -> Result<u16, TransportError> {
        let content_type = reqwest::header::HeaderValue::from_str(&request.content_type)?;
        let response = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(request.body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_url_joins_segments() {
        assert_eq!(
            upload_url(DEFAULT_BASE_URL, "abc123"),
            "https://rink.hockeyapp.net/api/2/apps/abc123/crashes/upload"
        );
        assert_eq!(
            upload_url("http://localhost:8080/", "x"),
            "http://localhost:8080/x/crashes/upload"
        );
    }

    #[test]
    fn form_content_type_is_quoted_and_request_is_not() {
        let form = MultipartForm::binary(LOG_FIELD, b"data".to_vec(), "a.log", LOG_CONTENT_TYPE);
        assert!(form.content_type().contains('"'));

        let request =
            UploadRequest::for_log("http://h/x", Path::new("/tmp/a.log"), b"data".to_vec());
        assert_eq!(
            request.content_type,
            format!("multipart/form-data; boundary={}", form.boundary())
        );
    }

    #[test]
    fn encode_wraps_payload_in_one_part() {
        let form = MultipartForm::binary(
            LOG_FIELD,
            b"crash\n  at Main()\n".to_vec(),
            "/data/logs/LogFile_x.log",
            LOG_CONTENT_TYPE,
        );
        let body = String::from_utf8(form.encode()).unwrap();
        let b = form.boundary();

        assert_eq!(
            body,
            format!(
                "--{b}\r\n\
                 Content-Disposition: form-data; name=\"log\"; \
                 filename=\"/data/logs/LogFile_x.log\"\r\n\
                 Content-Type: text/plain\r\n\r\n\
                 crash\n  at Main()\n\
                 \r\n--{b}--\r\n"
            )
        );
    }

    #[test]
    fn boundary_is_stable_per_payload() {
        let a = MultipartForm::binary(LOG_FIELD, b"one".to_vec(), "f", LOG_CONTENT_TYPE);
        let b = MultipartForm::binary(LOG_FIELD, b"one".to_vec(), "g", LOG_CONTENT_TYPE);
        let c = MultipartForm::binary(LOG_FIELD, b"two".to_vec(), "f", LOG_CONTENT_TYPE);

        assert_eq!(a.boundary(), b.boundary());
        assert_ne!(a.boundary(), c.boundary());
        assert_eq!(a.boundary().len(), 64);
    }

    #[test]
    fn encode_escapes_quotes_and_line_breaks_in_filename() {
        let request = UploadRequest::for_log(
            "http://h/x",
            Path::new("/data/my \"game\"/logs\r\n/LogFile_a.log"),
            b"crash".to_vec(),
        );
        let body = String::from_utf8(request.body).unwrap();
        let disposition = body.lines().nth(1).unwrap();

        assert_eq!(
            disposition,
            "Content-Disposition: form-data; name=\"log\"; \
             filename=\"/data/my %22game%22/logs%0D%0A/LogFile_a.log\""
        );
        assert!(body.contains("\r\nContent-Type: text/plain\r\n\r\ncrash\r\n"));
    }
}
