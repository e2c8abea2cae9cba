//! HTTP response handling with Salesforce-specific extensions.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::sf_error::decode_errors;

/// Wrapper around HTTP response with additional functionality.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Canonical reason phrase for the status, e.g. `Bad Request`.
    pub fn status_text(&self) -> &'static str {
        self.inner.status().canonical_reason().unwrap_or("")
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Get the Sforce-Locator header (used for Bulk API pagination).
    ///
    /// The platform sends the literal string `null` on the last page.
    pub fn sforce_locator(&self) -> Option<&str> {
        self.header("sforce-locator")
            .filter(|locator| !locator.is_empty() && *locator != "null")
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the response body as text.
    pub async fn text(self) -> Result<String> {
        self.inner.text().await.map_err(Into::into)
    }

    /// Get the response body as bytes.
    pub async fn bytes(self) -> Result<bytes::Bytes> {
        self.inner.bytes().await.map_err(Into::into)
    }

    /// Deserialize the response body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.bytes().await?;
        serde_json::from_slice(&body).map_err(Into::into)
    }
}

/// Extension trait for processing Salesforce API responses.
pub trait ResponseExt {
    /// Pass the response through when its status is one of `expected`.
    ///
    /// Otherwise the body is decoded as a list of platform errors and the last
    /// one is surfaced; when that fails the error carries `<status> <statusText>`.
    fn expect_status(
        self,
        expected: &[u16],
    ) -> impl std::future::Future<Output = Result<Response>> + Send;
}

impl ResponseExt for Response {
    async fn expect_status(self, expected: &[u16]) -> Result<Response> {
        let status = self.status();
        if expected.contains(&status) {
            return Ok(self);
        }

        let status_text = self.status_text();
        let body = self.text().await.unwrap_or_default();
        debug!(status, "Unexpected response status");
        Err(error_from_body(status, status_text, &body))
    }
}

/// Build the error for a response whose status was not expected.
pub fn error_from_body(status: u16, status_text: &str, body: &str) -> Error {
    if let Some(last) = decode_errors(body).and_then(|errors| errors.into_iter().last()) {
        return Error::new(ErrorKind::SalesforceApi {
            error_code: last.error_code,
            message: sanitize_error_message(&last.message),
            fields: last.fields,
        });
    }

    Error::new(ErrorKind::UnexpectedStatus {
        status,
        status_text: status_text.to_string(),
    })
}

/// Sanitize an error message to prevent exposing sensitive data.
///
/// Truncates messages longer than 500 characters and redacts anything that
/// looks like an access token or a session id.
pub fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = message.to_string();

    // Access tokens are the 15 or 18 char org id, '!', then the token body.
    if let Ok(token_pattern) = regex_lite::Regex::new(r"00[A-Za-z0-9]{13,}[!][A-Za-z0-9_.]+") {
        sanitized = token_pattern
            .replace_all(&sanitized, "[REDACTED_TOKEN]")
            .to_string();
    }

    if let Ok(session_pattern) = regex_lite::Regex::new(r"sid=[A-Za-z0-9]{20,}") {
        sanitized = session_pattern
            .replace_all(&sanitized, "sid=[REDACTED]")
            .to_string();
    }

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_body_uses_last_error() {
        let body = r#"[
            {"errorCode":"REQUIRED_FIELD_MISSING","message":"Required fields missing","fields":["Name"]},
            {"errorCode":"FIELD_CUSTOM_VALIDATION_EXCEPTION","message":"Must be positive"}
        ]"#;
        let err = error_from_body(400, "Bad Request", body);
        match err.kind {
            ErrorKind::SalesforceApi {
                error_code,
                message,
                ..
            } => {
                assert_eq!(error_code, "FIELD_CUSTOM_VALIDATION_EXCEPTION");
                assert_eq!(message, "Must be positive");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_error_from_body_single_object() {
        let err = error_from_body(404, "Not Found", r#"{"errorCode":"NOT_FOUND","message":"x"}"#);
        assert_eq!(err.error_code(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_error_from_body_falls_back_to_status_text() {
        let err = error_from_body(502, "Bad Gateway", "<html>upstream</html>");
        assert_eq!(err.to_string(), "502 Bad Gateway");

        let err = error_from_body(500, "Internal Server Error", "[]");
        assert!(matches!(err.kind, ErrorKind::UnexpectedStatus { status: 500, .. }));
    }

    #[test]
    fn test_error_from_body_ignores_bodies_without_a_code() {
        let err = error_from_body(200, "OK", r#"{"id":"7501","state":"Open"}"#);
        assert!(matches!(err.kind, ErrorKind::UnexpectedStatus { status: 200, .. }));
        assert_eq!(err.to_string(), "200 OK");
        assert_eq!(err.error_code(), None);
    }

    #[test]
    fn test_sanitize_redacts_access_tokens() {
        let msg = "Session expired: 00Dxx0000001gEF!AQcAQH3k9s7LKbp_example_token_value.here";
        let sanitized = sanitize_error_message(msg);
        assert!(sanitized.contains("[REDACTED_TOKEN]"), "{sanitized}");
        assert!(!sanitized.contains("AQcAQH3k9s7LKbp"), "{sanitized}");
    }

    #[test]
    fn test_sanitize_redacts_session_ids() {
        let sanitized = sanitize_error_message("Invalid session: sid=abc123def456ghi789jkl012");
        assert!(sanitized.contains("sid=[REDACTED]"), "{sanitized}");
        assert!(!sanitized.contains("abc123def456"), "{sanitized}");
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let sanitized = sanitize_error_message(&"é".repeat(600));
        assert!(sanitized.ends_with("...[truncated]"));
        assert!(sanitized.len() < 600 * 2);
    }

    #[test]
    fn test_sanitize_passes_through_clean_messages() {
        let msg = "No such column 'foo' on entity 'Account'";
        assert_eq!(sanitize_error_message(msg), msg);
    }
}
