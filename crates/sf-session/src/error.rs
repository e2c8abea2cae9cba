//! Error types for sforce-session.
//!
//! Nothing here carries a secret: credential values never reach a message,
//! and messages from the HTTP layer pass through token redaction first.

use sforce_client::sanitize_error_message;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// The underlying client error, when the doer failed.
    pub fn client_error(&self) -> Option<&sforce_client::Error> {
        self.source
            .as_deref()?
            .downcast_ref::<sforce_client::Error>()
    }

    /// Platform error code, when the server answered with one.
    pub fn error_code(&self) -> Option<&str> {
        self.client_error()?.error_code()
    }

    /// The token endpoint refused the grant.
    pub fn is_rejected(&self) -> bool {
        matches!(self.kind, ErrorKind::Session { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The token endpoint answered with a non-OK status.
    #[error("session error: {status_code} {status_text}")]
    Session { status_code: u16, status_text: String },

    /// The token endpoint answered OK with a body missing required fields.
    #[error("invalid token response: {0}")]
    TokenResponse(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    /// A credential is incomplete. Names the missing piece, never its value.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Environment variable not set: {0}")]
    EnvVar(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("refresher error: {0}")]
    Refresher(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<sforce_client::Error> for Error {
    fn from(err: sforce_client::Error) -> Self {
        let message = sanitize_error_message(&err.to_string());
        Error::with_source(ErrorKind::Client(message), err)
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::with_source(ErrorKind::Jwt(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("invalid URL: {err}")), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Encoding(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Encoding(err.to_string()), err)
    }
}
