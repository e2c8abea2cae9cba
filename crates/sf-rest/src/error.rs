//! Error types for sforce-rest.

use crate::composite::CompositeTreeResponse;

/// Result type alias for sforce-rest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sforce-rest operations.
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

    /// Local validation failure; nothing was sent.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// The underlying client error, when this error came from the HTTP layer.
    pub fn client_error(&self) -> Option<&sforce_client::Error> {
        self.source
            .as_deref()?
            .downcast_ref::<sforce_client::Error>()
    }

    /// Platform error code, when the server answered with one.
    pub fn error_code(&self) -> Option<&str> {
        self.client_error()?.error_code()
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
            || self.client_error().is_some_and(|err| err.is_validation())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Error from the HTTP layer (transport, protocol or platform error).
    #[error("Client error: {0}")]
    Client(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A tree insert answered with a non-201 status but a readable body.
    #[error("tree insert failed with status {status}")]
    TreeInsert {
        status: u16,
        response: CompositeTreeResponse,
    },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl From<sforce_client::Error> for Error {
    fn from(err: sforce_client::Error) -> Self {
        Error::with_source(ErrorKind::Client(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}
