//! Error types for sforce-bulk.

use crate::job::Job;
use crate::types::JobState;

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

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// The underlying client error, when this error came from the HTTP layer.
    pub fn client_error(&self) -> Option<&sforce_client::Error> {
        let source = self.source.as_deref()?;
        if let Some(inner) = source.downcast_ref::<Error>() {
            return inner.client_error();
        }
        source.downcast_ref::<sforce_client::Error>()
    }

    /// Jobs a split upload finished before it stopped. Empty for every other error.
    pub fn completed_jobs(&self) -> &[Job] {
        match &self.kind {
            ErrorKind::PartialUpload { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Platform error code, when the server answered with one.
    pub fn error_code(&self) -> Option<&str> {
        self.client_error()?.error_code()
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Client error: {0}")]
    Client(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The job's state does not allow the operation.
    #[error("cannot {operation} a job in state {state}")]
    InvalidState {
        state: JobState,
        operation: &'static str,
    },

    /// One record cannot fit in a single upload, even alone.
    #[error("record needs {size} encoded bytes, upload limit is {limit}")]
    Oversize { size: usize, limit: usize },

    #[error("CSV error: {0}")]
    Csv(String),

    /// A split upload stopped partway. `completed` were uploaded and closed;
    /// the job that failed was aborted. The cause is the error's source.
    #[error("split upload stopped after {} of {planned} jobs", completed.len())]
    PartialUpload { completed: Vec<Job>, planned: usize },

    /// The server reports the job as Failed or Aborted.
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl From<sforce_client::Error> for Error {
    fn from(err: sforce_client::Error) -> Self {
        let kind = if err.is_cancelled() {
            ErrorKind::Cancelled
        } else {
            ErrorKind::Client(err.to_string())
        };
        Error::with_source(kind, err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::with_source(ErrorKind::Csv(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}
