//! Wire types of the bulk job resources.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Servers send `apiVersion` as `62.0` in some releases and `"62.0"` in others.
pub(crate) fn deserialize_api_version<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Number(f64),
        Text(String),
    }

    let version = Option::<Version>::deserialize(deserializer)?;
    Ok(version.map(|version| match version {
        Version::Number(number) => format!("{number:.1}"),
        Version::Text(text) => text,
    }))
}

/// Lifecycle of a job.
///
/// Clients move a job `Open -> UploadComplete` or `Open -> Aborted`; the
/// server moves it on to `InProgress` and then `JobComplete` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Accepting uploads.
    Open,
    UploadComplete,
    InProgress,
    Aborted,
    JobComplete,
    Failed,
}

impl JobState {
    /// The server will not move the job again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::JobComplete | Self::Failed)
    }

    pub fn is_success(&self) -> bool {
        *self == Self::JobComplete
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::UploadComplete => "UploadComplete",
            Self::InProgress => "InProgress",
            Self::Aborted => "Aborted",
            Self::JobComplete => "JobComplete",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job does with its rows. The last two only apply to query jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Insert,
    Update,
    /// Match on an external id field, then insert or update.
    Upsert,
    Delete,
    /// Delete without passing through the recycle bin.
    HardDelete,
    Query,
    /// Query including deleted and archived rows.
    QueryAll,
}

impl Operation {
    /// Name as sent in the `operation` field.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::HardDelete => "hardDelete",
            Self::Query => "query",
            Self::QueryAll => "queryAll",
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query | Self::QueryAll)
    }

    pub fn is_ingest(&self) -> bool {
        !self.is_query()
    }
}

/// Upload and result format. CSV is the only one the server offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[default]
    Csv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
}

impl LineEnding {
    /// The bytes that end a row.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }

    pub(crate) fn terminator(&self) -> csv::Terminator {
        match self {
            Self::Lf => csv::Terminator::Any(b'\n'),
            Self::Crlf => csv::Terminator::CRLF,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnDelimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
    Backquote,
    Caret,
}

impl ColumnDelimiter {
    /// Name as sent in the `columnDelimiter` field.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Comma => "COMMA",
            Self::Tab => "TAB",
            Self::Semicolon => "SEMICOLON",
            Self::Pipe => "PIPE",
            Self::Backquote => "BACKQUOTE",
            Self::Caret => "CARET",
        }
    }

    pub fn char(&self) -> char {
        char::from(self.byte())
    }

    pub(crate) fn byte(&self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Tab => b'\t',
            Self::Semicolon => b';',
            Self::Pipe => b'|',
            Self::Backquote => b'`',
            Self::Caret => b'^',
        }
    }
}

/// Whether a job lives under `/jobs/ingest` or `/jobs/query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Ingest,
    Query,
}

impl JobKind {
    pub(crate) fn path(&self) -> &'static str {
        match self {
            JobKind::Ingest => "jobs/ingest",
            JobKind::Query => "jobs/query",
        }
    }
}

/// Options for opening an ingest job.
///
/// Unset delimiter, line ending and content type fall back to comma, LF and CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub object: String,
    pub operation: Option<Operation>,
    pub column_delimiter: ColumnDelimiter,
    pub content_type: ContentType,
    pub line_ending: LineEnding,
    #[serde(rename = "externalIdFieldName", skip_serializing_if = "Option::is_none")]
    pub external_id_field: Option<String>,
}

impl JobOptions {
    pub fn new(object: impl Into<String>, operation: Operation) -> Self {
        Self {
            object: object.into(),
            operation: Some(operation),
            ..Self::default()
        }
    }

    /// Key field of an upsert.
    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }

    pub fn with_column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = delimiter;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Object and operation are required; upserts also need an external id field.
    pub fn validate(&self) -> Result<()> {
        let operation = self
            .operation
            .ok_or_else(|| Error::validation("bulk job operation is required"))?;
        if operation.is_query() {
            return Err(Error::validation(format!(
                "{} is a query operation; open a query job instead",
                operation.api_name()
            )));
        }
        if self.object.is_empty() {
            return Err(Error::validation("bulk job object is required"));
        }
        if operation == Operation::Upsert
            && self.external_id_field.as_deref().unwrap_or("").is_empty()
        {
            return Err(Error::validation(
                "upsert jobs require an external id field",
            ));
        }
        Ok(())
    }
}

/// Options for opening a query job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJobOptions {
    pub query: String,
    pub operation: Operation,
    pub column_delimiter: ColumnDelimiter,
    pub content_type: ContentType,
    pub line_ending: LineEnding,
}

impl QueryJobOptions {
    pub fn new(soql: impl Into<String>) -> Self {
        Self {
            query: soql.into(),
            operation: Operation::Query,
            column_delimiter: Default::default(),
            content_type: Default::default(),
            line_ending: Default::default(),
        }
    }

    /// Include deleted and archived rows.
    pub fn with_query_all(mut self) -> Self {
        self.operation = Operation::QueryAll;
        self
    }

    pub fn with_column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = delimiter;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation("bulk query is required"));
        }
        if !self.operation.is_query() {
            return Err(Error::validation(format!(
                "{} is not a query operation",
                self.operation.api_name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateJobStateRequest {
    pub state: JobState,
}

/// Filters for listing jobs. Unset filters are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub is_pk_chunking_enabled: Option<bool>,
    pub job_type: Option<String>,
    pub concurrency_mode: Option<String>,
    pub query_locator: Option<String>,
}

impl ListOptions {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(enabled) = self.is_pk_chunking_enabled {
            params.push(("isPkChunkingEnabled", enabled.to_string()));
        }
        if let Some(job_type) = &self.job_type {
            params.push(("jobType", job_type.clone()));
        }
        if let Some(mode) = &self.concurrency_mode {
            params.push(("concurrencyMode", mode.clone()));
        }
        if let Some(locator) = &self.query_locator {
            params.push(("queryLocator", locator.clone()));
        }
        params
    }
}

/// A job as the server reports it.
///
/// Only the identity fields are required; everything else defaults when a
/// list or create response leaves it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub state: JobState,
    pub operation: Operation,
    #[serde(flatten)]
    pub format: JobFormat,
    #[serde(flatten)]
    pub progress: JobProgress,
}

/// How the job's CSV is laid out, and what it targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobFormat {
    /// Empty for query jobs.
    pub object: String,
    /// SOQL of a query job.
    pub query: Option<String>,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
    pub content_type: ContentType,
    pub external_id_field_name: Option<String>,
    #[serde(deserialize_with = "deserialize_api_version")]
    pub api_version: Option<String>,
}

/// Server-side bookkeeping, filled in as the job runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobProgress {
    /// `V2Ingest`, `V2Query` or `Classic`.
    pub job_type: Option<String>,
    pub concurrency_mode: Option<String>,
    pub number_records_processed: i64,
    pub number_records_failed: i64,
    pub retries: Option<i64>,
    /// Milliseconds.
    pub total_processing_time: Option<i64>,
    pub created_date: Option<String>,
    pub system_modstamp: Option<String>,
    /// Set once the job has failed.
    pub error_message: Option<String>,
}

/// One page of `GET /jobs/ingest` or `/jobs/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub done: bool,
    #[serde(default)]
    pub records: Vec<JobInfo>,
    #[serde(default)]
    pub next_records_url: Option<String>,
}

/// One page of query job results. Every page repeats the CSV header.
#[derive(Debug, Clone)]
pub struct QueryResultsPage {
    pub csv: bytes::Bytes,
    /// From `Sforce-NumberOfRecords`, when the server sent it.
    pub number_of_records: Option<u64>,
    /// `None` on the last page.
    pub locator: Option<String>,
}
