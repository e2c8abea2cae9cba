//! A single Bulk API 2.0 job and its state machine.
//!
//! Clients drive an ingest job `Open -> UploadComplete` (close) or
//! `Open -> Aborted` (abort); the server does the rest. Every transition is
//! checked against the last state this handle saw before anything is sent.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use sforce_client::{backoff::sleep_with_cancel, Backoff, RequestMethod};

use crate::client::BulkApiClient;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{
    ColumnDelimiter, JobInfo, JobKind, JobState, QueryResultsPage, UpdateJobStateRequest,
};

const LOCATOR_END: &str = "null";
const NUMBER_OF_RECORDS: &str = "Sforce-NumberOfRecords";

/// Handle on a job opened or looked up through [`BulkApiClient`].
#[derive(Debug, Clone)]
pub struct Job {
    client: BulkApiClient,
    kind: JobKind,
    info: JobInfo,
}

impl Job {
    pub(crate) fn new(client: BulkApiClient, kind: JobKind, info: JobInfo) -> Self {
        Self { client, kind, info }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// State as of the last response seen for this job.
    pub fn state(&self) -> JobState {
        self.info.state
    }

    /// The job record as of the last response seen.
    pub fn details(&self) -> &JobInfo {
        &self.info
    }

    /// Re-read the job from the server.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn info(&mut self) -> Result<&JobInfo> {
        self.info = self.client.job_info(self.kind, &self.info.id).await?;
        Ok(&self.info)
    }

    /// PUT CSV data to `/batches`. The job must be an open ingest job.
    #[instrument(skip(self, csv), fields(job_id = %self.info.id))]
    pub async fn upload(&self, csv: impl Into<Bytes>) -> Result<()> {
        self.require_kind(JobKind::Ingest, "upload to")?;
        self.require_state(&[JobState::Open], "upload to")?;

        let csv = csv.into();
        debug!(bytes = csv.len(), "Uploading job data");
        let request = self
            .client
            .request(RequestMethod::Put, format!("{}/batches", self.url()))
            .csv(csv);
        self.client.send(request, &[201]).await?;
        Ok(())
    }

    /// Mark the upload complete so the server starts processing.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn close(&mut self) -> Result<&JobInfo> {
        self.require_kind(JobKind::Ingest, "close")?;
        self.require_state(&[JobState::Open], "close")?;
        self.transition(JobState::UploadComplete).await
    }

    /// Abort a job that has not reached a terminal state.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn abort(&mut self) -> Result<&JobInfo> {
        if self.info.state.is_terminal() {
            return Err(Error::new(ErrorKind::InvalidState {
                state: self.info.state,
                operation: "abort",
            }));
        }
        self.transition(JobState::Aborted).await
    }

    /// Delete the job. Expects `204 No Content`.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn delete(self) -> Result<()> {
        let request = self.client.request(RequestMethod::Delete, self.url());
        self.client.send(request, &[204]).await?;
        Ok(())
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// A `Failed` or `Aborted` job ends the wait with [`ErrorKind::JobFailed`].
    pub async fn wait(&mut self, backoff: Backoff) -> Result<&JobInfo> {
        self.poll_until_terminal(None, backoff).await
    }

    /// Like [`Job::wait`], but the sleeps between polls end early with
    /// [`ErrorKind::Cancelled`] when `token` fires.
    pub async fn wait_with_cancel(
        &mut self,
        token: &CancellationToken,
        backoff: Backoff,
    ) -> Result<&JobInfo> {
        self.poll_until_terminal(Some(token), backoff).await
    }

    #[instrument(skip(self, token, backoff), fields(job_id = %self.info.id))]
    async fn poll_until_terminal(
        &mut self,
        token: Option<&CancellationToken>,
        mut backoff: Backoff,
    ) -> Result<&JobInfo> {
        backoff.reset();
        loop {
            self.info = self.client.job_info(self.kind, &self.info.id).await?;
            match self.info.state {
                JobState::JobComplete => return Ok(&self.info),
                JobState::Failed | JobState::Aborted => return Err(self.failure()),
                _ => {}
            }

            let pause = backoff.pause();
            debug!(state = %self.info.state, pause_ms = pause.as_millis() as u64, "Job not finished");
            match token {
                Some(token) => sleep_with_cancel(token, pause).await?,
                None => tokio::time::sleep(pause).await,
            }
        }
    }

    // =========================================================================
    // Ingest results
    // =========================================================================

    /// CSV of the rows the server processed successfully.
    pub async fn successful_results(&self) -> Result<Bytes> {
        self.ingest_csv("successfulResults").await
    }

    /// CSV of the rows that failed, with `sf__Error` per row.
    pub async fn failed_results(&self) -> Result<Bytes> {
        self.ingest_csv("failedResults").await
    }

    /// CSV of the rows never processed, e.g. after an abort.
    pub async fn unprocessed_records(&self) -> Result<Bytes> {
        self.ingest_csv("unprocessedrecords").await
    }

    #[instrument(skip(self), fields(job_id = %self.info.id))]
    async fn ingest_csv(&self, resource: &'static str) -> Result<Bytes> {
        self.require_kind(JobKind::Ingest, "read results of")?;
        let request = self
            .client
            .request(RequestMethod::Get, format!("{}/{}", self.url(), resource))
            .header("Accept", "text/csv");
        Ok(self.client.send(request, &[200]).await?.bytes().await?)
    }

    // =========================================================================
    // Query results
    // =========================================================================

    /// One page of query results.
    ///
    /// Pass the previous page's locator to continue; `None` starts at the top.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn query_results(
        &self,
        locator: Option<&str>,
        max_records: Option<u64>,
    ) -> Result<QueryResultsPage> {
        self.require_kind(JobKind::Query, "read query results of")?;

        let mut request = self
            .client
            .request(RequestMethod::Get, format!("{}/results", self.url()))
            .header("Accept", "text/csv");
        if let Some(locator) = locator {
            request = request.query("locator", locator);
        }
        if let Some(max) = max_records {
            request = request.query("maxRecords", max.to_string());
        }

        let response = self.client.send(request, &[200]).await?;
        let locator = response
            .sforce_locator()
            .filter(|locator| !locator.is_empty() && *locator != LOCATOR_END)
            .map(str::to_string);
        let number_of_records = response
            .header(NUMBER_OF_RECORDS)
            .and_then(|count| count.trim().parse().ok());
        let csv = response.bytes().await?;

        Ok(QueryResultsPage {
            csv,
            number_of_records,
            locator,
        })
    }

    /// Stream every page of query results into `writer`.
    ///
    /// The header row is written once. Returns the number of data rows.
    #[instrument(skip(self, writer), fields(job_id = %self.info.id))]
    pub async fn write_results<W>(&self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut rows = 0u64;
        let mut locator: Option<String> = None;
        let mut first = true;

        loop {
            let page = self.query_results(locator.as_deref(), None).await?;
            rows += match page.number_of_records {
                Some(count) => count,
                None => count_rows(&page.csv, self.info.format.column_delimiter)?,
            };

            if first {
                writer.write_all(&page.csv).await?;
                first = false;
            } else {
                writer.write_all(without_header(&page.csv)).await?;
            }

            match page.locator {
                Some(next) => locator = Some(next),
                None => break,
            }
        }

        writer.flush().await?;
        debug!(rows, "Wrote query results");
        Ok(rows)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn url(&self) -> String {
        self.client.job_url(self.kind, &self.info.id)
    }

    async fn transition(&mut self, state: JobState) -> Result<&JobInfo> {
        let request = self
            .client
            .request(RequestMethod::Patch, self.url())
            .json(&UpdateJobStateRequest { state })?;
        self.info = self.client.send_json(request, &[200]).await?;
        debug!(state = %self.info.state, "Job state changed");
        Ok(&self.info)
    }

    fn require_kind(&self, kind: JobKind, operation: &'static str) -> Result<()> {
        if self.kind != kind {
            return Err(Error::validation(format!(
                "cannot {operation} a {} job",
                match self.kind {
                    JobKind::Ingest => "ingest",
                    JobKind::Query => "query",
                }
            )));
        }
        Ok(())
    }

    fn require_state(&self, allowed: &[JobState], operation: &'static str) -> Result<()> {
        if !allowed.contains(&self.info.state) {
            return Err(Error::new(ErrorKind::InvalidState {
                state: self.info.state,
                operation,
            }));
        }
        Ok(())
    }

    pub(crate) fn failure(&self) -> Error {
        failure_of(&self.info)
    }
}

/// The error a `Failed` or `Aborted` job ends in.
pub(crate) fn failure_of(info: &JobInfo) -> Error {
    let message = info
        .progress
        .error_message
        .clone()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("job ended in state {}", info.state));
    warn!(job_id = %info.id, state = %info.state, "Job did not complete");
    Error::new(ErrorKind::JobFailed {
        job_id: info.id.clone(),
        message,
    })
}

/// Everything after the first line.
fn without_header(csv: &[u8]) -> &[u8] {
    match csv.iter().position(|&b| b == b'\n') {
        Some(end) => &csv[end + 1..],
        None => &[],
    }
}

/// Data rows in a CSV page, header excluded. Quoted line breaks stay inside their row.
fn count_rows(csv: &[u8], delimiter: ColumnDelimiter) -> Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.byte())
        .has_headers(true)
        .flexible(true)
        .from_reader(csv);
    let mut record = csv::ByteRecord::new();
    let mut rows = 0;
    while reader.read_byte_record(&mut record)? {
        rows += 1;
    }
    Ok(rows)
}
