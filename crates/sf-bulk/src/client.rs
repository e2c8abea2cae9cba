//! Bulk API 2.0 client.
//!
//! [`BulkApiClient`] opens ingest and query jobs and lists them. Everything
//! that happens to one job afterwards lives on [`Job`].

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use sforce_client::{
    RequestBuilder, RequestMethod, Response, ResponseExt, SalesforceClient, ServiceFormatter,
};

use crate::error::{Error, Result};
use crate::job::Job;
use crate::types::{JobInfo, JobKind, JobList, JobOptions, ListOptions, QueryJobOptions};

/// Salesforce Bulk API 2.0 client.
///
/// # Example
///
/// ```rust,ignore
/// use sforce_bulk::{BulkApiClient, JobOptions, Operation};
///
/// let client = BulkApiClient::with_token(
///     "https://myorg.my.salesforce.com",
///     "access_token_here",
/// )?;
///
/// let mut job = client
///     .create_job(&JobOptions::new("Account", Operation::Insert))
///     .await?;
/// job.upload("Name\nTest Account 1\nTest Account 2\n").await?;
/// job.close().await?;
/// let done = job.wait(Backoff::default()).await?;
/// ```
#[derive(Clone)]
pub struct BulkApiClient {
    formatter: Arc<dyn ServiceFormatter>,
}

impl fmt::Debug for BulkApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkApiClient")
            .field("service_url", &self.formatter.service_url())
            .finish()
    }
}

impl BulkApiClient {
    pub fn new(formatter: impl ServiceFormatter + 'static) -> Self {
        Self {
            formatter: Arc::new(formatter),
        }
    }

    /// Share a formatter that other resources also hold.
    pub fn from_arc(formatter: Arc<dyn ServiceFormatter>) -> Self {
        Self { formatter }
    }

    /// Build a client from an instance url and an access token.
    pub fn with_token(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::new(SalesforceClient::new(instance_url, access_token)?))
    }

    pub fn formatter(&self) -> &Arc<dyn ServiceFormatter> {
        &self.formatter
    }

    pub fn instance_url(&self) -> String {
        self.formatter.instance_url()
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Open an ingest job.
    ///
    /// The options are validated before anything is sent.
    #[instrument(skip(self, options), fields(object = %options.object))]
    pub async fn create_job(&self, options: &JobOptions) -> Result<Job> {
        options.validate()?;

        let request = self
            .request(RequestMethod::Post, self.jobs_url(JobKind::Ingest))
            .json(options)?;
        let info: JobInfo = self.send_json(request, &[200, 201]).await?;
        debug!(job_id = %info.id, state = %info.state, "Opened ingest job");
        Ok(Job::new(self.clone(), JobKind::Ingest, info))
    }

    /// Open a query job.
    #[instrument(skip(self, options))]
    pub async fn create_query_job(&self, options: &QueryJobOptions) -> Result<Job> {
        options.validate()?;

        let request = self
            .request(RequestMethod::Post, self.jobs_url(JobKind::Query))
            .json(options)?;
        let info: JobInfo = self.send_json(request, &[200, 201]).await?;
        debug!(job_id = %info.id, state = %info.state, "Opened query job");
        Ok(Job::new(self.clone(), JobKind::Query, info))
    }

    /// Look up an existing job by id.
    #[instrument(skip(self))]
    pub async fn job(&self, kind: JobKind, id: &str) -> Result<Job> {
        let info = self.job_info(kind, id).await?;
        Ok(Job::new(self.clone(), kind, info))
    }

    /// One page of jobs of the given kind.
    #[instrument(skip(self, options))]
    pub async fn list_jobs(&self, kind: JobKind, options: &ListOptions) -> Result<JobList> {
        let request = options
            .params()
            .into_iter()
            .fold(
                self.request(RequestMethod::Get, self.jobs_url(kind)),
                |request, (name, value)| request.query(name, value),
            );
        self.send_json(request, &[200]).await
    }

    /// Every job of the given kind, following `nextRecordsUrl` until done.
    #[instrument(skip(self, options))]
    pub async fn list_all_jobs(&self, kind: JobKind, options: &ListOptions) -> Result<Vec<JobInfo>> {
        let mut page = self.list_jobs(kind, options).await?;
        let mut jobs = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take().filter(|url| !url.is_empty()) else {
                break;
            };
            if !next.starts_with('/') {
                return Err(Error::validation(format!(
                    "next records url must be an instance-relative path, got {next:?}"
                )));
            }
            let url = format!("{}{}", self.instance_url().trim_end_matches('/'), next);
            page = self
                .send_json(self.request(RequestMethod::Get, url), &[200])
                .await?;
            jobs.append(&mut page.records);
        }

        debug!(count = jobs.len(), "Listed jobs");
        Ok(jobs)
    }

    // =========================================================================
    // Plumbing shared with Job
    // =========================================================================

    pub(crate) async fn job_info(&self, kind: JobKind, id: &str) -> Result<JobInfo> {
        self.send_json(self.request(RequestMethod::Get, self.job_url(kind, id)), &[200])
            .await
    }

    pub(crate) fn jobs_url(&self, kind: JobKind) -> String {
        format!("{}/{}", self.formatter.service_url(), kind.path())
    }

    pub(crate) fn job_url(&self, kind: JobKind, id: &str) -> String {
        format!(
            "{}/{}",
            self.jobs_url(kind),
            sforce_client::security::url::encode_param(id)
        )
    }

    /// An authorized request that accepts JSON.
    pub(crate) fn request(&self, method: RequestMethod, url: String) -> RequestBuilder {
        self.formatter
            .auth_header(RequestBuilder::new(method, url).accept_json())
    }

    /// Send once and check the status against `expected`.
    pub(crate) async fn send(&self, request: RequestBuilder, expected: &[u16]) -> Result<Response> {
        debug!(method = request.method().as_str(), url = request.url(), "Dispatching");
        let response = self.formatter.http_doer().execute(request).await?;
        Ok(response.expect_status(expected).await?)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: &[u16],
    ) -> Result<T> {
        Ok(self.send(request, expected).await?.json().await?)
    }
}
