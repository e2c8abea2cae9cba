//! Draining many query jobs into their writers.
//!
//! One poll lists every query job, streams the results of each pending job
//! that has completed into its writer, and marks jobs that failed or were
//! aborted. Polls repeat with backoff until nothing is pending. The backoff
//! starts from its initial envelope on each call and only grows within one.

use std::collections::HashMap;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use sforce_client::{backoff::sleep_with_cancel, Backoff};

use crate::client::BulkApiClient;
use crate::error::{Error, Result};
use crate::job::{failure_of, Job};
use crate::types::{JobKind, JobState, ListOptions};

/// What happened to one job.
#[derive(Debug)]
pub struct QueryJobOutcome {
    pub job_id: String,
    /// Rows written, or why the job produced none.
    pub result: Result<u64>,
}

impl BulkApiClient {
    /// Wait for every job in `jobs` and stream its results into the writer
    /// at the same position.
    ///
    /// Outcomes come back in the order of `jobs`. A failed or aborted job, or
    /// one whose results could not be written, gets an error outcome without
    /// stopping the others. Listing failures end the call.
    pub async fn query_jobs_results<W>(
        &self,
        jobs: &[Job],
        writers: &mut [W],
        backoff: Backoff,
    ) -> Result<Vec<QueryJobOutcome>>
    where
        W: AsyncWrite + Unpin,
    {
        self.drain_query_jobs(None, jobs, writers, backoff).await
    }

    /// Like [`BulkApiClient::query_jobs_results`], but the sleeps between
    /// polls end early with `Cancelled` when `token` fires.
    pub async fn query_jobs_results_with_cancel<W>(
        &self,
        token: &CancellationToken,
        jobs: &[Job],
        writers: &mut [W],
        backoff: Backoff,
    ) -> Result<Vec<QueryJobOutcome>>
    where
        W: AsyncWrite + Unpin,
    {
        self.drain_query_jobs(Some(token), jobs, writers, backoff)
            .await
    }

    #[instrument(skip_all, fields(jobs = jobs.len()))]
    async fn drain_query_jobs<W>(
        &self,
        token: Option<&CancellationToken>,
        jobs: &[Job],
        writers: &mut [W],
        mut backoff: Backoff,
    ) -> Result<Vec<QueryJobOutcome>>
    where
        W: AsyncWrite + Unpin,
    {
        if jobs.len() != writers.len() {
            return Err(Error::validation(format!(
                "{} jobs but {} writers",
                jobs.len(),
                writers.len()
            )));
        }

        let mut pending: HashMap<&str, usize> = HashMap::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            if job.kind() != JobKind::Query {
                return Err(Error::validation(format!(
                    "job {} is not a query job",
                    job.id()
                )));
            }
            if pending.insert(job.id(), index).is_some() {
                return Err(Error::validation(format!("job {} listed twice", job.id())));
            }
        }

        let mut results: Vec<Option<Result<u64>>> = jobs.iter().map(|_| None).collect();
        backoff.reset();

        while !pending.is_empty() {
            let listed = self
                .list_all_jobs(JobKind::Query, &ListOptions::default())
                .await?;

            for info in &listed {
                let Some(&index) = pending.get(info.id.as_str()) else {
                    continue;
                };
                let result = match info.state {
                    JobState::JobComplete => jobs[index].write_results(&mut writers[index]).await,
                    JobState::Failed | JobState::Aborted => Err(failure_of(info)),
                    _ => continue,
                };
                debug!(job_id = %info.id, ok = result.is_ok(), "Drained job");
                results[index] = Some(result);
                pending.remove(info.id.as_str());
            }

            if pending.is_empty() {
                break;
            }

            let pause = backoff.pause();
            debug!(
                pending = pending.len(),
                pause_ms = pause.as_millis() as u64,
                "Query jobs still running"
            );
            match token {
                Some(token) => sleep_with_cancel(token, pause).await?,
                None => tokio::time::sleep(pause).await,
            }
        }

        Ok(jobs
            .iter()
            .zip(results)
            .map(|(job, result)| QueryJobOutcome {
                job_id: job.id().to_string(),
                result: result.unwrap_or_else(|| Err(Error::validation("job was never drained"))),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::QueryJobOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn listed(id: &str, state: &str) -> serde_json::Value {
        json!({"id": id, "state": state, "operation": "query", "object": "Account"})
    }

    fn fast() -> Backoff {
        Backoff::new()
            .with_initial(Duration::from_millis(1))
            .with_max(Duration::from_millis(5))
    }

    async fn open_query_jobs(server: &MockServer, client: &BulkApiClient, ids: &[&str]) -> Vec<Job> {
        let next = Arc::new(AtomicU32::new(0));
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let create = Mock::given(method("POST"))
            .and(path("/services/data/v62.0/jobs/query"))
            .respond_with(move |_: &Request| {
                let id = &ids[next.fetch_add(1, Ordering::SeqCst) as usize];
                ResponseTemplate::new(200).set_body_json(listed(id, "UploadComplete"))
            })
            .mount_as_scoped(server)
            .await;

        let mut jobs = Vec::new();
        for soql in ["SELECT Id FROM Account", "SELECT Id FROM Contact"] {
            jobs.push(
                client
                    .create_query_job(&QueryJobOptions::new(soql))
                    .await
                    .unwrap(),
            );
        }
        drop(create);
        jobs
    }

    #[tokio::test]
    async fn test_drains_each_job_into_its_writer() {
        let mock_server = MockServer::start().await;
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let jobs = open_query_jobs(&mock_server, &client, &["750a", "750b"]).await;

        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query"))
            .respond_with(move |_: &Request| {
                let body = match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => json!({"done": true, "records": [
                        listed("750a", "InProgress"), listed("750b", "JobComplete"), listed("750z", "JobComplete")
                    ]}),
                    _ => json!({"done": true, "records": [
                        listed("750a", "JobComplete"), listed("750b", "JobComplete")
                    ]}),
                };
                ResponseTemplate::new(200).set_body_json(body)
            })
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query/750a/results"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Sforce-Locator", "null")
                    .set_body_string("Id\n001\n002\n"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query/750b/results"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Sforce-Locator", "null")
                    .set_body_string("Id\n003\n"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut writers: Vec<Vec<u8>> = vec![Vec::new(), Vec::new()];
        let outcomes = client
            .query_jobs_results(&jobs, &mut writers, fast())
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes[0].job_id, "750a");
        assert_eq!(*outcomes[0].result.as_ref().unwrap(), 2);
        assert_eq!(*outcomes[1].result.as_ref().unwrap(), 1);
        assert_eq!(writers[0], b"Id\n001\n002\n");
        assert_eq!(writers[1], b"Id\n003\n");
    }

    #[tokio::test]
    async fn test_failed_job_gets_its_own_error() {
        let mock_server = MockServer::start().await;
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let jobs = open_query_jobs(&mock_server, &client, &["750a", "750b"]).await;

        let mut failed = listed("750b", "Failed");
        failed["errorMessage"] = json!("INVALID_FIELD: No such column 'Nmae'");
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "records": [listed("750a", "JobComplete"), failed]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query/750a/results"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Id\n001\n"))
            .mount(&mock_server)
            .await;

        let mut writers: Vec<Vec<u8>> = vec![Vec::new(), Vec::new()];
        let outcomes = client
            .query_jobs_results(&jobs, &mut writers, fast())
            .await
            .unwrap();

        assert_eq!(*outcomes[0].result.as_ref().unwrap(), 1);
        let err = outcomes[1].result.as_ref().unwrap_err();
        assert!(matches!(&err.kind, ErrorKind::JobFailed { job_id, .. } if job_id == "750b"));
        assert!(writers[1].is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let mock_server = MockServer::start().await;
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let jobs = open_query_jobs(&mock_server, &client, &["750a", "750b"]).await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/jobs/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "records": [listed("750a", "InProgress"), listed("750b", "InProgress")]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let mut writers: Vec<Vec<u8>> = vec![Vec::new(), Vec::new()];
        let err = client
            .query_jobs_results_with_cancel(
                &token,
                &jobs,
                &mut writers,
                Backoff::new().with_initial(Duration::from_secs(10)),
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_mismatched_writers() {
        let client = BulkApiClient::with_token("https://na1.salesforce.com", "token").unwrap();
        let mut writers: Vec<Vec<u8>> = vec![Vec::new()];
        let err = client
            .query_jobs_results(&[], &mut writers, Backoff::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
