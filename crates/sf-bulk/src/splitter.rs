//! Size-bounded ingest across as many jobs as the upload limit needs.
//!
//! The server caps one job's upload at 150 000 000 bytes of base64-encoded
//! CSV. Sizes are computed from lengths alone; nothing is encoded. A job
//! holds the header, then rows in input order, each followed by its line
//! ending. A new job is opened at the first row that would push the running
//! size past the limit.

use std::ops::Range;

use tracing::{debug, info, instrument, warn};

use sforce_client::HasFields;

use crate::client::BulkApiClient;
use crate::error::{Error, ErrorKind, Result};
use crate::formatter::CsvFormatter;
use crate::job::Job;
use crate::types::JobOptions;

/// Server-side cap on one job's base64-encoded upload.
pub const MAX_UPLOAD_BYTES: usize = 150_000_000;

/// Limits for [`BulkApiClient::split_upload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    pub max_upload_bytes: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl SplitOptions {
    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }
}

/// Length of `n` bytes once base64-encoded with padding: `4 * ceil(n / 3)`.
pub fn base64_len(n: usize) -> usize {
    base64::encoded_len(n, true).unwrap_or(usize::MAX)
}

/// Partition rows into per-job ranges.
///
/// `header` and `line_ending` are encoded lengths; `rows` holds the encoded
/// length of each row without its line ending. Fails with
/// [`ErrorKind::Oversize`] if any row cannot fit in a job on its own.
pub(crate) fn plan(
    header: usize,
    line_ending: usize,
    rows: &[usize],
    max: usize,
) -> Result<Vec<Range<usize>>> {
    let base = header.saturating_add(line_ending);

    for &row in rows {
        let alone = base.saturating_add(row).saturating_add(line_ending);
        if alone > max {
            warn!(size = alone, limit = max, "Record exceeds the upload limit");
            return Err(Error::new(ErrorKind::Oversize {
                size: alone,
                limit: max,
            }));
        }
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    let mut rolling = base;
    for (i, &row) in rows.iter().enumerate() {
        let grown = rolling.saturating_add(row).saturating_add(line_ending);
        if grown > max && i > start {
            ranges.push(start..i);
            start = i;
            rolling = base.saturating_add(row).saturating_add(line_ending);
        } else {
            rolling = grown;
        }
    }
    if start < rows.len() {
        ranges.push(start..rows.len());
    }
    Ok(ranges)
}

impl BulkApiClient {
    /// Ingest `records` through as many jobs as the upload limit requires.
    ///
    /// Every record lands in exactly one job, in input order. Each job is
    /// uploaded and closed before the next is opened. Oversize records are
    /// rejected before any job is opened. Returns the jobs in creation order.
    ///
    /// A job whose upload or close fails is aborted. If earlier jobs were
    /// already closed the error is [`ErrorKind::PartialUpload`], carrying
    /// those jobs; see [`Error::completed_jobs`].
    #[instrument(skip_all, fields(object = %options.object, records = records.len()))]
    pub async fn split_upload<R: HasFields>(
        &self,
        options: &JobOptions,
        fields: &[&str],
        insert_null: bool,
        records: &[R],
        split: SplitOptions,
    ) -> Result<Vec<Job>> {
        options.validate()?;
        if records.is_empty() {
            return Err(Error::validation("no records to upload"));
        }

        let template = CsvFormatter::with_format(
            options.column_delimiter,
            options.line_ending,
            fields.iter().copied(),
            insert_null,
        )?;
        let header = base64_len(template.header().len());
        let line_ending = base64_len(options.line_ending.as_str().len());
        let sizes = records
            .iter()
            .map(|record| Ok(base64_len(template.row_string(record)?.len())))
            .collect::<Result<Vec<_>>>()?;

        let ranges = plan(header, line_ending, &sizes, split.max_upload_bytes)?;
        let planned = ranges.len();
        debug!(jobs = planned, "Planned upload");

        let mut jobs = Vec::with_capacity(planned);
        for range in ranges {
            match self.upload_chunk(options, &template, &records[range.clone()]).await {
                Ok(job) => {
                    debug!(job_id = %job.id(), rows = range.len(), "Uploaded chunk");
                    jobs.push(job);
                }
                Err(err) if jobs.is_empty() => return Err(err),
                Err(err) => {
                    warn!(completed = jobs.len(), planned, error = %err, "Split upload stopped");
                    return Err(Error::with_source(
                        ErrorKind::PartialUpload {
                            completed: jobs,
                            planned,
                        },
                        err,
                    ));
                }
            }
        }

        info!(jobs = jobs.len(), "Split upload complete");
        Ok(jobs)
    }

    /// Open one job, upload `rows` and close it. Aborts the job on failure.
    async fn upload_chunk<R: HasFields>(
        &self,
        options: &JobOptions,
        template: &CsvFormatter,
        rows: &[R],
    ) -> Result<Job> {
        let mut formatter = template.clone();
        formatter.add(rows)?;

        let mut job = self.create_job(options).await?;
        let mut sent = job.upload(formatter.into_bytes()).await;
        if sent.is_ok() {
            sent = job.close().await.map(|_| ());
        }

        if let Err(err) = sent {
            if let Err(abort_err) = job.abort().await {
                warn!(job_id = %job.id(), error = %abort_err, "Could not abort job");
            }
            return Err(err);
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobState, Operation};
    use serde_json::json;
    use sforce_client::Record;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[test]
    fn test_base64_len() {
        assert_eq!(base64_len(0), 0);
        assert_eq!(base64_len(1), 4);
        assert_eq!(base64_len(3), 4);
        assert_eq!(base64_len(4), 8);
        assert_eq!(base64_len(150), 200);
    }

    #[test]
    fn test_large_row_fits_default_limit() {
        let header = base64_len("Name".len());
        let le = base64_len(1);

        let ranges = plan(header, le, &[100_000_001], MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ranges, vec![0..1]);

        let ranges = plan(header, le, &[100_000_001, 100_000_001], MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ranges, vec![0..1, 1..2]);
    }

    #[test]
    fn test_oversize_row_is_rejected() {
        let err = plan(8, 4, &[10, 150_000_000, 10], MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::Oversize {
                size: 150_000_016,
                limit: MAX_UPLOAD_BYTES
            }
        ));
    }

    #[test]
    fn test_split_counts_trailing_line_ending() {
        // header 8 + le 4 = 12; each row 4 + le 4 = 8.
        assert_eq!(plan(8, 4, &[4, 4, 4], 28).unwrap(), vec![0..2, 2..3]);
        assert_eq!(plan(8, 4, &[4, 4, 4], 36).unwrap(), vec![0..3]);
        // After a split the running size includes the carried row.
        assert_eq!(plan(8, 4, &[4, 4, 4, 4, 4], 28).unwrap(), vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn test_every_row_in_exactly_one_range() {
        let rows: Vec<usize> = (0..50).map(|i| (i * 37) % 90 + 1).collect();
        let ranges = plan(12, 4, &rows, 300).unwrap();

        let flattened: Vec<usize> = ranges.iter().cloned().flatten().collect();
        assert_eq!(flattened, (0..50).collect::<Vec<_>>());
        for range in &ranges {
            let size: usize = 12 + 4 + rows[range.clone()].iter().map(|s| s + 4).sum::<usize>();
            assert!(size <= 300);
        }
    }

    fn accounts(names: &[&str]) -> Vec<Record> {
        names
            .iter()
            .map(|name| Record::new("Account").with_field("Name", *name))
            .collect()
    }

    #[tokio::test]
    async fn test_split_upload_opens_a_job_per_chunk() {
        let mock_server = MockServer::start().await;

        let created = Arc::new(AtomicU32::new(0));
        let counter = created.clone();
        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/jobs/ingest"))
            .respond_with(move |_: &Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                ResponseTemplate::new(200).set_body_json(json!({
                    "id": format!("750{n}"),
                    "state": "Open",
                    "operation": "insert",
                    "object": "Account"
                }))
            })
            .mount(&mock_server)
            .await;

        let uploads = Arc::new(Mutex::new(Vec::new()));
        let sink = uploads.clone();
        Mock::given(method("PUT"))
            .and(path_regex(r"^/services/data/v62\.0/jobs/ingest/750\d+/batches$"))
            .respond_with(move |request: &Request| {
                sink.lock()
                    .unwrap()
                    .push((request.url.path().to_string(), String::from_utf8(request.body.clone()).unwrap()));
                ResponseTemplate::new(201)
            })
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path_regex(r"^/services/data/v62\.0/jobs/ingest/750\d+$"))
            .respond_with(|request: &Request| {
                let id = request.url.path().rsplit('/').next().unwrap().to_string();
                ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "state": "UploadComplete",
                    "operation": "insert",
                    "object": "Account"
                }))
            })
            .expect(2)
            .mount(&mock_server)
            .await;

        // header "Name" -> 8, "\n" -> 4, "aaa" -> 4: room for two rows in 28 bytes.
        let records = accounts(&["aaa", "bbb", "ccc"]);
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let jobs = client
            .split_upload(
                &JobOptions::new("Account", Operation::Insert),
                &["Name"],
                false,
                &records,
                SplitOptions::default().with_max_upload_bytes(28),
            )
            .await
            .unwrap();

        let ids: Vec<_> = jobs.iter().map(|job| job.id()).collect();
        assert_eq!(ids, ["7501", "7502"]);
        assert!(jobs.iter().all(|job| job.state() == JobState::UploadComplete));

        let uploads = uploads.lock().unwrap();
        assert_eq!(
            *uploads,
            vec![
                (
                    "/services/data/v62.0/jobs/ingest/7501/batches".to_string(),
                    "Name\naaa\nbbb\n".to_string()
                ),
                (
                    "/services/data/v62.0/jobs/ingest/7502/batches".to_string(),
                    "Name\nccc\n".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_is_aborted_and_earlier_jobs_reported() {
        let mock_server = MockServer::start().await;

        let created = Arc::new(AtomicU32::new(0));
        let counter = created.clone();
        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/jobs/ingest"))
            .respond_with(move |_: &Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                ResponseTemplate::new(200).set_body_json(json!({
                    "id": format!("750{n}"),
                    "state": "Open",
                    "operation": "insert",
                    "object": "Account"
                }))
            })
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/services/data/v62.0/jobs/ingest/7501/batches"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/services/data/v62.0/jobs/ingest/7502/batches"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
                "errorCode": "INVALIDJOBSTATE",
                "message": "bad upload"
            }])))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/services/data/v62.0/jobs/ingest/7501"))
            .and(body_json(json!({"state": "UploadComplete"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7501",
                "state": "UploadComplete",
                "operation": "insert",
                "object": "Account"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/services/data/v62.0/jobs/ingest/7502"))
            .and(body_json(json!({"state": "Aborted"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7502",
                "state": "Aborted",
                "operation": "insert",
                "object": "Account"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let records = accounts(&["aaa", "bbb", "ccc"]);
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let err = client
            .split_upload(
                &JobOptions::new("Account", Operation::Insert),
                &["Name"],
                false,
                &records,
                SplitOptions::default().with_max_upload_bytes(28),
            )
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::PartialUpload { planned: 2, .. }));
        assert_eq!(err.to_string(), "split upload stopped after 1 of 2 jobs");
        let ids: Vec<_> = err.completed_jobs().iter().map(|job| job.id()).collect();
        assert_eq!(ids, ["7501"]);
        assert_eq!(err.completed_jobs()[0].state(), JobState::UploadComplete);
        assert_eq!(err.error_code(), Some("INVALIDJOBSTATE"));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oversize_opens_no_job() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let records = accounts(&["short", "this one is far too long"]);
        let client = BulkApiClient::with_token(mock_server.uri(), "token").unwrap();
        let err = client
            .split_upload(
                &JobOptions::new("Account", Operation::Insert),
                &["Name"],
                false,
                &records,
                SplitOptions::default().with_max_upload_bytes(28),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Oversize { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let client = BulkApiClient::with_token("https://na1.salesforce.com", "token").unwrap();
        let records: Vec<Record> = Vec::new();
        let err = client
            .split_upload(
                &JobOptions::new("Account", Operation::Insert),
                &["Name"],
                false,
                &records,
                SplitOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
