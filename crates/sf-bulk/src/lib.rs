//! # sforce-bulk
//!
//! Salesforce Bulk API 2.0 client for large-scale data operations.
//!
//! ## Features
//!
//! - **Ingest Jobs** - Insert, Update, Upsert, Delete, Hard Delete
//! - **Query Jobs** - Query and QueryAll with locator paging
//! - **Job state machine** - upload, close, abort, delete, wait
//! - **CSV formatting** - records to CSV with the job's delimiter and line ending
//! - **Split uploads** - any number of records across as many jobs as the
//!   150 MB upload limit needs
//! - **Draining query jobs** - poll many query jobs and stream each into its
//!   own writer, with optional cancellation
//!
//! ## Example - Bulk Insert
//!
//! ```rust,ignore
//! use sforce_bulk::{BulkApiClient, JobOptions, Operation, SplitOptions};
//! use sforce_client::{Backoff, Record};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sforce_bulk::Error> {
//!     let client = BulkApiClient::with_token(
//!         "https://myorg.my.salesforce.com",
//!         "access_token",
//!     )?;
//!
//!     let records = vec![
//!         Record::new("Account").with_field("Name", "Acme Corp"),
//!         Record::new("Account").with_field("Name", "Global Inc"),
//!     ];
//!     let jobs = client
//!         .split_upload(
//!             &JobOptions::new("Account", Operation::Insert),
//!             &["Name"],
//!             false,
//!             &records,
//!             SplitOptions::default(),
//!         )
//!         .await?;
//!
//!     for mut job in jobs {
//!         let info = job.wait(Backoff::default()).await?;
//!         println!("{} processed {}", info.id, info.progress.number_records_processed);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Example - Bulk Query
//!
//! ```rust,ignore
//! use sforce_bulk::{BulkApiClient, QueryJobOptions};
//! use sforce_client::Backoff;
//!
//! let job = client
//!     .create_query_job(&QueryJobOptions::new("SELECT Id, Name FROM Account"))
//!     .await?;
//! let mut out = tokio::fs::File::create("accounts.csv").await?;
//! let outcomes = client
//!     .query_jobs_results(&[job], &mut [out], Backoff::default())
//!     .await?;
//! ```

mod client;
mod error;
mod formatter;
mod job;
mod poll;
mod splitter;
mod types;

pub use client::BulkApiClient;
pub use error::{Error, ErrorKind, Result};
pub use formatter::{CsvFormatter, NULL_SENTINEL};
pub use job::Job;
pub use poll::QueryJobOutcome;
pub use splitter::{base64_len, SplitOptions, MAX_UPLOAD_BYTES};
pub use types::*;

/// Re-exported so callers can cancel polling without a direct dependency.
pub use sforce_client::CancellationToken;
