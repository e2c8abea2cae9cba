//! # sforce
//!
//! A Salesforce API client library for Rust.
//!
//! Sessions, REST resources and Bulk API 2.0 jobs, built on one HTTP doer
//! and one record model.
//!
//! ## Security
//!
//! - Sensitive data (tokens, secrets) are redacted in Debug output
//! - Tracing spans never carry credentials
//! - Error messages pulled from responses are sanitized
//!
//! ## Crates
//!
//! - **sforce-client** - HTTP doer, records, errors, backoff, timestamps
//! - **sforce-session** - OAuth credentials, sessions and background refresh
//! - **sforce-rest** - SObjects, Collections, Composite, Tree, SOQL and Query
//! - **sforce-bulk** - Bulk API 2.0 jobs, CSV formatting and split uploads
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sforce::session::{Configuration, PasswordCredential, Session};
//! use sforce::rest::{SalesforceRestClient, SoqlQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Configuration::with_default_doer(PasswordCredential::from_env()?)?;
//!     let client = SalesforceRestClient::new(Session::open(&config).await?);
//!
//!     let accounts = client
//!         .query(&SoqlQuery::new("Account").fields(["Id", "Name"]).limit(10), false)
//!         .await?
//!         .all()
//!         .await?;
//!
//!     for account in accounts {
//!         println!("{:?}", account.string("Name"));
//!     }
//!
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
#[cfg(feature = "bulk")]
pub use sforce_bulk as bulk;
#[cfg(feature = "client")]
pub use sforce_client as client;
#[cfg(feature = "rest")]
pub use sforce_rest as rest;
#[cfg(feature = "session")]
pub use sforce_session as session;

// Re-export commonly used types at the top level
#[cfg(feature = "bulk")]
pub use sforce_bulk::BulkApiClient;
#[cfg(feature = "client")]
pub use sforce_client::{Backoff, ClientConfig, Record, SalesforceClient, ServiceFormatter};
#[cfg(feature = "rest")]
pub use sforce_rest::SalesforceRestClient;
#[cfg(feature = "session")]
pub use sforce_session::{Configuration, LiveSession, Refresher, Session};
