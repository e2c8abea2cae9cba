//! # sforce-client
//!
//! Core HTTP and data-model infrastructure shared by every Salesforce API
//! surface in this workspace.
//!
//! This crate provides:
//! - The HTTP doer ([`SfHttpClient`]), which owns transport timeouts and pooling
//! - The [`ServiceFormatter`] capability resources are built from
//! - The polymorphic [`Record`] model and the canonical [`SalesforceError`]
//! - Full-jitter [`Backoff`] with plain and cancellable retry loops
//! - Timestamp parsing and SOQL/URL escaping helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Resources                                │
//! │  (sforce-rest, sforce-bulk)                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ServiceFormatter                          │
//! │  - service_url() / instance_url()                           │
//! │  - auth_header(request)                                     │
//! │  - http_doer()                                              │
//! │  (Session, Refresher snapshot, SalesforceClient)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SfHttpClient                             │
//! │  - One round-trip per call, never retries                   │
//! │  - Status checks via ResponseExt::expect_status             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sforce_client::{SalesforceClient, ServiceFormatter, ResponseExt};
//!
//! let client = SalesforceClient::new("https://myorg.my.salesforce.com", "token")?;
//! let request = client.auth_header(
//!     client.http_doer().get(format!("{}/limits", client.service_url())),
//! );
//! let limits: serde_json::Value = client.http_doer().execute_json(request, &[200]).await?;
//! ```

mod client;
mod config;
mod error;
mod request;
mod response;
mod salesforce_client;
mod service;
mod sf_error;

pub mod backoff;
pub mod record;
pub mod security;
pub mod time;

pub use backoff::Backoff;
pub use client::SfHttpClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use record::{HasExternalField, HasFields, HasId, HasObject, Record};
pub use request::{RequestBody, RequestBuilder, RequestMethod};
pub use response::{error_from_body, sanitize_error_message, Response, ResponseExt};
pub use salesforce_client::SalesforceClient;
pub use service::{service_url, ServiceFormatter};
pub use sf_error::{decode_errors, SalesforceError};

/// Re-exported so callers can cancel waits without a direct dependency.
pub use tokio_util::sync::CancellationToken;

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: u32 = 62;

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("sforce/", env!("CARGO_PKG_VERSION"));
