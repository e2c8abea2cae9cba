//! Salesforce REST API client.
//!
//! [`SalesforceRestClient`] is built from anything that implements
//! [`ServiceFormatter`]: an open session, a refresher snapshot or a plain
//! [`SalesforceClient`]. Every operation builds its request from the
//! formatter's service url and auth header and sends it through the
//! formatter's HTTP doer exactly once.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use sforce_client::{
    RequestBuilder, RequestMethod, Response, ResponseExt, SalesforceClient, ServiceFormatter,
};

use crate::error::Result;

mod collections;
mod composite;
mod query;
mod sobject;

/// Salesforce REST API client.
///
/// Provides typed methods for:
/// - Single-record DML, describe and metadata on SObjects
/// - SObject Collections
/// - Composite batch, reference-chained composite and tree inserts
/// - SOQL queries with pagination
///
/// # Example
///
/// ```rust,ignore
/// use sforce_rest::{SalesforceRestClient, SObjectRecord, SoqlQuery};
///
/// let client = SalesforceRestClient::with_token(
///     "https://myorg.my.salesforce.com",
///     "access_token_here",
/// )?;
///
/// let created = client
///     .insert(&SObjectRecord::new("Account").with_field("Name", "Acme"))
///     .await?;
///
/// let accounts = client
///     .query(&SoqlQuery::new("Account").fields(["Id", "Name"]), false)
///     .await?
///     .all()
///     .await?;
/// ```
#[derive(Clone)]
pub struct SalesforceRestClient {
    formatter: Arc<dyn ServiceFormatter>,
}

impl fmt::Debug for SalesforceRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SalesforceRestClient")
            .field("service_url", &self.formatter.service_url())
            .finish()
    }
}

impl SalesforceRestClient {
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

    /// `service_url()` joined with a path below it.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.formatter.service_url(), path.trim_start_matches('/'))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_hang_off_service_url() {
        let client = SalesforceRestClient::with_token("https://na1.salesforce.com", "token").unwrap();

        assert_eq!(client.instance_url(), "https://na1.salesforce.com");
        assert_eq!(
            client.url("sobjects/Account"),
            "https://na1.salesforce.com/services/data/v62.0/sobjects/Account"
        );
        assert_eq!(
            client.url("/composite"),
            "https://na1.salesforce.com/services/data/v62.0/composite"
        );
    }

    #[test]
    fn test_request_carries_auth_and_accept() {
        let client = SalesforceRestClient::with_token("https://na1.salesforce.com", "token").unwrap();
        let request = client.request(RequestMethod::Get, client.url("limits"));

        assert_eq!(request.header_value("authorization"), Some("Bearer token"));
        assert_eq!(request.header_value("accept"), Some("application/json"));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = SalesforceRestClient::with_token("https://na1.salesforce.com", "secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("services/data/v62.0"));
    }
}
