//! A service formatter over an access token obtained elsewhere.
//!
//! Useful when a token comes from outside the library (a CLI login, a
//! secrets store) or in tests. The token is never refreshed.

use crate::client::SfHttpClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::request::RequestBuilder;
use crate::service::{service_url, ServiceFormatter};
use crate::DEFAULT_API_VERSION;

/// Fixed credentials for one org.
///
/// The access token is redacted in Debug output.
#[derive(Clone)]
pub struct SalesforceClient {
    http: SfHttpClient,
    instance_url: String,
    access_token: String,
    token_type: String,
    api_version: u32,
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl SalesforceClient {
    /// Create a client with a bearer token and the default HTTP configuration.
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Ok(Self::with_http(
            instance_url,
            access_token,
            SfHttpClient::new(ClientConfig::default())?,
        ))
    }

    /// Create a client that submits requests through `http`.
    pub fn with_http(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        http: SfHttpClient,
    ) -> Self {
        Self {
            http,
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            api_version: DEFAULT_API_VERSION,
        }
    }

    /// Set the API version (e.g. 62).
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }
}

impl ServiceFormatter for SalesforceClient {
    fn instance_url(&self) -> String {
        self.instance_url.clone()
    }

    fn service_url(&self) -> String {
        service_url(&self.instance_url, self.api_version)
    }

    fn auth_header(&self, request: RequestBuilder) -> RequestBuilder {
        request.authorization(format!("{} {}", self.token_type, self.access_token))
    }

    fn http_doer(&self) -> &SfHttpClient {
        &self.http
    }
}
