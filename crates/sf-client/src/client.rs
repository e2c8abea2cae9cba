//! The HTTP doer every resource submits requests through.

use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{RequestBody, RequestBuilder, RequestMethod};
use crate::response::{Response, ResponseExt};

/// HTTP client for Salesforce APIs.
///
/// Cheap to clone; clones share one connection pool and may be used from any
/// number of tasks at once.
#[derive(Debug, Clone)]
pub struct SfHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl SfHttpClient {
    /// Build the doer. Fails only if the TLS backend cannot initialise.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.compression)
            .deflate(config.compression)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a request. Nothing is sent until [`SfHttpClient::execute`].
    pub fn request(&self, method: RequestMethod, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(RequestMethod::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(RequestMethod::Post, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(RequestMethod::Patch, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(RequestMethod::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(RequestMethod::Delete, url)
    }

    /// Send a request once and hand back whatever status the server chose.
    ///
    /// Only transport failures are errors here; status handling belongs to
    /// the caller (see [`ResponseExt::expect_status`]).
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let mut url = url::Url::parse(&request.url)?;
        if !request.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query_params);
        }

        let mut outgoing = self.inner.request(request.method.to_reqwest(), url);
        for (name, value) in &request.headers {
            outgoing = outgoing.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            outgoing = match body {
                RequestBody::Json(value) => outgoing.body(serde_json::to_vec(&value)?),
                RequestBody::Text(text) => outgoing.body(text),
                RequestBody::Bytes(bytes) => outgoing.body(bytes),
            };
        }

        if self.config.log_requests {
            debug!("dispatch");
        }
        let response = outgoing.send().await?;
        if self.config.log_requests {
            let status = response.status();
            let bytes = response.content_length();
            if status.is_success() {
                debug!(status = status.as_u16(), bytes, "response");
            } else {
                info!(status = status.as_u16(), bytes, "non-success response");
            }
        }

        Ok(Response::new(response))
    }

    /// [`SfHttpClient::execute`], then require one of `expected` and decode
    /// the JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: &[u16],
    ) -> Result<T> {
        let response = self.execute(request).await?;
        response.expect_status(expected).await?.json().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> SfHttpClient {
        SfHttpClient::new(ClientConfig::builder().with_tracing(false).build()).unwrap()
    }

    #[tokio::test]
    async fn test_successful_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .and(header("Authorization", "Bearer test-token"))
            .and(query_param("q", "SELECT Id FROM Account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .mount(&mock_server)
            .await;

        let client = client();
        let value: serde_json::Value = client
            .execute_json(
                client
                    .get(format!("{}/test", mock_server.uri()))
                    .authorization("Bearer test-token")
                    .query("q", "SELECT Id FROM Account"),
                &[200],
            )
            .await
            .unwrap();

        assert_eq!(value["success"], true);
    }

    #[tokio::test]
    async fn test_body_is_sent_verbatim() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/form"))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string("a=1&b=2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client();
        let response = client
            .execute(
                client
                    .post(format!("{}/form", mock_server.uri()))
                    .form_encoded("a=1&b=2"),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
    }

    #[tokio::test]
    async fn test_salesforce_error_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!([{
                "errorCode": "INVALID_FIELD",
                "message": "No such column 'foo' on entity 'Account'",
                "fields": ["foo"]
            }])))
            .mount(&mock_server)
            .await;

        let client = client();
        let response = client
            .execute(client.get(format!("{}/error", mock_server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let err = response.expect_status(&[200]).await.unwrap_err();
        match err.kind {
            ErrorKind::SalesforceApi { error_code, fields, .. } => {
                assert_eq!(error_code, "INVALID_FIELD");
                assert_eq!(fields, vec!["foo".to_string()]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_does_not_retry_server_errors() {
        let mock_server = MockServer::start().await;
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        Mock::given(method("GET"))
            .and(path("/unavailable"))
            .respond_with(move |_: &wiremock::Request| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(503)
            })
            .mount(&mock_server)
            .await;

        let client = client();
        let err = client
            .execute_json::<serde_json::Value>(
                client.get(format!("{}/unavailable", mock_server.uri())),
                &[200],
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "503 Service Unavailable");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let client = client();
        let err = client
            .execute(client.get("http://127.0.0.1:1/unreachable"))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "{err:?}");
    }

    #[tokio::test]
    async fn test_relative_url_is_rejected_before_sending() {
        let client = client();
        let err = client
            .execute(client.get("/services/data").query("q", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidUrl(_)), "{err:?}");
    }
}
