//! Background session refresh.
//!
//! One task re-authenticates on a fixed period and publishes each new
//! session as an immutable `Arc<Session>` snapshot behind a read-write lock.
//! Readers clone the snapshot and keep using it after a swap. Resources take
//! a [`LiveSession`], which re-reads the snapshot on every request.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use sforce_client::{RequestBuilder, ServiceFormatter, SfHttpClient};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::configuration::Configuration;
use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;

type Shared<T> = Arc<RwLock<T>>;

// Writers never panic while holding the lock, so a poisoned value is still whole.
fn load<T: Clone>(slot: &RwLock<T>) -> T {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn store<T>(slot: &RwLock<T>, value: T) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// Wait after a failed refresh before trying again.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How often to refresh, and how soon to retry after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub period: Duration,
    pub retry_interval: Duration,
}

impl RefreshPolicy {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

/// Keeps a session alive by re-authenticating in the background.
///
/// Dropping the refresher stops the background task.
#[derive(Debug)]
pub struct Refresher {
    current: Shared<Arc<Session>>,
    last_error: Shared<Option<Arc<Error>>>,
    http_doer: SfHttpClient,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// A [`ServiceFormatter`] that always answers from the newest session.
///
/// Cheap to clone. Build REST and bulk clients from it so their requests pick
/// up each refreshed token. It outlives the refresher, and keeps serving the
/// last session after a shutdown.
#[derive(Debug, Clone)]
pub struct LiveSession {
    current: Shared<Arc<Session>>,
    http_doer: SfHttpClient,
}

impl LiveSession {
    pub fn session(&self) -> Arc<Session> {
        load(&self.current)
    }
}

impl ServiceFormatter for LiveSession {
    fn instance_url(&self) -> String {
        self.session().instance_url()
    }

    fn service_url(&self) -> String {
        self.session().service_url()
    }

    fn auth_header(&self, request: RequestBuilder) -> RequestBuilder {
        self.session().auth_header(request)
    }

    fn http_doer(&self) -> &SfHttpClient {
        &self.http_doer
    }
}

impl Refresher {
    /// Open the first session and start refreshing it.
    #[instrument(skip(config), fields(period_ms = policy.period.as_millis() as u64))]
    pub async fn start(config: Configuration, policy: RefreshPolicy) -> Result<Self> {
        if policy.period.is_zero() {
            return Err(Error::new(ErrorKind::Refresher(
                "refresh period must be greater than zero".to_string(),
            )));
        }

        let session = Session::open(&config).await?;
        let current = Arc::new(RwLock::new(Arc::new(session)));
        let last_error = Arc::new(RwLock::new(None));
        let http_doer = config.http_doer.clone();
        let stop = CancellationToken::new();

        let task = tokio::spawn(refresh_loop(
            config,
            policy,
            current.clone(),
            last_error.clone(),
            stop.clone(),
        ));

        Ok(Self {
            current,
            last_error,
            http_doer,
            stop,
            task: Some(task),
        })
    }

    /// The most recently published session. A fixed snapshot; resources
    /// should be built from [`Refresher::live`] instead.
    pub fn session(&self) -> Arc<Session> {
        load(&self.current)
    }

    /// A formatter that follows every swap this refresher makes.
    pub fn live(&self) -> LiveSession {
        LiveSession {
            current: self.current.clone(),
            http_doer: self.http_doer.clone(),
        }
    }

    /// The error from the latest refresh attempt, cleared by the next success.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        load(&self.last_error)
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Stop refreshing and return the last session.
    ///
    /// Waits for the background task to exit, so no swap can happen after
    /// this returns.
    pub async fn shutdown(&mut self) -> Arc<Session> {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Refresh task ended abnormally");
            }
        }
        self.session()
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn refresh_loop(
    config: Configuration,
    policy: RefreshPolicy,
    current: Shared<Arc<Session>>,
    last_error: Shared<Option<Arc<Error>>>,
    stop: CancellationToken,
) {
    let mut wait = policy.period;

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let result = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            result = Session::open(&config) => result,
        };

        match result {
            Ok(session) => {
                store(&current, Arc::new(session));
                store(&last_error, None);
                wait = policy.period;
                info!("Session refreshed");
            }
            Err(err) => {
                warn!(error = %err, retry_ms = policy.retry_interval.as_millis() as u64, "Session refresh failed");
                store(&last_error, Some(Arc::new(err)));
                wait = policy.retry_interval;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PasswordCredential;
    use sforce_client::{ClientConfig, ServiceFormatter, SfHttpClient};
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(login_url: &str) -> Configuration {
        Configuration::new(
            PasswordCredential::new(login_url, "u", "p", "c", "s"),
            SfHttpClient::new(ClientConfig::builder().with_tracing(false).build()).unwrap(),
        )
    }

    fn token(n: u32) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": format!("T{n}"),
            "instance_url": "https://i",
            "token_type": "Bearer"
        }))
    }

    /// Serves T0, T1, ... and counts calls.
    async fn counting_server(calls: Arc<AtomicU32>) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(move |_: &wiremock::Request| token(calls.fetch_add(1, Ordering::SeqCst)))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let err = Refresher::start(config("http://127.0.0.1:1"), RefreshPolicy::every(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Refresher(_)));
    }

    #[tokio::test]
    async fn test_refreshes_and_swaps() {
        let calls = Arc::new(AtomicU32::new(0));
        let mock_server = counting_server(calls.clone()).await;

        let mut refresher = Refresher::start(
            config(&mock_server.uri()),
            RefreshPolicy::every(Duration::from_millis(30)),
        )
        .await
        .unwrap();

        let first = refresher.session();
        assert_eq!(first.access_token(), "T0");

        tokio::time::sleep(Duration::from_millis(200)).await;

        let later = refresher.session();
        assert_ne!(later.access_token(), "T0");
        // The snapshot taken earlier is unaffected by the swap.
        assert_eq!(first.access_token(), "T0");
        assert_eq!(later.service_url(), "https://i/services/data/v62.0");
        assert!(refresher.last_error().is_none());

        let last = refresher.shutdown().await;
        assert!(refresher.is_closed());

        let calls_at_shutdown = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), calls_at_shutdown);
        assert_eq!(refresher.session().access_token(), last.access_token());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_retried() {
        let mock_server = MockServer::start().await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        // First call succeeds, the next two fail, then it recovers.
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(move |_: &wiremock::Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 1 || n == 2 {
                    ResponseTemplate::new(503)
                } else {
                    token(n)
                }
            })
            .mount(&mock_server)
            .await;

        let mut refresher = Refresher::start(
            config(&mock_server.uri()),
            RefreshPolicy::every(Duration::from_millis(40))
                .with_retry_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        // Poll until the first failure has been recorded.
        let mut saw_error = false;
        for _ in 0..100 {
            if let Some(err) = refresher.last_error() {
                assert!(matches!(
                    err.kind,
                    ErrorKind::Session { status_code: 503, .. }
                ));
                assert_eq!(refresher.session().access_token(), "T0");
                saw_error = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(saw_error);

        // Recovery clears the error and publishes a new token.
        let mut recovered = false;
        for _ in 0..100 {
            if refresher.session().access_token() != "T0" {
                assert!(refresher.last_error().is_none());
                recovered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(recovered);

        refresher.shutdown().await;
    }

    #[tokio::test]
    async fn test_live_session_sends_the_newest_token() {
        let mock_server = MockServer::start().await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let instance_url = mock_server.uri();
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(move |_: &wiremock::Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": format!("T{n}"),
                    "instance_url": instance_url,
                    "token_type": "Bearer"
                }))
            })
            .mount(&mock_server)
            .await;

        let mut refresher = Refresher::start(
            config(&mock_server.uri()),
            RefreshPolicy::every(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        let live = refresher.live();
        let pinned = refresher.session();

        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let newest = refresher.shutdown().await;
        assert_ne!(newest.access_token(), "T0");
        assert_eq!(pinned.access_token(), "T0");

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/limits"))
            .and(header(
                "Authorization",
                format!("Bearer {}", newest.access_token()).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = live.auth_header(
            live.http_doer()
                .get(format!("{}/limits", live.service_url())),
        );
        let response = live.http_doer().execute(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(live.instance_url(), mock_server.uri());
    }
}
