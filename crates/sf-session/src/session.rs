//! Authenticated sessions.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use sforce_client::{service_url, RequestBuilder, ServiceFormatter, SfHttpClient};

use crate::configuration::Configuration;
use crate::credentials::Credential;
use crate::error::{Error, ErrorKind, Result};

/// An authenticated connection to one org.
///
/// Immutable once opened. Refreshing produces a new session rather than
/// changing this one. The access token is redacted in Debug output.
#[derive(Clone)]
pub struct Session {
    token_type: String,
    access_token: String,
    instance_url: String,
    id: String,
    issued_at: String,
    signature: String,
    api_version: u32,
    http_doer: SfHttpClient,
    credential: Arc<dyn Credential>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token_type", &self.token_type)
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("issued_at", &self.issued_at)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub issued_at: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("signature", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth error body; only used for logging.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

impl Session {
    /// Authenticate with the configured credential.
    ///
    /// POSTs the credential's form body to `<login_url>/services/oauth2/token`.
    /// Any status other than 200 fails with [`ErrorKind::Session`].
    #[instrument(skip(config), fields(login_url = config.credential.login_url()))]
    pub async fn open(config: &Configuration) -> Result<Self> {
        let credential = config.credential.clone();
        let url = format!(
            "{}/services/oauth2/token",
            credential.login_url().trim_end_matches('/')
        );

        let request = config
            .http_doer
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .accept_json()
            .bytes(credential.body()?);

        let response = config.http_doer.execute(request).await?;
        let status = response.status();
        if status != 200 {
            let status_text = response.status_text().to_string();
            if let Ok(body) = response.text().await {
                if let Ok(oauth) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                    warn!(
                        status,
                        error = %oauth.error,
                        description = %oauth.error_description,
                        "Token request rejected"
                    );
                }
            }
            return Err(Error::new(ErrorKind::Session {
                status_code: status,
                status_text,
            }));
        }

        let token: TokenResponse = response.json().await?;
        let session = Self::from_token_response(token, config)?;
        debug!(instance_url = %session.instance_url, "Session opened");
        Ok(session)
    }

    /// Build a session from a token response obtained elsewhere.
    pub fn from_token_response(token: TokenResponse, config: &Configuration) -> Result<Self> {
        if token.access_token.is_empty() {
            return Err(Error::new(ErrorKind::TokenResponse(
                "missing access_token".to_string(),
            )));
        }
        if token.instance_url.is_empty() {
            return Err(Error::new(ErrorKind::TokenResponse(
                "missing instance_url".to_string(),
            )));
        }
        url::Url::parse(&token.instance_url)?;

        let token_type = if token.token_type.is_empty() {
            "Bearer".to_string()
        } else {
            token.token_type
        };

        Ok(Self {
            token_type,
            access_token: token.access_token,
            instance_url: token.instance_url.trim_end_matches('/').to_string(),
            id: token.id,
            issued_at: token.issued_at,
            signature: token.signature,
            api_version: config.api_version,
            http_doer: config.http_doer.clone(),
            credential: config.credential.clone(),
        })
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Identity URL of the authenticated user.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Milliseconds since the epoch, as sent by the token endpoint.
    pub fn issued_at(&self) -> &str {
        &self.issued_at
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn credential(&self) -> &Arc<dyn Credential> {
        &self.credential
    }
}

impl ServiceFormatter for Session {
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
        &self.http_doer
    }
}
