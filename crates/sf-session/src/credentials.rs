//! The credential contract and the password and refresh-token grants.
//!
//! All credential types implement custom Debug to redact sensitive data.

use bytes::Bytes;

use crate::error::{Error, ErrorKind, Result};
use crate::{grant_type, PRODUCTION_LOGIN_URL};

/// Produces the body of an OAuth token request.
///
/// Implementations keep their secrets private; the session only ever sees
/// the encoded form body and where to send it.
pub trait Credential: Send + Sync + std::fmt::Debug {
    /// Form-encoded token request body for this grant.
    fn body(&self) -> Result<Bytes>;

    /// Base login URL, e.g. `https://login.salesforce.com`.
    fn login_url(&self) -> &str;
}

/// Username-password grant.
#[derive(Clone)]
pub struct PasswordCredential {
    login_url: String,
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl PasswordCredential {
    pub fn new(
        login_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Read the credential from the environment.
    ///
    /// Uses `SF_USERNAME`, `SF_PASSWORD`, `SF_CLIENT_ID`, `SF_CLIENT_SECRET`
    /// and optionally `SF_LOGIN_URL` (defaults to production).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            login_url_from_env(),
            env_var("SF_USERNAME")?,
            env_var("SF_PASSWORD")?,
            env_var("SF_CLIENT_ID")?,
            env_var("SF_CLIENT_SECRET")?,
        ))
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Credential for PasswordCredential {
    fn body(&self) -> Result<Bytes> {
        require("username", &self.username)?;
        require("client_id", &self.client_id)?;
        let body = serde_urlencoded::to_string([
            ("grant_type", grant_type::PASSWORD),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])?;
        Ok(Bytes::from(body))
    }

    fn login_url(&self) -> &str {
        &self.login_url
    }
}

/// Refresh-token grant.
#[derive(Clone)]
pub struct RefreshTokenCredential {
    login_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl std::fmt::Debug for RefreshTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenCredential")
            .field("login_url", &self.login_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl RefreshTokenCredential {
    pub fn new(
        login_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Read the credential from the environment.
    ///
    /// Uses `SF_CLIENT_ID`, `SF_CLIENT_SECRET`, `SF_REFRESH_TOKEN` and
    /// optionally `SF_LOGIN_URL` (defaults to production).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            login_url_from_env(),
            env_var("SF_CLIENT_ID")?,
            env_var("SF_CLIENT_SECRET")?,
            env_var("SF_REFRESH_TOKEN")?,
        ))
    }
}

impl Credential for RefreshTokenCredential {
    fn body(&self) -> Result<Bytes> {
        require("client_id", &self.client_id)?;
        require("refresh_token", &self.refresh_token)?;
        let body = serde_urlencoded::to_string([
            ("grant_type", grant_type::REFRESH_TOKEN),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ])?;
        Ok(Bytes::from(body))
    }

    fn login_url(&self) -> &str {
        &self.login_url
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::new(ErrorKind::InvalidCredentials(format!(
            "{name} is required"
        ))));
    }
    Ok(())
}

pub(crate) fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::new(ErrorKind::EnvVar(name.to_string())))
}

pub(crate) fn login_url_from_env() -> String {
    std::env::var("SF_LOGIN_URL")
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| PRODUCTION_LOGIN_URL.to_string())
}
