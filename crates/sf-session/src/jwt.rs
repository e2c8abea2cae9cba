//! JWT Bearer grant.

use bytes::Bytes;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::credentials::Credential;
use crate::error::Result;
use crate::grant_type;

/// JWT Bearer grant for server-to-server integration.
///
/// Requires a connected app with a certificate configured. Each call to
/// [`Credential::body`] signs a fresh assertion.
#[derive(Clone)]
pub struct JwtCredential {
    login_url: String,
    /// Consumer key (client_id) from the connected app.
    client_id: String,
    /// Username of the Salesforce user to authenticate as.
    username: String,
    /// RSA private key for signing the JWT (PEM format).
    private_key: Vec<u8>,
    /// Assertion lifetime (default: 3 minutes).
    expiration: Duration,
}

impl std::fmt::Debug for JwtCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCredential")
            .field("login_url", &self.login_url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("private_key", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl JwtCredential {
    pub fn new(
        login_url: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
        private_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            login_url: login_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            username: username.into(),
            private_key: private_key.into(),
            expiration: Duration::minutes(3),
        }
    }

    /// Load the private key from a file.
    pub fn from_key_file(
        login_url: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
        key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let private_key = std::fs::read(key_path.as_ref())?;
        Ok(Self::new(login_url, client_id, username, private_key))
    }

    /// Set the assertion lifetime.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Sign an assertion for the configured login URL.
    pub fn assertion(&self) -> Result<String> {
        let claims = JwtClaims {
            iss: &self.client_id,
            sub: &self.username,
            aud: &self.login_url,
            exp: (Utc::now() + self.expiration).timestamp(),
        };

        let key = EncodingKey::from_rsa_pem(&self.private_key)?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

impl Credential for JwtCredential {
    fn body(&self) -> Result<Bytes> {
        let assertion = self.assertion()?;
        let body = serde_urlencoded::to_string([
            ("grant_type", grant_type::JWT_BEARER),
            ("assertion", assertion.as_str()),
        ])?;
        Ok(Bytes::from(body))
    }

    fn login_url(&self) -> &str {
        &self.login_url
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde::Deserialize;

    const PRIVATE_KEY: &[u8] = include_bytes!("../testdata/jwt_test_key.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../testdata/jwt_test_key.pub.pem");

    #[derive(Debug, Deserialize)]
    struct Claims {
        iss: String,
        sub: String,
        aud: String,
        exp: i64,
    }

    fn credential() -> JwtCredential {
        JwtCredential::new(
            "https://login.salesforce.com",
            "consumer-key",
            "user@example.com",
            PRIVATE_KEY,
        )
    }

    #[test]
    fn test_assertion_claims() {
        let assertion = credential().assertion().unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://login.salesforce.com"]);
        let decoded = decode::<Claims>(
            &assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, "consumer-key");
        assert_eq!(decoded.claims.sub, "user@example.com");
        assert_eq!(decoded.claims.aud, "https://login.salesforce.com");

        let lifetime = decoded.claims.exp - Utc::now().timestamp();
        assert!((170..=180).contains(&lifetime), "lifetime {lifetime}");
    }

    #[test]
    fn test_body_carries_grant_and_assertion() {
        let body = String::from_utf8(credential().body().unwrap().to_vec()).unwrap();
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&body).unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("grant_type".to_string(), grant_type::JWT_BEARER.to_string()));
        assert_eq!(pairs[1].0, "assertion");
        assert_eq!(pairs[1].1.split('.').count(), 3);
    }

    #[test]
    fn test_invalid_key_is_jwt_error() {
        let cred = JwtCredential::new("https://x", "c", "u", b"not a key".to_vec());
        let err = cred.body().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Jwt(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", credential());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("BEGIN RSA"));
    }
}
