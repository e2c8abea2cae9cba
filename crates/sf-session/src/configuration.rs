//! Session construction input.

use std::sync::Arc;

use sforce_client::{ClientConfig, SfHttpClient, DEFAULT_API_VERSION};

use crate::credentials::Credential;
use crate::error::Result;

/// Everything needed to open a session: which grant, which doer, which API
/// version.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub credential: Arc<dyn Credential>,
    pub http_doer: SfHttpClient,
    pub api_version: u32,
}

impl Configuration {
    /// Use `credential` with an explicitly supplied HTTP doer.
    pub fn new(credential: impl Credential + 'static, http_doer: SfHttpClient) -> Self {
        Self {
            credential: Arc::new(credential),
            http_doer,
            api_version: DEFAULT_API_VERSION,
        }
    }

    /// Use `credential` with a doer built from [`ClientConfig::default`].
    pub fn with_default_doer(credential: impl Credential + 'static) -> Result<Self> {
        Ok(Self::new(credential, SfHttpClient::new(ClientConfig::default())?))
    }

    pub fn with_http_doer(mut self, http_doer: SfHttpClient) -> Self {
        self.http_doer = http_doer;
        self
    }

    /// Set the REST API version, e.g. `62` for `v62.0`.
    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PasswordCredential;

    #[test]
    fn test_defaults_and_overrides() {
        let config =
            Configuration::with_default_doer(PasswordCredential::new("http://x", "u", "p", "c", "s"))
                .unwrap();
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.credential.login_url(), "http://x");

        let config = config.with_api_version(44);
        assert_eq!(config.api_version, 44);
    }
}
