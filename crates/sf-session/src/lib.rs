//! # sforce-session
//!
//! Authenticated sessions for Salesforce APIs.
//!
//! A [`Credential`] produces the token request body for one OAuth grant.
//! [`Session::open`] exchanges it for an access token and implements
//! [`ServiceFormatter`](sforce_client::ServiceFormatter), so any resource
//! client can use it. [`Refresher`] keeps a session fresh in the background.
//!
//! Tokens and secrets are redacted in Debug output and never logged.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use sforce_session::{Configuration, PasswordCredential, RefreshPolicy, Refresher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sforce_session::Error> {
//!     let config = Configuration::with_default_doer(PasswordCredential::from_env()?)?;
//!
//!     let refresher = Refresher::start(config, RefreshPolicy::every(Duration::from_secs(3600))).await?;
//!     // Every call through `live` reads the newest token.
//!     let live = refresher.live();
//!     println!("{}", sforce_client::ServiceFormatter::service_url(&live));
//!     Ok(())
//! }
//! ```

mod configuration;
mod credentials;
mod error;
mod jwt;
mod refresher;
mod session;

pub use configuration::Configuration;
pub use credentials::{Credential, PasswordCredential, RefreshTokenCredential};
pub use error::{Error, ErrorKind, Result};
pub use jwt::JwtCredential;
pub use refresher::{LiveSession, RefreshPolicy, Refresher, DEFAULT_RETRY_INTERVAL};
pub use session::{Session, TokenResponse};

/// Default Salesforce login URL for production.
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Default Salesforce login URL for sandbox.
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";

/// OAuth `grant_type` values.
pub mod grant_type {
    pub const PASSWORD: &str = "password";
    pub const JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}
