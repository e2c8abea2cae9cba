//! The capability every resource is built from.

use crate::client::SfHttpClient;
use crate::request::RequestBuilder;

/// Everything a resource needs to talk to an org: where, as whom, and how.
///
/// This is the only coupling between resources and authentication. A session
/// implements it directly, a refresher hands out a live view that reads the
/// newest session on every call, and a fixed token can stand in for tests.
pub trait ServiceFormatter: Send + Sync {
    /// Base URL of the org, e.g. `https://na1.salesforce.com`.
    ///
    /// Owned, because a refreshed session may move the org to a new host.
    fn instance_url(&self) -> String;

    /// Versioned REST root, `<instance_url>/services/data/v<N>.0`.
    fn service_url(&self) -> String;

    /// Attach the `Authorization` header to a request.
    fn auth_header(&self, request: RequestBuilder) -> RequestBuilder;

    /// The injected HTTP doer.
    fn http_doer(&self) -> &SfHttpClient;
}

/// Format the versioned REST root for an instance.
pub fn service_url(instance_url: &str, api_version: u32) -> String {
    format!(
        "{}/services/data/v{}.0",
        instance_url.trim_end_matches('/'),
        api_version
    )
}
