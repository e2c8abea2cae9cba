//! Composite API request and response types.
//!
//! Three forms share one round-trip:
//! - batch (`/composite/batch`): independent subrequests, results in request order
//! - reference-chained (`/composite`): subrequests may cite earlier ones as `@{refId.field}`
//! - tree (`/composite/tree/<Object>`): parent records with nested children
//!
//! Every request type validates itself before anything is sent.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use sforce_client::security::soql;
use sforce_client::SalesforceError;

use crate::error::{Error, Result};
use crate::tree::TreeRecord;

/// Methods a subrequest may use.
pub const ALLOWED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Headers the platform sets itself and a subrequest may not override.
const RESERVED_HEADERS: [&str; 3] = ["accept", "authorization", "content-type"];

fn validate_method(method: &str) -> Result<()> {
    if ALLOWED_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid method {method:?}")))
    }
}

// ============================================================================
// Batch
// ============================================================================

/// `POST /composite/batch` body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeBatchRequest {
    pub halt_on_error: bool,
    pub batch_requests: Vec<CompositeBatchSubrequest>,
}

impl CompositeBatchRequest {
    pub fn new(halt_on_error: bool) -> Self {
        Self {
            halt_on_error,
            batch_requests: Vec::new(),
        }
    }

    pub fn add(mut self, subrequest: CompositeBatchSubrequest) -> Self {
        self.batch_requests.push(subrequest);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_requests.is_empty() {
            return Err(Error::validation("at least one subrequest is required"));
        }
        for subrequest in &self.batch_requests {
            subrequest.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeBatchSubrequest {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_part_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_part_name_alias: Option<String>,
}

impl CompositeBatchSubrequest {
    /// `url` is relative to the instance, e.g. `/services/data/v62.0/sobjects/Account/001`.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            rich_input: None,
            binary_part_name: None,
            binary_part_name_alias: None,
        }
    }

    pub fn with_rich_input(mut self, body: serde_json::Value) -> Self {
        self.rich_input = Some(body);
        self
    }

    pub fn with_binary_part(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.binary_part_name = Some(name.into());
        self.binary_part_name_alias = Some(alias.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::validation("subrequest url is required"));
        }
        validate_method(&self.method)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeBatchResponse {
    pub has_errors: bool,
    pub results: Vec<CompositeBatchSubresponse>,
}

/// One batch result; its position matches its subrequest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeBatchSubresponse {
    pub status_code: u16,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl CompositeBatchSubresponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Platform errors carried by a failed subrequest.
    pub fn errors(&self) -> Vec<SalesforceError> {
        if self.is_success() {
            return Vec::new();
        }
        serde_json::from_value(self.result.clone()).unwrap_or_default()
    }
}

// ============================================================================
// Reference-chained
// ============================================================================

/// `POST /composite` body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRequest {
    pub all_or_none: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub collate_subrequests: bool,
    #[serde(rename = "compositeRequest")]
    pub subrequests: Vec<CompositeSubrequest>,
}

impl CompositeRequest {
    pub fn new(all_or_none: bool) -> Self {
        Self {
            all_or_none,
            ..Self::default()
        }
    }

    pub fn add(mut self, subrequest: CompositeSubrequest) -> Self {
        self.subrequests.push(subrequest);
        self
    }

    /// Reference ids must be present and unique; reserved headers are rejected.
    pub fn validate(&self) -> Result<()> {
        if self.subrequests.is_empty() {
            return Err(Error::validation("at least one subrequest is required"));
        }

        let mut seen = HashSet::new();
        for subrequest in &self.subrequests {
            subrequest.validate()?;
            if !seen.insert(subrequest.reference_id.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate reference id {:?}",
                    subrequest.reference_id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSubrequest {
    pub method: String,
    pub url: String,
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl CompositeSubrequest {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            reference_id: reference_id.into(),
            http_headers: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::validation("subrequest url is required"));
        }
        if self.reference_id.is_empty() {
            return Err(Error::validation("subrequest reference id is required"));
        }
        validate_method(&self.method)?;

        if let Some(headers) = &self.http_headers {
            for name in headers.keys() {
                if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                    return Err(Error::validation(format!(
                        "subrequest {:?} may not set header {name}",
                        self.reference_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompositeResponse {
    #[serde(rename = "compositeResponse")]
    pub responses: Vec<CompositeSubresponse>,
}

impl CompositeResponse {
    pub fn get(&self, reference_id: &str) -> Option<&CompositeSubresponse> {
        self.responses
            .iter()
            .find(|response| response.reference_id == reference_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSubresponse {
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
    pub http_status_code: u16,
    pub reference_id: String,
}

impl CompositeSubresponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status_code)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// `POST /composite/tree/<Object>` body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompositeTreeRequest {
    pub records: Vec<TreeRecord>,
}

impl CompositeTreeRequest {
    pub fn new(records: Vec<TreeRecord>) -> Self {
        Self { records }
    }

    /// The root must be a `\w+` object name and every record, children
    /// included, needs a reference id.
    pub fn validate(&self, sobject: &str) -> Result<()> {
        if !soql::is_safe_sobject_name(sobject) {
            return Err(Error::validation(format!(
                "invalid tree root object {sobject:?}"
            )));
        }
        if self.records.is_empty() {
            return Err(Error::validation("at least one tree record is required"));
        }
        self.records.iter().try_for_each(validate_tree_record)
    }
}

fn validate_tree_record(record: &TreeRecord) -> Result<()> {
    if record.reference_id().is_empty() {
        return Err(Error::validation(format!(
            "{} tree record is missing a reference id",
            record.sobject()
        )));
    }
    record
        .children()
        .iter()
        .flat_map(|(_, children)| children)
        .try_for_each(validate_tree_record)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTreeResponse {
    pub has_errors: bool,
    pub results: Vec<CompositeTreeResult>,
}

impl CompositeTreeResponse {
    /// Id assigned to the record with `reference_id`.
    pub fn id_for(&self, reference_id: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|result| result.reference_id == reference_id)
            .and_then(|result| result.id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTreeResult {
    pub reference_id: String,
    pub id: Option<String>,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
}
