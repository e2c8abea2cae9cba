//! Single-record DML request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sforce_client::security::soql;
use sforce_client::{HasExternalField, HasFields, HasId, HasObject, SalesforceError};

use crate::error::{Error, Result};

/// A record addressed for a DML call.
///
/// Carries the object name, the field values to send and, depending on the
/// operation, either a record id or an external-id field/value pair.
///
/// ```rust
/// use sforce_rest::SObjectRecord;
///
/// let update = SObjectRecord::new("Account")
///     .with_id("001xx000003DGb2AAG")
///     .with_field("Name", "Acme");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SObjectRecord {
    sobject: String,
    id: String,
    external_field: String,
    external_value: String,
    fields: Map<String, Value>,
}

impl SObjectRecord {
    pub fn new(sobject: impl Into<String>) -> Self {
        Self {
            sobject: sobject.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Address the record by an external-id field, for upserts.
    pub fn with_external_id(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.external_field = field.into();
        self.external_value = value.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }
}

impl HasObject for SObjectRecord {
    fn sobject(&self) -> &str {
        &self.sobject
    }
}

impl HasFields for SObjectRecord {
    fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl HasId for SObjectRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasExternalField for SObjectRecord {
    fn external_field(&self) -> &str {
        &self.external_field
    }

    fn external_value(&self) -> &str {
        &self.external_value
    }
}

/// Response of an insert (`201 Created`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InsertValue {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
}

/// Response of an upsert. `created` tells a 201 from a 204; on an update
/// the platform sends no body, so `id` stays empty.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpsertValue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
}

/// Response of `GET /sobjects/<Object>/deleted`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecords {
    pub deleted_records: Vec<DeletedRecord>,
    #[serde(default)]
    pub earliest_date_available: String,
    #[serde(default)]
    pub latest_date_covered: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecord {
    pub id: String,
    pub deleted_date: String,
}

/// Response of `GET /sobjects/<Object>/updated`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRecords {
    pub ids: Vec<String>,
    #[serde(default)]
    pub latest_date_covered: String,
}

/// Which blob-bearing object `get_content` reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Attachment,
    Document,
}

impl ContentKind {
    pub fn sobject(&self) -> &'static str {
        match self {
            ContentKind::Attachment => "Attachment",
            ContentKind::Document => "Document",
        }
    }
}

pub(crate) fn validate_sobject(sobject: &str) -> Result<()> {
    if sobject.is_empty() {
        return Err(Error::validation("sobject name is required"));
    }
    if !soql::is_safe_sobject_name(sobject) {
        return Err(Error::validation(format!("invalid sobject name {sobject:?}")));
    }
    Ok(())
}

pub(crate) fn require(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{what} is required")));
    }
    Ok(())
}

/// Field values to send, without the `Id` the URL already carries.
pub(crate) fn body_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(name, _)| name.as_str() != "Id" && name.as_str() != "attributes")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
