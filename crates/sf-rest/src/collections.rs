//! SObject Collections (`/composite/sobjects`) request and result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sforce_client::{HasFields, HasId, HasObject, SalesforceError};

use crate::error::{Error, Result};
use crate::sobject::{body_fields, require, validate_sobject};

/// Most records one collections DML call accepts.
pub const MAX_COLLECTION_RECORDS: usize = 200;

/// Most ids one collections retrieve accepts.
pub const MAX_COLLECTION_IDS: usize = 2000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionRequest {
    pub all_or_none: bool,
    pub records: Vec<Value>,
}

impl CollectionRequest {
    /// Records for an insert: type and fields only.
    pub fn for_insert<R>(all_or_none: bool, records: &[R]) -> Result<Self>
    where
        R: HasObject + HasFields,
    {
        check_count(records.len(), MAX_COLLECTION_RECORDS)?;
        let records = records
            .iter()
            .map(|record| {
                validate_sobject(record.sobject())?;
                Ok(record_value(record.sobject(), body_fields(record.fields()), None))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            all_or_none,
            records,
        })
    }

    /// Records for an update: every record carries its id.
    pub fn for_update<R>(all_or_none: bool, records: &[R]) -> Result<Self>
    where
        R: HasObject + HasFields + HasId,
    {
        check_count(records.len(), MAX_COLLECTION_RECORDS)?;
        let records = records
            .iter()
            .map(|record| {
                validate_sobject(record.sobject())?;
                require(record.id(), "record id")?;
                Ok(record_value(
                    record.sobject(),
                    body_fields(record.fields()),
                    Some(record.id()),
                ))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            all_or_none,
            records,
        })
    }

    /// Records for an upsert on `external_field`: each must carry a value for it.
    pub fn for_upsert<R>(all_or_none: bool, external_field: &str, records: &[R]) -> Result<Self>
    where
        R: HasObject + HasFields,
    {
        check_count(records.len(), MAX_COLLECTION_RECORDS)?;
        let records = records
            .iter()
            .map(|record| {
                validate_sobject(record.sobject())?;
                if !record.fields().contains_key(external_field) {
                    return Err(Error::validation(format!(
                        "upsert record is missing external id field {external_field}"
                    )));
                }
                Ok(record_value(record.sobject(), body_fields(record.fields()), None))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            all_or_none,
            records,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RetrieveRequest<'a> {
    pub ids: &'a [String],
    pub fields: &'a [String],
}

fn record_value(sobject: &str, mut fields: Map<String, Value>, id: Option<&str>) -> Value {
    let mut attributes = Map::new();
    attributes.insert("type".to_string(), Value::String(sobject.to_string()));
    fields.insert("attributes".to_string(), Value::Object(attributes));
    if let Some(id) = id {
        fields.insert("id".to_string(), Value::String(id.to_string()));
    }
    Value::Object(fields)
}

pub(crate) fn check_count(count: usize, max: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::validation("at least one record is required"));
    }
    if count > max {
        return Err(Error::validation(format!(
            "{count} records exceed the limit of {max} per request"
        )));
    }
    Ok(())
}

/// Per-record outcome of a collections call, in request order.
///
/// `created` is only reported by upserts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CollectionResult {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SObjectRecord;
    use serde_json::json;

    #[test]
    fn test_insert_request_shape() {
        let records = vec![
            SObjectRecord::new("Account").with_field("Name", "Acme"),
            SObjectRecord::new("Account")
                .with_field("Name", "Widget Co")
                .with_field("Id", "ignored"),
        ];
        let request = CollectionRequest::for_insert(true, &records).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "allOrNone": true,
                "records": [
                    {"attributes": {"type": "Account"}, "Name": "Acme"},
                    {"attributes": {"type": "Account"}, "Name": "Widget Co"}
                ]
            })
        );
    }

    #[test]
    fn test_update_requires_ids() {
        let records = vec![SObjectRecord::new("Account").with_field("Name", "Acme")];
        assert!(CollectionRequest::for_update(false, &records)
            .unwrap_err()
            .is_validation());

        let records = vec![SObjectRecord::new("Account")
            .with_id("001")
            .with_field("Name", "Acme")];
        let request = CollectionRequest::for_update(false, &records).unwrap();
        assert_eq!(request.records[0]["id"], "001");
    }

    #[test]
    fn test_upsert_requires_external_field() {
        let records = vec![SObjectRecord::new("Account").with_field("Name", "Acme")];
        assert!(CollectionRequest::for_upsert(false, "ExtId__c", &records).is_err());
    }

    #[test]
    fn test_record_limits() {
        let none: Vec<SObjectRecord> = Vec::new();
        assert!(CollectionRequest::for_insert(false, &none).is_err());

        let many = vec![SObjectRecord::new("Account").with_field("Name", "x"); 201];
        let err = CollectionRequest::for_insert(false, &many).unwrap_err();
        assert!(err.to_string().contains("limit of 200"));
    }

    #[test]
    fn test_result_decoding() {
        let results: Vec<CollectionResult> = serde_json::from_value(json!([
            {"id": "001", "success": true, "errors": [], "created": true},
            {"success": false, "errors": [{"statusCode": "REQUIRED_FIELD_MISSING", "message": "Name", "fields": ["Name"]}]}
        ]))
        .unwrap();

        assert_eq!(results[0].created, Some(true));
        assert!(results[1].id.is_none());
        assert_eq!(results[1].errors[0].error_code, "REQUIRED_FIELD_MISSING");
    }
}
