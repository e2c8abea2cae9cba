//! Describe and metadata response types.
//!
//! Every field defaults when the server leaves it out, so the same types
//! decode across API versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sforce_client::Record;

/// What the running user may do with an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectCapabilities {
    pub createable: bool,
    pub updateable: bool,
    pub deletable: bool,
    pub undeletable: bool,
    pub mergeable: bool,
    pub queryable: bool,
    pub retrieveable: bool,
    pub searchable: bool,
}

/// Summary of one object, as listed by describe-global and metadata calls.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SObjectBasicInfo {
    pub name: String,
    pub label: String,
    pub label_plural: String,
    pub key_prefix: Option<String>,
    pub custom: bool,
    #[serde(flatten)]
    pub capabilities: ObjectCapabilities,
    pub urls: BTreeMap<String, String>,
}

/// `GET /sobjects`: every object visible to the user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescribeGlobalResult {
    pub encoding: String,
    pub max_batch_size: u32,
    pub sobjects: Vec<SObjectBasicInfo>,
}

impl DescribeGlobalResult {
    pub fn sobject(&self, name: &str) -> Option<&SObjectBasicInfo> {
        self.sobjects.iter().find(|info| info.name == name)
    }
}

/// `GET /sobjects/<Object>`: basic metadata plus recently viewed records.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SObjectMetadata {
    pub object_describe: SObjectBasicInfo,
    pub recent_items: Vec<Record>,
}

/// `GET /sobjects/<Object>/describe`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescribeSObjectResult {
    #[serde(flatten)]
    pub info: SObjectBasicInfo,
    pub fields: Vec<FieldDescribe>,
    pub child_relationships: Vec<ChildRelationship>,
    pub record_type_infos: Vec<RecordTypeInfo>,
}

impl DescribeSObjectResult {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescribe> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Child relationship by name, e.g. `Contacts` on `Account`.
    pub fn child_relationship(&self, name: &str) -> Option<&ChildRelationship> {
        self.child_relationships
            .iter()
            .find(|rel| rel.relationship_name.as_deref() == Some(name))
    }

    /// Fields usable as the key of an upsert.
    pub fn external_id_fields(&self) -> impl Iterator<Item = &FieldDescribe> {
        self.fields.iter().filter(|field| field.access.external_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChildRelationship {
    #[serde(rename = "childSObject")]
    pub child_sobject: String,
    pub field: String,
    pub relationship_name: Option<String>,
    pub cascade_delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordTypeInfo {
    pub name: String,
    pub record_type_id: String,
    pub developer_name: Option<String>,
    pub active: bool,
    pub available: bool,
    pub default_record_type_mapping: bool,
    pub master: bool,
}

/// How a field may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldAccess {
    pub createable: bool,
    pub updateable: bool,
    pub nillable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub unique: bool,
    pub external_id: bool,
    pub id_lookup: bool,
    pub calculated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldDescribe {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub soap_type: Option<String>,
    pub custom: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    #[serde(flatten)]
    pub access: FieldAccess,
    pub default_value: Option<Value>,
    /// Target objects of a lookup or master-detail field.
    pub reference_to: Vec<String>,
    pub relationship_name: Option<String>,
    pub picklist_values: Vec<PicklistValue>,
}

impl FieldDescribe {
    /// Active picklist values, in server order.
    pub fn active_values(&self) -> impl Iterator<Item = &str> {
        self.picklist_values
            .iter()
            .filter(|value| value.active)
            .map(|value| value.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PicklistValue {
    pub value: String,
    pub label: String,
    pub active: bool,
    pub default_value: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_global() {
        let result: DescribeGlobalResult = serde_json::from_value(json!({
            "encoding": "UTF-8",
            "maxBatchSize": 200,
            "sobjects": [{
                "name": "Account",
                "label": "Account",
                "labelPlural": "Accounts",
                "keyPrefix": "001",
                "queryable": true,
                "createable": true,
                "urls": {"sobject": "/services/data/v62.0/sobjects/Account"}
            }]
        }))
        .unwrap();

        assert_eq!(result.max_batch_size, 200);
        let account = result.sobject("Account").unwrap();
        assert_eq!(account.key_prefix.as_deref(), Some("001"));
        assert!(account.capabilities.queryable);
        assert!(!account.capabilities.deletable);
        assert!(result.sobject("Contact").is_none());
    }

    #[test]
    fn test_metadata_recent_items_are_records() {
        let metadata: SObjectMetadata = serde_json::from_value(json!({
            "objectDescribe": {"name": "Account", "label": "Account"},
            "recentItems": [{
                "attributes": {"type": "Account", "url": "/services/data/v62.0/sobjects/Account/001"},
                "Id": "001",
                "Name": "Acme"
            }]
        }))
        .unwrap();

        assert_eq!(metadata.object_describe.name, "Account");
        assert_eq!(metadata.recent_items[0].object_type(), "Account");
        assert_eq!(metadata.recent_items[0].string("Name"), Some("Acme"));
    }

    #[test]
    fn test_describe_helpers() {
        let describe: DescribeSObjectResult = serde_json::from_value(json!({
            "name": "Account",
            "label": "Account",
            "updateable": true,
            "fields": [
                {"name": "Name", "label": "Account Name", "type": "string", "length": 255,
                 "createable": true, "nillable": false},
                {"name": "Rating", "type": "picklist", "referenceTo": [],
                 "picklistValues": [
                     {"value": "Hot", "label": "Hot", "active": true},
                     {"value": "Tepid", "label": "Tepid", "active": false}
                 ]},
                {"name": "Ext__c", "type": "string", "externalId": true, "custom": true}
            ],
            "childRelationships": [
                {"childSObject": "Contact", "field": "AccountId", "relationshipName": "Contacts"}
            ]
        }))
        .unwrap();

        assert_eq!(describe.name(), "Account");
        assert!(describe.info.capabilities.updateable);

        let name = describe.field("Name").unwrap();
        assert_eq!(name.field_type, "string");
        assert_eq!(name.length, Some(255));
        assert!(name.access.createable);

        let rating: Vec<_> = describe.field("Rating").unwrap().active_values().collect();
        assert_eq!(rating, ["Hot"]);

        let external: Vec<_> = describe.external_id_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(external, ["Ext__c"]);

        assert_eq!(
            describe.child_relationship("Contacts").unwrap().child_sobject,
            "Contact"
        );
        assert!(describe.field("Missing").is_none());
    }
}
