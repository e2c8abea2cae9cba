//! Parent/child record graphs for tree inserts.
//!
//! ```rust
//! use serde_json::{json, Map};
//! use sforce_rest::TreeBuilder;
//!
//! let mut fields = Map::new();
//! fields.insert("LastName".into(), json!("Smith"));
//! let contact = TreeBuilder::new("Contact", "ref2", fields).unwrap().build();
//!
//! let mut fields = Map::new();
//! fields.insert("Name".into(), json!("Acme"));
//! let account = TreeBuilder::new("Account", "ref1", fields)
//!     .unwrap()
//!     .sub_records("Contacts", [contact])
//!     .build();
//! assert_eq!(account.children()[0].1.len(), 1);
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use sforce_client::{HasFields, Record};

use crate::error::{Error, Result};

/// One node of a tree insert.
///
/// Serializes as `{"attributes": {"type", "referenceId"}, <fields>,
/// <relationship>: {"records": [...]}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    sobject: String,
    reference_id: String,
    fields: Map<String, Value>,
    children: Vec<(String, Vec<TreeRecord>)>,
}

impl TreeRecord {
    /// Convert a decoded record's scalar fields. Lookups and `Id` are not
    /// part of an insert and are left out.
    pub fn from_record(record: &Record, reference_id: impl Into<String>) -> Self {
        let fields = record
            .fields()
            .iter()
            .filter(|(name, _)| name.as_str() != "Id")
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            sobject: record.object_type().to_string(),
            reference_id: reference_id.into(),
            fields,
            children: Vec::new(),
        }
    }

    pub fn sobject(&self) -> &str {
        &self.sobject
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Child records grouped by relationship name, in insertion order.
    pub fn children(&self) -> &[(String, Vec<TreeRecord>)] {
        &self.children
    }

    /// Number of records in this subtree, this one included.
    pub fn record_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|(_, records)| records)
            .map(TreeRecord::record_count)
            .sum::<usize>()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();

        let mut attributes = Map::new();
        attributes.insert("type".to_string(), Value::String(self.sobject.clone()));
        attributes.insert(
            "referenceId".to_string(),
            Value::String(self.reference_id.clone()),
        );
        map.insert("attributes".to_string(), Value::Object(attributes));

        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }

        for (relationship, records) in &self.children {
            let records = records.iter().map(TreeRecord::to_value).collect();
            let mut wrapper = Map::new();
            wrapper.insert("records".to_string(), Value::Array(records));
            map.insert(relationship.clone(), Value::Object(wrapper));
        }

        Value::Object(map)
    }
}

impl Serialize for TreeRecord {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Builds a [`TreeRecord`] and its children.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    record: TreeRecord,
}

impl TreeBuilder {
    /// Both `sobject` and `reference_id` must be non-empty.
    pub fn new(
        sobject: impl Into<String>,
        reference_id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Result<Self> {
        let sobject = sobject.into();
        let reference_id = reference_id.into();

        if sobject.is_empty() {
            return Err(Error::validation("tree record sobject is required"));
        }
        if reference_id.is_empty() {
            return Err(Error::validation("tree record reference id is required"));
        }

        Ok(Self {
            record: TreeRecord {
                sobject,
                reference_id,
                fields,
                children: Vec::new(),
            },
        })
    }

    /// Append `children` under `relationship`, e.g. `Contacts`.
    pub fn sub_records(
        mut self,
        relationship: impl Into<String>,
        children: impl IntoIterator<Item = TreeRecord>,
    ) -> Self {
        let relationship = relationship.into();
        match self
            .record
            .children
            .iter_mut()
            .find(|(name, _)| *name == relationship)
        {
            Some((_, records)) => records.extend(children),
            None => self
                .record
                .children
                .push((relationship, children.into_iter().collect())),
        }
        self
    }

    pub fn build(self) -> TreeRecord {
        self.record
    }
}
