//! Polymorphic record model and the capability traits resources accept.
//!
//! A [`Record`] is decoded from an untyped JSON object. The `attributes`
//! block supplies the object type and resource URL, nested objects that carry
//! their own `attributes` become lookups, and everything else lands in
//! `fields`. Nulls are dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::time::parse_timestamp;

/// Something that names the sobject it belongs to.
pub trait HasObject {
    fn sobject(&self) -> &str;
}

/// Something that carries field values.
pub trait HasFields {
    fn fields(&self) -> &Map<String, Value>;
}

/// Something addressed by record id.
pub trait HasId {
    fn id(&self) -> &str;
}

/// Something addressed by an external id field and its value.
pub trait HasExternalField {
    fn external_field(&self) -> &str;
    fn external_value(&self) -> &str;
}

/// One object instance returned by the platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    object_type: String,
    self_url: String,
    fields: Map<String, Value>,
    lookups: BTreeMap<String, Record>,
}

/// True when `value` is an object carrying an `attributes` submap.
pub fn has_attributes(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get("attributes"))
        .is_some_and(Value::is_object)
}

impl Record {
    /// Start an empty record of the given type.
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            ..Self::default()
        }
    }

    /// Add a field value. Nulls are ignored and lookups belong in
    /// [`Record::with_lookup`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.fields.insert(name.into(), value);
        }
        self
    }

    pub fn with_lookup(mut self, name: impl Into<String>, record: Record) -> Self {
        self.lookups.insert(name.into(), record);
        self
    }

    /// Decode a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(Error::new(ErrorKind::Json(format!(
                "record must be a JSON object, got {}",
                json_type(&other)
            )))),
        }
    }

    /// Decode a record from a JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut record = Record::default();

        for (key, value) in map {
            if key == "attributes" {
                if let Value::Object(attributes) = value {
                    if let Some(Value::String(object_type)) = attributes.get("type") {
                        record.object_type = object_type.clone();
                    }
                    if let Some(Value::String(url)) = attributes.get("url") {
                        record.self_url = url.clone();
                    }
                }
                continue;
            }

            match value {
                Value::Null => {}
                Value::Object(nested) if nested.get("attributes").is_some_and(Value::is_object) => {
                    record.lookups.insert(key, Record::from_map(nested));
                }
                other => {
                    record.fields.insert(key, other);
                }
            }
        }

        record
    }

    /// Encode back to the platform's JSON shape.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();

        let mut attributes = Map::new();
        if !self.object_type.is_empty() {
            attributes.insert("type".to_string(), Value::String(self.object_type.clone()));
        }
        if !self.self_url.is_empty() {
            attributes.insert("url".to_string(), Value::String(self.self_url.clone()));
        }
        if !attributes.is_empty() {
            map.insert("attributes".to_string(), Value::Object(attributes));
        }

        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }
        for (name, lookup) in &self.lookups {
            map.insert(name.clone(), lookup.to_value());
        }

        Value::Object(map)
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Canonical resource path, e.g. `/services/data/v62.0/sobjects/Account/001...`.
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn lookups(&self) -> &BTreeMap<String, Record> {
        &self.lookups
    }

    pub fn lookup(&self, name: &str) -> Option<&Record> {
        self.lookups.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.field(name).and_then(Value::as_bool)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    /// Parse a date or datetime field.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.string(name).and_then(|raw| parse_timestamp(raw).ok())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl HasObject for Record {
    fn sobject(&self) -> &str {
        &self.object_type
    }
}

impl HasFields for Record {
    fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl HasId for Record {
    fn id(&self) -> &str {
        self.string("Id").unwrap_or_default()
    }
}

impl HasFields for Map<String, Value> {
    fn fields(&self) -> &Map<String, Value> {
        self
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Record::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
