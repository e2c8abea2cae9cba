//! The canonical error value returned by the platform.
//!
//! Error bodies come in two shapes depending on the endpoint: REST resources
//! use `errorCode`, while composite and collection results use `statusCode`.
//! Both decode into the same [`SalesforceError`].

use std::fmt;

use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// A single error reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesforceError {
    /// Error code, decoded from either `errorCode` or `statusCode`.
    #[serde(rename = "errorCode")]
    pub error_code: String,
    /// Human readable message.
    pub message: String,
    /// Fields the error applies to.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl SalesforceError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

impl fmt::Display for SalesforceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

// Missing keys and nulls leave the field empty. A present key with the wrong
// JSON type fails the decode. When both code keys appear the later one wins.
impl<'de> Deserialize<'de> for SalesforceError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ErrorVisitor;

        impl<'de> Visitor<'de> for ErrorVisitor {
            type Value = SalesforceError;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a Salesforce error object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut error = SalesforceError::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "errorCode" | "statusCode" => {
                            if let Some(code) = map.next_value::<Option<String>>()? {
                                error.error_code = code;
                            }
                        }
                        "message" => {
                            if let Some(message) = map.next_value::<Option<String>>()? {
                                error.message = message;
                            }
                        }
                        "fields" => {
                            if let Some(fields) = map.next_value::<Option<Vec<String>>>()? {
                                error.fields = fields;
                            }
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(error)
            }
        }

        deserializer.deserialize_map(ErrorVisitor)
    }
}

/// Decode an error body as either a list of errors or a single error object.
///
/// Returns `None` when the body is neither shape, or when any entry lacks an
/// error code (a resource body such as `{"id":..,"state":..}` is not an error).
pub fn decode_errors(body: &str) -> Option<Vec<SalesforceError>> {
    let errors = match serde_json::from_str::<Vec<SalesforceError>>(body) {
        Ok(errors) => errors,
        Err(_) => vec![serde_json::from_str::<SalesforceError>(body).ok()?],
    };
    errors
        .iter()
        .all(|error| !error.error_code.is_empty())
        .then_some(errors)
}
