//! Paginated SOQL results.
//!
//! A [`QueryResult`] is one page of records. Records returned by a query
//! with subqueries carry their child rows as nested results in
//! [`QueryRecord::subresults`], each of which pages the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use sforce_client::{Record, ResponseExt, ServiceFormatter};

use crate::error::{Error, ErrorKind, Result};

/// One page of a SOQL response.
#[derive(Clone)]
pub struct QueryResult {
    pub done: bool,
    pub total_size: u64,
    /// Path of the next page relative to the instance url, empty on the last page.
    pub next_records_url: String,
    pub records: Vec<QueryRecord>,
    formatter: Option<Arc<dyn ServiceFormatter>>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("done", &self.done)
            .field("total_size", &self.total_size)
            .field("next_records_url", &self.next_records_url)
            .field("records", &self.records)
            .finish()
    }
}

impl PartialEq for QueryResult {
    fn eq(&self, other: &Self) -> bool {
        self.done == other.done
            && self.total_size == other.total_size
            && self.next_records_url == other.next_records_url
            && self.records == other.records
    }
}

/// A record plus the nested results of its subqueries, keyed by
/// relationship name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRecord {
    pub record: Record,
    pub subresults: BTreeMap<String, QueryResult>,
}

impl QueryRecord {
    pub fn subresult(&self, relationship: &str) -> Option<&QueryResult> {
        self.subresults.get(relationship)
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self> {
        let nested: Vec<String> = map
            .iter()
            .filter(|(_, value)| is_subquery(value))
            .map(|(key, _)| key.clone())
            .collect();

        let mut subresults = BTreeMap::new();
        for key in nested {
            if let Some(value) = map.remove(&key) {
                subresults.insert(key, QueryResult::from_value(value)?);
            }
        }

        Ok(Self {
            record: Record::from_map(map),
            subresults,
        })
    }
}

impl std::ops::Deref for QueryRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

/// A nested object is a subquery result when it carries `done`, `totalSize`
/// and `records` together. An `attributes` block makes it a lookup instead.
fn is_subquery(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            !map.get("attributes").is_some_and(Value::is_object)
                && map.get("done").is_some_and(Value::is_boolean)
                && map.get("totalSize").is_some_and(Value::is_number)
                && map.get("records").is_some_and(Value::is_array)
        }
        _ => false,
    }
}

impl QueryResult {
    /// Decode a `{done, totalSize, nextRecordsUrl, records}` document.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::new(ErrorKind::Json(
                "query result must be a JSON object".to_string(),
            )));
        };

        let done = match map.remove("done") {
            Some(Value::Bool(done)) => done,
            None => true,
            Some(other) => return Err(type_error("done", "a boolean", &other)),
        };
        let total_size = match map.remove("totalSize") {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| type_error("totalSize", "a count", &Value::Number(n.clone())))?,
            None => 0,
            Some(other) => return Err(type_error("totalSize", "a count", &other)),
        };
        let next_records_url = match map.remove("nextRecordsUrl") {
            Some(Value::String(url)) => url,
            Some(Value::Null) | None => String::new(),
            Some(other) => return Err(type_error("nextRecordsUrl", "a string", &other)),
        };
        let records = match map.remove("records") {
            Some(Value::Array(records)) => records
                .into_iter()
                .map(|record| match record {
                    Value::Object(map) => QueryRecord::from_map(map),
                    other => Err(type_error("records[]", "an object", &other)),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => return Err(type_error("records", "an array", &other)),
        };

        Ok(Self {
            done,
            total_size,
            next_records_url,
            records,
            formatter: None,
        })
    }

    /// Bind this page, and every nested page, to the session that fetched it
    /// so [`QueryResult::next`] can follow `next_records_url`.
    pub(crate) fn attach(mut self, formatter: &Arc<dyn ServiceFormatter>) -> Self {
        self.formatter = Some(Arc::clone(formatter));
        for record in &mut self.records {
            let subresults = std::mem::take(&mut record.subresults);
            record.subresults = subresults
                .into_iter()
                .map(|(name, result)| (name, result.attach(formatter)))
                .collect();
        }
        self
    }

    pub fn has_more(&self) -> bool {
        !self.next_records_url.is_empty()
    }

    /// Fetch the following page, or `None` on the last one.
    #[instrument(skip(self), fields(next = %self.next_records_url))]
    pub async fn next(&self) -> Result<Option<QueryResult>> {
        if !self.has_more() {
            return Ok(None);
        }
        let formatter = self.formatter.as_ref().ok_or_else(|| {
            Error::validation("query result is not bound to a session; cannot page")
        })?;

        let url = format!(
            "{}{}",
            formatter.instance_url().trim_end_matches('/'),
            self.next_records_url
        );
        debug!(url = %url, "Fetching next query page");

        let request = formatter.auth_header(formatter.http_doer().get(url).accept_json());
        let response = formatter
            .http_doer()
            .execute(request)
            .await?
            .expect_status(&[200])
            .await?;
        let value: Value = response.json().await?;

        Ok(Some(QueryResult::from_value(value)?.attach(formatter)))
    }

    /// Follow every remaining page and return all records in order.
    pub async fn all(self) -> Result<Vec<QueryRecord>> {
        // totalSize is the server's estimate, not something to allocate against.
        let mut records = Vec::with_capacity(self.records.len());
        let mut page = Some(self);

        while let Some(mut current) = page {
            let next = current.next().await?;
            records.append(&mut current.records);
            page = next;
        }

        Ok(records)
    }
}

fn type_error(key: &str, expected: &str, got: &Value) -> Error {
    Error::new(ErrorKind::Json(format!(
        "query result key {key:?} must be {expected}, got {got}"
    )))
}
