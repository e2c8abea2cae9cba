//! SOQL query builder.
//!
//! # Example
//!
//! ```rust
//! use sforce_rest::{OrderBy, SoqlQuery, WhereClause};
//!
//! let query = SoqlQuery::new("Account")
//!     .fields(["Name", "CreatedBy"])
//!     .subquery(SoqlQuery::new("Contacts").fields(["LastName"]))
//!     .filter(WhereClause::equals("Name", "Super Gary")?)
//!     .order_by(OrderBy::asc(["Name"]))
//!     .limit(10);
//!
//! assert_eq!(
//!     query.compile()?,
//!     "SELECT Name,CreatedBy,(SELECT LastName FROM Contacts) FROM Account \
//!      WHERE Name = 'Super Gary' ORDER BY Name ASC LIMIT 10"
//! );
//! # Ok::<(), sforce_rest::Error>(())
//! ```

use sforce_client::security::soql;

use crate::error::{Error, Result};
use crate::where_clause::WhereClause;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// `ORDER BY f1,f2 ASC|DESC [NULLS FIRST|LAST]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    fields: Vec<String>,
    direction: OrderDirection,
    nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn new<S: Into<String>>(
        fields: impl IntoIterator<Item = S>,
        direction: OrderDirection,
    ) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            direction,
            nulls: None,
        }
    }

    pub fn asc<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::new(fields, OrderDirection::Asc)
    }

    pub fn desc<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::new(fields, OrderDirection::Desc)
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    fn compile(&self) -> Result<String> {
        if self.fields.is_empty() {
            return Err(Error::validation("ORDER BY needs at least one field"));
        }
        for field in &self.fields {
            validate_field(field)?;
        }

        let mut clause = format!(
            "ORDER BY {} {}",
            self.fields.join(","),
            match self.direction {
                OrderDirection::Asc => "ASC",
                OrderDirection::Desc => "DESC",
            }
        );
        match self.nulls {
            Some(NullsOrder::First) => clause.push_str(" NULLS FIRST"),
            Some(NullsOrder::Last) => clause.push_str(" NULLS LAST"),
            None => {}
        }
        Ok(clause)
    }
}

/// A SOQL SELECT statement.
///
/// Subqueries use the child relationship name as their object, e.g.
/// `Contacts` under `Account`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoqlQuery {
    object: String,
    fields: Vec<String>,
    subqueries: Vec<SoqlQuery>,
    filter: Option<WhereClause>,
    order_by: Option<OrderBy>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SoqlQuery {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            ..Self::default()
        }
    }

    /// Append fields to the select list.
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn subquery(mut self, subquery: SoqlQuery) -> Self {
        self.subqueries.push(subquery);
        self
    }

    /// Set the WHERE expression, replacing any earlier one.
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.filter = Some(clause);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Render the statement. Fails when the object or the field list is empty.
    pub fn compile(&self) -> Result<String> {
        if self.object.is_empty() {
            return Err(Error::validation("SOQL object is required"));
        }
        if !soql::is_safe_sobject_name(&self.object) {
            return Err(Error::validation(format!(
                "invalid SOQL object {:?}",
                self.object
            )));
        }
        if self.fields.is_empty() {
            return Err(Error::validation(format!(
                "SOQL query on {} needs at least one field",
                self.object
            )));
        }

        let mut select = Vec::with_capacity(self.fields.len() + self.subqueries.len());
        for field in &self.fields {
            validate_field(field)?;
            select.push(field.clone());
        }
        for subquery in &self.subqueries {
            select.push(format!("({})", subquery.compile()?));
        }

        let mut query = format!("SELECT {} FROM {}", select.join(","), self.object);

        if let Some(filter) = &self.filter {
            query.push_str(" WHERE ");
            query.push_str(&filter.to_string());
        }
        if let Some(order_by) = &self.order_by {
            query.push(' ');
            query.push_str(&order_by.compile()?);
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            query.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(query)
    }
}

fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() || field.contains(char::is_whitespace) {
        return Err(Error::validation(format!("invalid field name {field:?}")));
    }
    Ok(())
}

/// Anything that can be sent as a SOQL query: a builder or a raw string.
pub trait ToSoql {
    fn to_soql(&self) -> Result<String>;
}

impl ToSoql for SoqlQuery {
    fn to_soql(&self) -> Result<String> {
        self.compile()
    }
}

impl ToSoql for str {
    fn to_soql(&self) -> Result<String> {
        if self.trim().is_empty() {
            return Err(Error::validation("SOQL query is empty"));
        }
        Ok(self.to_string())
    }
}

impl ToSoql for String {
    fn to_soql(&self) -> Result<String> {
        self.as_str().to_soql()
    }
}
