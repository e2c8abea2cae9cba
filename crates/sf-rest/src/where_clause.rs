//! WHERE expressions for the SOQL builder.
//!
//! Leaves compare one field with a value; `and`/`or` chain expressions left
//! to right and `group` adds parentheses. Each leaf checks its operator
//! against the value type when it is built.
//!
//! String values are quoted but not escaped. Use
//! [`sforce_client::security::soql::escape_string`] on untrusted input first.

use std::fmt;

use chrono::{DateTime, Utc};

use sforce_client::time::format_timestamp;

use crate::error::{Error, Result};

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum SoqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl SoqlValue {
    fn type_name(&self) -> &'static str {
        match self {
            SoqlValue::Null => "null",
            SoqlValue::Bool(_) => "bool",
            SoqlValue::Int(_) | SoqlValue::Float(_) => "number",
            SoqlValue::String(_) => "string",
            SoqlValue::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for SoqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoqlValue::Null => f.write_str("null"),
            SoqlValue::Bool(value) => write!(f, "{value}"),
            SoqlValue::Int(value) => write!(f, "{value}"),
            SoqlValue::Float(value) => write!(f, "{value}"),
            SoqlValue::String(value) => write!(f, "'{value}'"),
            SoqlValue::Timestamp(value) => f.write_str(&format_timestamp(value)),
        }
    }
}

impl From<&str> for SoqlValue {
    fn from(value: &str) -> Self {
        SoqlValue::String(value.to_string())
    }
}

impl From<String> for SoqlValue {
    fn from(value: String) -> Self {
        SoqlValue::String(value)
    }
}

impl From<bool> for SoqlValue {
    fn from(value: bool) -> Self {
        SoqlValue::Bool(value)
    }
}

impl From<i32> for SoqlValue {
    fn from(value: i32) -> Self {
        SoqlValue::Int(value.into())
    }
}

impl From<i64> for SoqlValue {
    fn from(value: i64) -> Self {
        SoqlValue::Int(value)
    }
}

impl From<u32> for SoqlValue {
    fn from(value: u32) -> Self {
        SoqlValue::Int(value.into())
    }
}

impl From<f64> for SoqlValue {
    fn from(value: f64) -> Self {
        SoqlValue::Float(value)
    }
}

impl From<DateTime<Utc>> for SoqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SoqlValue::Timestamp(value)
    }
}

impl<T: Into<SoqlValue>> From<Option<T>> for SoqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SoqlValue::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Single(SoqlValue),
    Set(Vec<SoqlValue>),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Leaf {
        field: String,
        operator: Operator,
        operand: Operand,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Group(Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Leaf {
                field,
                operator,
                operand: Operand::Single(value),
            } => write!(f, "{field} {} {value}", operator.as_str()),
            Expr::Leaf {
                field,
                operator,
                operand: Operand::Set(values),
            } => {
                write!(f, "{field} {} (", operator.as_str())?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Expr::And(left, right) => write!(f, "{left} AND {right}"),
            Expr::Or(left, right) => write!(f, "{left} OR {right}"),
            Expr::Group(inner) => write!(f, "({inner})"),
        }
    }
}

/// A WHERE expression.
///
/// ```rust
/// use sforce_rest::WhereClause;
///
/// let clause = WhereClause::equals("Name", "Acme")?
///     .or(WhereClause::greater_than("NumberOfEmployees", 100)?)
///     .group()
///     .and(WhereClause::not_equals("Industry", None::<&str>)?);
/// assert_eq!(
///     clause.to_string(),
///     "(Name = 'Acme' OR NumberOfEmployees > 100) AND Industry != null"
/// );
/// # Ok::<(), sforce_rest::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    expr: Expr,
}

impl WhereClause {
    /// `field = value`; accepts every value type, including null.
    pub fn equals(field: impl Into<String>, value: impl Into<SoqlValue>) -> Result<Self> {
        Self::compare(field.into(), Operator::Equals, value.into())
    }

    /// `field != value`; accepts every value type, including null.
    pub fn not_equals(field: impl Into<String>, value: impl Into<SoqlValue>) -> Result<Self> {
        Self::compare(field.into(), Operator::NotEquals, value.into())
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<SoqlValue>) -> Result<Self> {
        Self::compare(field.into(), Operator::LessThan, value.into())
    }

    pub fn less_than_or_equal(
        field: impl Into<String>,
        value: impl Into<SoqlValue>,
    ) -> Result<Self> {
        Self::compare(field.into(), Operator::LessThanOrEqual, value.into())
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<SoqlValue>) -> Result<Self> {
        Self::compare(field.into(), Operator::GreaterThan, value.into())
    }

    pub fn greater_than_or_equal(
        field: impl Into<String>,
        value: impl Into<SoqlValue>,
    ) -> Result<Self> {
        Self::compare(field.into(), Operator::GreaterThanOrEqual, value.into())
    }

    /// `field LIKE 'pattern'`; strings only.
    pub fn like(field: impl Into<String>, pattern: impl Into<SoqlValue>) -> Result<Self> {
        Self::compare(field.into(), Operator::Like, pattern.into())
    }

    /// `field IN (a,b,...)`; a non-empty set of one type, no bools or nulls.
    pub fn in_values<V: Into<SoqlValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        Self::set(field.into(), Operator::In, values)
    }

    /// `field NOT IN (a,b,...)`; same rules as [`WhereClause::in_values`].
    pub fn not_in<V: Into<SoqlValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        Self::set(field.into(), Operator::NotIn, values)
    }

    pub fn and(self, other: WhereClause) -> Self {
        Self {
            expr: Expr::And(Box::new(self.expr), Box::new(other.expr)),
        }
    }

    pub fn or(self, other: WhereClause) -> Self {
        Self {
            expr: Expr::Or(Box::new(self.expr), Box::new(other.expr)),
        }
    }

    /// Wrap the expression so far in parentheses.
    pub fn group(self) -> Self {
        Self {
            expr: Expr::Group(Box::new(self.expr)),
        }
    }

    fn compare(field: String, operator: Operator, value: SoqlValue) -> Result<Self> {
        validate_field(&field)?;
        validate_value(&value)?;

        let allowed = match operator {
            Operator::Equals | Operator::NotEquals => true,
            Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => !matches!(
                value,
                SoqlValue::String(_) | SoqlValue::Bool(_) | SoqlValue::Null
            ),
            Operator::Like => matches!(value, SoqlValue::String(_)),
            Operator::In | Operator::NotIn => false,
        };
        if !allowed {
            return Err(Error::validation(format!(
                "{} does not accept a {} value",
                operator.as_str(),
                value.type_name()
            )));
        }

        Ok(Self {
            expr: Expr::Leaf {
                field,
                operator,
                operand: Operand::Single(value),
            },
        })
    }

    fn set<V: Into<SoqlValue>>(
        field: String,
        operator: Operator,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        validate_field(&field)?;

        let values: Vec<SoqlValue> = values.into_iter().map(Into::into).collect();
        values.iter().try_for_each(validate_value)?;
        let Some(first) = values.first() else {
            return Err(Error::validation(format!(
                "{} needs at least one value",
                operator.as_str()
            )));
        };
        if matches!(first, SoqlValue::Bool(_) | SoqlValue::Null) {
            return Err(Error::validation(format!(
                "{} does not accept a {} value",
                operator.as_str(),
                first.type_name()
            )));
        }
        let kind = first.type_name();
        if let Some(mixed) = values.iter().find(|value| value.type_name() != kind) {
            return Err(Error::validation(format!(
                "{} values must share one type, found {} and {}",
                operator.as_str(),
                kind,
                mixed.type_name()
            )));
        }

        Ok(Self {
            expr: Expr::Leaf {
                field,
                operator,
                operand: Operand::Set(values),
            },
        })
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() || field.contains(char::is_whitespace) {
        return Err(Error::validation(format!("invalid field name {field:?}")));
    }
    Ok(())
}

// SOQL has no literal for NaN or infinity.
fn validate_value(value: &SoqlValue) -> Result<()> {
    match value {
        SoqlValue::Float(value) if !value.is_finite() => Err(Error::validation(format!(
            "{value} is not a SOQL number"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_leaf_encoding() {
        assert_eq!(
            WhereClause::equals("Name", "Super Gary").unwrap().to_string(),
            "Name = 'Super Gary'"
        );
        assert_eq!(
            WhereClause::equals("IsDeleted", false).unwrap().to_string(),
            "IsDeleted = false"
        );
        assert_eq!(
            WhereClause::not_equals("ParentId", None::<String>).unwrap().to_string(),
            "ParentId != null"
        );
        assert_eq!(
            WhereClause::greater_than_or_equal("Amount", 1.5).unwrap().to_string(),
            "Amount >= 1.5"
        );

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            WhereClause::less_than("CreatedDate", ts).unwrap().to_string(),
            "CreatedDate < 2024-03-01T12:30:00Z"
        );
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert!(WhereClause::equals("Amount", f64::NAN).unwrap_err().is_validation());
        assert!(WhereClause::greater_than("Amount", f64::INFINITY).is_err());
        assert!(WhereClause::less_than("Amount", f64::NEG_INFINITY).is_err());
        assert!(WhereClause::in_values("Amount", [1.0, f64::NAN]).unwrap_err().is_validation());
        assert!(WhereClause::not_in("Amount", [1.0, 2.5]).is_ok());
    }

    #[test]
    fn test_comparators_reject_strings_and_bools() {
        assert!(WhereClause::greater_than("Name", "a").unwrap_err().is_validation());
        assert!(WhereClause::less_than_or_equal("IsDeleted", true).is_err());
        assert!(WhereClause::less_than("Amount", None::<i64>).is_err());
        assert!(WhereClause::greater_than("Amount", 10).is_ok());
    }

    #[test]
    fn test_like_is_string_only() {
        assert_eq!(
            WhereClause::like("Name", "Acme%").unwrap().to_string(),
            "Name LIKE 'Acme%'"
        );
        assert!(WhereClause::like("Amount", 10).is_err());
    }

    #[test]
    fn test_sets() {
        assert_eq!(
            WhereClause::in_values("Industry", ["Energy", "Retail"])
                .unwrap()
                .to_string(),
            "Industry IN ('Energy','Retail')"
        );
        assert_eq!(
            WhereClause::not_in("NumberOfEmployees", [1, 2, 3]).unwrap().to_string(),
            "NumberOfEmployees NOT IN (1,2,3)"
        );

        assert!(WhereClause::in_values("Industry", Vec::<&str>::new()).is_err());
        assert!(WhereClause::in_values("IsDeleted", [true, false]).is_err());
        assert!(WhereClause::in_values(
            "Mixed",
            [SoqlValue::from("a"), SoqlValue::from(1)]
        )
        .is_err());
    }

    #[test]
    fn test_combinators_associate_left_to_right() {
        let a = WhereClause::equals("A", 1).unwrap();
        let b = WhereClause::equals("B", 2).unwrap();
        let c = WhereClause::equals("C", 3).unwrap();

        assert_eq!(
            a.clone().and(b.clone()).or(c.clone()).to_string(),
            "A = 1 AND B = 2 OR C = 3"
        );
        assert_eq!(
            a.and(b.or(c).group()).to_string(),
            "A = 1 AND (B = 2 OR C = 3)"
        );
    }

    #[test]
    fn test_field_name_checked() {
        assert!(WhereClause::equals("", 1).is_err());
        assert!(WhereClause::equals("Name OR 1", 1).is_err());
    }
}
