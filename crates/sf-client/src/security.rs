//! Escaping and name checks for values that end up in SOQL or URL paths.
//!
//! The SOQL builder emits string literals exactly as given. Anything that came
//! from a user should go through [`soql::escape_string`] first:
//!
//! ```rust
//! use sforce_client::security::soql;
//!
//! let name = soql::escape_string("O'Brien");
//! let query = format!("SELECT Id FROM Account WHERE Name = '{}'", name);
//! assert_eq!(query, "SELECT Id FROM Account WHERE Name = 'O\\'Brien'");
//! ```

/// SOQL escaping utilities.
pub mod soql {
    /// Escape a string value for use inside a quoted SOQL literal.
    ///
    /// ```rust
    /// use sforce_client::security::soql;
    ///
    /// assert_eq!(soql::escape_string("O'Brien & Co."), "O\\'Brien & Co.");
    /// ```
    #[must_use]
    pub fn escape_string(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 16);
        for ch in value.chars() {
            match ch {
                '\'' => escaped.push_str("\\'"),
                '\\' => escaped.push_str("\\\\"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// Escape a value for a LIKE pattern; `%` and `_` become literals.
    #[must_use]
    pub fn escape_like(value: &str) -> String {
        let base_escaped = escape_string(value);
        let mut escaped = String::with_capacity(base_escaped.len() + 8);
        for ch in base_escaped.chars() {
            match ch {
                '%' => escaped.push_str("\\%"),
                '_' => escaped.push_str("\\_"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// True when `name` is one or more word characters (`\w+`).
    ///
    /// Standard and custom object names (`Account`, `Invoice__c`) pass;
    /// anything with punctuation or whitespace does not.
    #[must_use]
    pub fn is_safe_sobject_name(name: &str) -> bool {
        regex_lite::Regex::new(r"^\w+$")
            .map(|pattern| pattern.is_match(name))
            .unwrap_or(false)
    }
}

/// URL encoding utilities for path segments.
pub mod url {
    /// Percent-encode a value so it stays a single path segment.
    ///
    /// ```rust
    /// use sforce_client::security::url;
    ///
    /// assert_eq!(url::encode_param("001/../../secret"), "001%2F..%2F..%2Fsecret");
    /// ```
    #[must_use]
    pub fn encode_param(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }
}
