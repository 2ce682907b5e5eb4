//! Validated records and the schema that admits them.
//!
//! A [`Record`] is built from one CSV row only when every field required by
//! the active [`RecordSchema`] is present with a non-blank value. No partially
//! populated record is ever constructed.
//!
//! # Example
//!
//! ```
//! use bulk_ingest_core::record::{RecordSchema, Row};
//! use chrono::Utc;
//!
//! let row = Row::from_pairs(
//!     ["firstName", "lastName", "email"],
//!     ["Ada", "Lovelace", "ada@example.com"],
//! );
//! let record = RecordSchema::Minimal.validate(&row, Utc::now()).unwrap();
//! assert_eq!(record.email(), "ada@example.com");
//! assert_eq!(record.field("lastName"), Some("Lovelace"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Name of the field that keys the secondary index.
pub const EMAIL_FIELD: &str = "email";

const MINIMAL_FIELDS: &[&str] = &["firstName", "lastName", EMAIL_FIELD];
const EXTENDED_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    EMAIL_FIELD,
    "phoneNumber",
    "address",
    "birthDate",
    "status",
];

/// A row failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{field} is required")]
    MissingField {
        /// The first required field that failed
        field: String,
    },

    /// The row could not be read, e.g. it is not valid UTF-8.
    #[error("malformed row: {reason}")]
    Malformed {
        /// Parser diagnostic
        reason: String,
    },
}

/// Set of fields every row must carry.
///
/// The profile is chosen at deployment time and applies uniformly to every
/// row of every file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSchema {
    /// `firstName`, `lastName`, `email`.
    #[default]
    Minimal,
    /// Minimal plus `phoneNumber`, `address`, `birthDate`, `status`.
    Extended,
}

impl RecordSchema {
    /// Required field names in declaration order.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Minimal => MINIMAL_FIELDS,
            Self::Extended => EXTENDED_FIELDS,
        }
    }

    /// Validate a row and build a [`Record`] from it.
    ///
    /// Required fields are checked in the row's header order; required fields
    /// the header does not mention at all are checked afterwards, in schema
    /// order. The first failure wins.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] naming the first required
    /// field that is absent or blank.
    pub fn validate(self, row: &Row, created_at: DateTime<Utc>) -> Result<Record, ValidationError> {
        let required = self.required_fields();

        let in_header = row.columns().filter(|name| required.contains(name));
        let not_in_header = required.iter().copied().filter(|name| !row.has_column(name));

        let mut fields = BTreeMap::new();
        for name in in_header.chain(not_in_header) {
            match row.get(name) {
                Some(value) if !value.is_empty() => {
                    fields.entry(name.to_string()).or_insert_with(|| value.to_string());
                }
                _ => {
                    return Err(ValidationError::MissingField {
                        field: name.to_string(),
                    });
                }
            }
        }

        let email = fields.remove(EMAIL_FIELD).ok_or_else(|| ValidationError::MissingField {
            field: EMAIL_FIELD.to_string(),
        })?;

        Ok(Record {
            id: Uuid::new_v4(),
            email,
            fields,
            created_at,
        })
    }
}

impl fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => f.write_str("minimal"),
            Self::Extended => f.write_str("extended"),
        }
    }
}

impl FromStr for RecordSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "extended" => Ok(Self::Extended),
            other => Err(format!("unknown record schema: {other}")),
        }
    }
}

/// One data row with its values matched positionally to header names.
///
/// Headers without a value (ragged rows) are kept with no value so they
/// surface as missing fields. Values beyond the last header are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, Option<String>)>,
}

impl Row {
    /// Zip header names with row values. Both are trimmed.
    #[must_use]
    pub fn zip<H, V>(headers: &[H], values: &[V]) -> Self
    where
        H: AsRef<str>,
        V: AsRef<str>,
    {
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = values.get(i).map(|v| v.as_ref().trim().to_string());
                (header.as_ref().trim().to_string(), value)
            })
            .collect();
        Self { cells }
    }

    /// Convenience constructor for literal headers and values.
    #[must_use]
    pub fn from_pairs<const N: usize, const M: usize>(
        headers: [&str; N],
        values: [&str; M],
    ) -> Self {
        Self::zip(&headers, &values)
    }

    /// Column names in header order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Whether the header declares `name`.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.cells.iter().any(|(n, _)| n == name)
    }

    /// Value for `name`; the first column wins when a header repeats.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// A validated entity extracted from one row.
///
/// Records are created once and never updated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: Uuid,
    email: String,
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl Record {
    /// Identity, unique for the lifetime of the store.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Key of the secondary index.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Any schema field by its header name, `email` included.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        if name == EMAIL_FIELD {
            return Some(&self.email);
        }
        self.fields.get(name).map(String::as_str)
    }

    /// Schema fields other than `email`, keyed by header name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// When the record was built.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn builds_record_from_complete_row() {
        let row = Row::from_pairs(
            ["firstName", "lastName", "email"],
            ["John", "Doe", "john.doe@example.com"],
        );
        let record = RecordSchema::Minimal.validate(&row, now()).unwrap();

        assert_eq!(record.email(), "john.doe@example.com");
        assert_eq!(record.field("firstName"), Some("John"));
        assert_eq!(record.field("lastName"), Some("Doe"));
        assert_eq!(record.fields().len(), 2);
    }

    #[test]
    fn empty_value_is_missing() {
        let row = Row::from_pairs(["firstName", "lastName", "email"], ["Invalid", "Row", ""]);
        let err = RecordSchema::Minimal.validate(&row, now()).unwrap_err();
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn blank_value_is_missing() {
        let row = Row::from_pairs(["firstName", "lastName", "email"], ["   ", "Row", "a@b.c"]);
        let err = RecordSchema::Minimal.validate(&row, now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "firstName".to_string()
            }
        );
    }

    #[test]
    fn ragged_row_reports_unmatched_header() {
        let row = Row::from_pairs(["firstName", "lastName", "email"], ["Jane"]);
        let err = RecordSchema::Minimal.validate(&row, now()).unwrap_err();
        assert_eq!(err.to_string(), "lastName is required");
    }

    #[test]
    fn first_failure_follows_header_order() {
        let row = Row::from_pairs(["email", "lastName", "firstName"], ["", "", ""]);
        let err = RecordSchema::Minimal.validate(&row, now()).unwrap_err();
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn fields_absent_from_header_come_last() {
        let row = Row::from_pairs(["lastName", "firstName"], ["Doe", "John"]);
        let err = RecordSchema::Minimal.validate(&row, now()).unwrap_err();
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn extra_columns_are_ignored() {
        let row = Row::from_pairs(
            ["nickname", "firstName", "lastName", "email"],
            ["JD", "John", "Doe", "jd@example.com"],
        );
        let record = RecordSchema::Minimal.validate(&row, now());
        assert!(record.is_ok_and(|r| r.field("nickname").is_none()));
    }

    #[test]
    fn extended_schema_requires_more() {
        let row = Row::from_pairs(
            ["firstName", "lastName", "email"],
            ["John", "Doe", "john.doe@example.com"],
        );
        let err = RecordSchema::Extended.validate(&row, now()).unwrap_err();
        assert_eq!(err.to_string(), "phoneNumber is required");
    }

    #[test]
    fn trims_headers_and_values() {
        let row = Row::zip(&[" firstName ", "lastName", " email"], &["John ", " Doe", " j@d.io "]);
        assert_eq!(row.get("firstName"), Some("John"));
        assert_eq!(row.get("email"), Some("j@d.io"));
    }

    #[test]
    fn ids_are_fresh_per_record() {
        let row = Row::from_pairs(["firstName", "lastName", "email"], ["A", "B", "c@d.e"]);
        let a = RecordSchema::Minimal.validate(&row, now());
        let b = RecordSchema::Minimal.validate(&row, now());
        assert!(matches!((a, b), (Ok(a), Ok(b)) if a.id() != b.id()));
    }

    #[test]
    fn serializes_fields_flat_in_camel_case() {
        let row = Row::from_pairs(["firstName", "lastName", "email"], ["A", "B", "c@d.e"]);
        let record = RecordSchema::Minimal.validate(&row, now()).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["firstName"], "A");
        assert_eq!(json["email"], "c@d.e");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn parses_schema_names() {
        assert_eq!("Extended".parse::<RecordSchema>(), Ok(RecordSchema::Extended));
        assert_eq!(" minimal ".parse::<RecordSchema>(), Ok(RecordSchema::Minimal));
        assert!("full".parse::<RecordSchema>().is_err());
    }
}
