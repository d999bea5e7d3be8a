//! User-authored output schema types.
//!
//! A schema is an ordered list of fields describing the columns of the
//! target table. Fields are authored interactively or loaded from a named
//! template; validation and primary-key coercion happen in the binding
//! engine at schema-apply time.

use crate::processors::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::ExtractError;

/// SQLite storage class for a schema field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    /// UTF-8 text.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point.
    Real,
    /// Raw bytes.
    Blob,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Blob => write!(f, "BLOB"),
        }
    }
}

impl FromStr for SqlType {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Ok(SqlType::Text),
            "INTEGER" | "INT" => Ok(SqlType::Integer),
            "REAL" => Ok(SqlType::Real),
            "BLOB" => Ok(SqlType::Blob),
            other => Err(ExtractError::invalid_input(format!(
                "unknown SQL type '{other}'"
            ))),
        }
    }
}

/// Definition of one output column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    /// Column identifier, unique within a schema.
    pub key: String,
    /// Human-friendly name shown in the UI and stored in the meta dict.
    pub display_name: String,
    /// SQLite storage class.
    pub sql_type: SqlType,
    /// Whether this field participates in the business primary key.
    pub is_primary_key: bool,
}

impl FieldSchema {
    /// Creates a non-primary-key text field.
    pub fn text(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            sql_type: SqlType::Text,
            is_primary_key: false,
        }
    }

    /// Marks the field as part of the business primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Sets the SQL storage class.
    pub fn with_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }
}

/// Association between one schema field and a source region.
///
/// Single-record mode only. A binding carries either the fragment indices
/// selected for the active document, or a rectangle normalized to `[0, 1]`
/// of the image dimensions so the same spatial selection can be re-applied
/// to other documents without re-selecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Binding {
    /// Schema field this binding fills.
    pub field_key: String,
    /// Fragment indices into the active document's ordered list.
    #[serde(default)]
    pub fragment_indices: Vec<usize>,
    /// Source rectangle normalized to `[0, 1]` of the image dimensions.
    #[serde(default)]
    pub bbox: Option<Rect>,
}

impl Binding {
    /// Creates an index-only binding for the active document.
    ///
    /// Index bindings are only correct across documents when all documents
    /// share an identical layout; prefer [`Binding::spatial`] otherwise.
    pub fn by_indices(field_key: impl Into<String>, fragment_indices: Vec<usize>) -> Self {
        Self {
            field_key: field_key.into(),
            fragment_indices,
            bbox: None,
        }
    }

    /// Creates a spatial binding from a rectangle normalized to `[0, 1]`.
    pub fn spatial(field_key: impl Into<String>, bbox: Rect) -> Self {
        Self {
            field_key: field_key.into(),
            fragment_indices: Vec::new(),
            bbox: Some(bbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_display_and_parse() {
        for (ty, s) in [
            (SqlType::Text, "TEXT"),
            (SqlType::Integer, "INTEGER"),
            (SqlType::Real, "REAL"),
            (SqlType::Blob, "BLOB"),
        ] {
            assert_eq!(ty.to_string(), s);
            assert_eq!(s.parse::<SqlType>().unwrap(), ty);
        }
        assert_eq!("int".parse::<SqlType>().unwrap(), SqlType::Integer);
        assert!("DATETIME".parse::<SqlType>().is_err());
    }

    #[test]
    fn test_field_builders() {
        let f = FieldSchema::text("id_card", "身份证号")
            .with_type(SqlType::Integer)
            .primary_key();
        assert!(f.is_primary_key);
        assert_eq!(f.sql_type, SqlType::Integer);
    }
}
