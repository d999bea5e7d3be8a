//! Candidate output rows produced by the binding engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row destined for the target table.
///
/// The source filename is provenance only; it is written to the sidecar
/// source tables, never to the primary table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Field key to extracted value.
    pub values: BTreeMap<String, String>,
    /// Filename of the document this record was extracted from.
    pub source_filename: String,
}

impl Record {
    /// Creates an empty record for the given source document.
    pub fn new(source_filename: impl Into<String>) -> Self {
        Self {
            values: BTreeMap::new(),
            source_filename: source_filename.into(),
        }
    }

    /// Returns the value for a field key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sets the value for a field key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}
