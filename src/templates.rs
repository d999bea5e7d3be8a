//! Named field-schema templates persisted as one flat JSON document.
//!
//! A template file maps template names to ordered lists of
//! `[key, display_name, sql_type, is_primary_key]` 4-tuples. Loading and
//! saving are full-document read-modify-write; there are no partial
//! updates.

use crate::core::{ExtractError, ExtractResult};
use crate::domain::{FieldSchema, SqlType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One field entry in a template, in file order.
pub type TemplateField = (String, String, SqlType, bool);

/// The full template document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SchemaTemplates {
    templates: BTreeMap<String, Vec<TemplateField>>,
}

impl SchemaTemplates {
    /// Loads the template document, or starts empty if the file does not
    /// exist yet.
    pub fn load(path: impl AsRef<Path>) -> ExtractResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let body = fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|source| ExtractError::Template {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the whole document back to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> ExtractResult<()> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self).map_err(|source| ExtractError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body)?;
        Ok(())
    }

    /// Template names in the document.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Stores a schema under a name, replacing any previous definition.
    pub fn insert(&mut self, name: impl Into<String>, fields: &[FieldSchema]) {
        let entries = fields
            .iter()
            .map(|f| {
                (
                    f.key.clone(),
                    f.display_name.clone(),
                    f.sql_type,
                    f.is_primary_key,
                )
            })
            .collect();
        self.templates.insert(name.into(), entries);
    }

    /// Resolves a named template into a field schema.
    pub fn get(&self, name: &str) -> Option<Vec<FieldSchema>> {
        let entries = self.templates.get(name)?;
        Some(
            entries
                .iter()
                .map(|(key, display_name, sql_type, is_primary_key)| FieldSchema {
                    key: key.clone(),
                    display_name: display_name.clone(),
                    sql_type: *sql_type,
                    is_primary_key: *is_primary_key,
                })
                .collect(),
        )
    }

    /// Removes a named template, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.templates.remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::text("name", "姓名"),
            FieldSchema::text("id_card", "身份证号").primary_key(),
        ]
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");

        let mut templates = SchemaTemplates::default();
        templates.insert("社保卡", &sample_fields());
        templates.save(&path).unwrap();

        let loaded = SchemaTemplates::load(&path).unwrap();
        assert_eq!(loaded, templates);
        assert_eq!(loaded.get("社保卡").unwrap(), sample_fields());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let templates = SchemaTemplates::load("/nonexistent/templates.json").unwrap();
        assert_eq!(templates.names().count(), 0);
    }

    #[test]
    fn test_entries_serialize_as_four_tuples() {
        let mut templates = SchemaTemplates::default();
        templates.insert("t", &sample_fields());
        let json = serde_json::to_value(&templates).unwrap();
        assert_eq!(
            json["t"][1],
            serde_json::json!(["id_card", "身份证号", "TEXT", true])
        );
    }

    #[test]
    fn test_malformed_file_reports_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SchemaTemplates::load(&path),
            Err(ExtractError::Template { .. })
        ));
    }
}
