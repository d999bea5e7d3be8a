//! Mapping ordered/positioned fragments onto a user-defined schema.
//!
//! Two mutually exclusive modes per import session:
//! - **single-record**: each document yields one record, fields filled from
//!   explicit bindings (spatial rectangle or stored fragment indices)
//! - **table**: the ordered fragment list is chunked positionally by field
//!   count, one record per chunk
//!
//! Schema validation and primary-key type coercion happen once at apply
//! time, before any DDL is attempted; record-level primary-key checks are
//! per-record skips, never batch failures.

use crate::core::{ExtractError, ExtractResult};
use crate::domain::{Binding, FieldSchema, Fragment, Record, SqlType};
use itertools::Itertools;
use std::fmt;
use tracing::warn;

/// Column name reserved for the system auto-increment id.
pub const AUTO_ID_COLUMN: &str = "id";

/// Primary-key strategy derived from a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkStrategy {
    /// System-generated auto-increment integer id.
    AutoId,
    /// One or more data fields flagged as the primary key.
    BusinessFields,
}

impl PkStrategy {
    /// Derives the strategy from the schema's flags.
    pub fn of(fields: &[FieldSchema]) -> Self {
        if fields.iter().any(|f| f.is_primary_key) {
            PkStrategy::BusinessFields
        } else {
            PkStrategy::AutoId
        }
    }
}

/// Notification that a field's type was changed during schema apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionNotice {
    /// The coerced field's key.
    pub field_key: String,
    /// Original type.
    pub from: SqlType,
    /// Coerced type.
    pub to: SqlType,
}

impl fmt::Display for CoercionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "primary-key field '{}' changed from {} to {}",
            self.field_key, self.from, self.to
        )
    }
}

/// Validates a schema and applies primary-key type coercion.
///
/// Fails fast, before any database mutation, on: an empty schema, duplicate
/// keys, or a key colliding with the system auto-id column while the
/// auto-id strategy is active.
///
/// Integer primary-key fields are coerced to TEXT: business identifiers
/// such as ID-card numbers may contain letters (a trailing "X"), and an
/// INTEGER column would reject or mangle them. The coercion is returned as
/// a notice for the user, not applied silently.
pub fn apply_schema(
    mut fields: Vec<FieldSchema>,
) -> ExtractResult<(Vec<FieldSchema>, Vec<CoercionNotice>)> {
    if fields.is_empty() {
        return Err(ExtractError::schema_error_detailed(
            "schema apply",
            "schema has no fields",
        ));
    }
    for (i, field) in fields.iter().enumerate() {
        if field.key.trim().is_empty() {
            return Err(ExtractError::schema_error_detailed(
                "schema apply",
                format!("field #{i} has an empty key"),
            ));
        }
        if fields[..i].iter().any(|f| f.key == field.key) {
            return Err(ExtractError::schema_error_detailed(
                "schema apply",
                format!("duplicate field key '{}'", field.key),
            ));
        }
    }
    if PkStrategy::of(&fields) == PkStrategy::AutoId
        && fields.iter().any(|f| f.key == AUTO_ID_COLUMN)
    {
        return Err(ExtractError::schema_error_detailed(
            "schema apply",
            format!("field key '{AUTO_ID_COLUMN}' collides with the system auto-id column"),
        ));
    }

    let mut notices = Vec::new();
    for field in &mut fields {
        if field.is_primary_key && field.sql_type == SqlType::Integer {
            notices.push(CoercionNotice {
                field_key: field.key.clone(),
                from: field.sql_type,
                to: SqlType::Text,
            });
            field.sql_type = SqlType::Text;
        }
    }
    for notice in &notices {
        warn!(%notice, "coerced primary-key field type");
    }
    Ok((fields, notices))
}

/// Checks that every business primary-key field has a non-whitespace value.
///
/// Always true under the auto-id strategy.
pub fn has_valid_pk(record: &Record, fields: &[FieldSchema]) -> bool {
    fields
        .iter()
        .filter(|f| f.is_primary_key)
        .all(|f| record.get(&f.key).is_some_and(|v| !v.trim().is_empty()))
}

/// Produces the single record for one document from explicit bindings.
///
/// A binding with a normalized rectangle re-derives its member fragments
/// for the current document: fragments whose box centers fall inside the
/// rectangle (scaled to this document's dimensions), sorted top-to-bottom
/// then left-to-right, texts joined with single spaces. Index-only bindings
/// use the stored indices against the current list; that is only correct
/// when documents share an identical layout. A field without a binding gets
/// an empty value.
pub fn extract_single(
    fields: &[FieldSchema],
    bindings: &[Binding],
    fragments: &[Fragment],
    image_size: (u32, u32),
    source_filename: &str,
) -> Record {
    let mut record = Record::new(source_filename);
    for field in fields {
        let value = bindings
            .iter()
            .find(|b| b.field_key == field.key)
            .map(|binding| binding_value(binding, fragments, image_size))
            .unwrap_or_default();
        record.set(&field.key, value);
    }
    record
}

fn binding_value(binding: &Binding, fragments: &[Fragment], image_size: (u32, u32)) -> String {
    let picked: Vec<&Fragment> = match binding.bbox {
        Some(bbox) => {
            let region = bbox.scale(image_size.0 as f32, image_size.1 as f32);
            let mut hits: Vec<(crate::processors::Point, &Fragment)> = fragments
                .iter()
                .filter_map(|f| {
                    let center = f.rect?.center();
                    region.contains_point(center).then_some((center, f))
                })
                .collect();
            hits.sort_by(|(a, _), (b, _)| {
                (a.y, a.x)
                    .partial_cmp(&(b.y, b.x))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.into_iter().map(|(_, f)| f).collect()
        }
        None => binding
            .fragment_indices
            .iter()
            .filter_map(|&idx| {
                let fragment = fragments.get(idx);
                if fragment.is_none() {
                    warn!(idx, field = %binding.field_key, "binding index out of range");
                }
                fragment
            })
            .collect(),
    };

    picked.iter().map(|f| f.text.as_str()).join(" ")
}

/// Chunks the ordered fragment list into positional records.
///
/// Each chunk of `fields.len()` consecutive fragments maps positionally
/// onto the schema; the final partial chunk leaves trailing fields as empty
/// strings. An empty schema produces no records.
pub fn extract_table(
    fields: &[FieldSchema],
    items: &[Fragment],
    source_filename: &str,
) -> Vec<Record> {
    if fields.is_empty() {
        return Vec::new();
    }
    items
        .chunks(fields.len())
        .map(|chunk| {
            let mut record = Record::new(source_filename);
            for (j, field) in fields.iter().enumerate() {
                let value = chunk.get(j).map(|f| f.text.clone()).unwrap_or_default();
                record.set(&field.key, value);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Rect;

    fn frag(text: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Fragment {
        Fragment::new(text, Rect::new(x1, y1, x2, y2), 0.95)
    }

    fn id_schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::text("name", "姓名"),
            FieldSchema::text("id_card", "身份证号").primary_key(),
        ]
    }

    #[test]
    fn test_apply_schema_coerces_integer_pk_to_text() {
        let fields = vec![FieldSchema::text("id_card", "身份证号")
            .with_type(SqlType::Integer)
            .primary_key()];
        let (fields, notices) = apply_schema(fields).unwrap();
        assert_eq!(fields[0].sql_type, SqlType::Text);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].field_key, "id_card");
        assert_eq!((notices[0].from, notices[0].to), (SqlType::Integer, SqlType::Text));
    }

    #[test]
    fn test_apply_schema_rejects_empty_and_duplicates() {
        assert!(apply_schema(Vec::new()).is_err());
        let dup = vec![FieldSchema::text("a", "A"), FieldSchema::text("a", "A2")];
        assert!(apply_schema(dup).is_err());
    }

    #[test]
    fn test_apply_schema_rejects_auto_id_collision() {
        // Auto-id strategy: no PK flags, key "id" is reserved.
        let fields = vec![FieldSchema::text("id", "编号")];
        assert!(apply_schema(fields).is_err());

        // With a business PK there is no system id column to collide with.
        let fields = vec![
            FieldSchema::text("id", "编号"),
            FieldSchema::text("id_card", "身份证号").primary_key(),
        ];
        assert!(apply_schema(fields).is_ok());
    }

    #[test]
    fn test_extract_single_by_indices() {
        let fragments = vec![
            frag("张三", 10.0, 10.0, 100.0, 30.0),
            frag("110101199001011234", 110.0, 10.0, 250.0, 30.0),
        ];
        let bindings = vec![
            Binding::by_indices("name", vec![0]),
            Binding::by_indices("id_card", vec![1]),
        ];
        let record = extract_single(&id_schema(), &bindings, &fragments, (800, 600), "cert.png");
        assert_eq!(record.get("name"), Some("张三"));
        assert_eq!(record.get("id_card"), Some("110101199001011234"));
        assert_eq!(record.source_filename, "cert.png");
    }

    #[test]
    fn test_extract_single_spatial_binding_rederives_members() {
        // Normalized bbox covering the left half, upper part of the image.
        let bindings = vec![Binding::spatial("name", Rect::new(0.0, 0.0, 0.5, 0.5))];
        let fields = vec![FieldSchema::text("name", "姓名")];
        let fragments = vec![
            frag("李", 300.0, 100.0, 360.0, 130.0),
            frag("四", 100.0, 100.0, 160.0, 130.0),
            frag("outside", 700.0, 500.0, 790.0, 560.0),
        ];
        let record = extract_single(&fields, &bindings, &fragments, (800, 600), "a.png");
        // Sorted left-to-right within the region, space-joined.
        assert_eq!(record.get("name"), Some("四 李"));
    }

    #[test]
    fn test_extract_single_unbound_field_is_empty() {
        let record = extract_single(&id_schema(), &[], &[], (800, 600), "a.png");
        assert_eq!(record.get("name"), Some(""));
        assert_eq!(record.get("id_card"), Some(""));
    }

    #[test]
    fn test_table_mode_chunks_positionally() {
        let fields = vec![
            FieldSchema::text("name", "姓名"),
            FieldSchema::text("id_card", "身份证号"),
            FieldSchema::text("level", "等级"),
        ];
        let items: Vec<Fragment> = ["甲", "1101", "一级", "乙", "1102", "二级"]
            .iter()
            .enumerate()
            .map(|(i, t)| frag(t, i as f32 * 50.0, 0.0, i as f32 * 50.0 + 40.0, 20.0))
            .collect();
        let records = extract_table(&fields, &items, "batch.png");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some("甲"));
        assert_eq!(records[0].get("level"), Some("一级"));
        assert_eq!(records[1].get("name"), Some("乙"));
        assert_eq!(records[1].get("id_card"), Some("1102"));
    }

    #[test]
    fn test_table_mode_pads_trailing_chunk() {
        let fields = vec![
            FieldSchema::text("name", "姓名"),
            FieldSchema::text("id_card", "身份证号"),
            FieldSchema::text("level", "等级"),
        ];
        let items = vec![
            frag("甲", 0.0, 0.0, 40.0, 20.0),
            frag("1101", 50.0, 0.0, 90.0, 20.0),
            frag("一级", 100.0, 0.0, 140.0, 20.0),
            frag("乙", 0.0, 30.0, 40.0, 50.0),
        ];
        let records = extract_table(&fields, &items, "batch.png");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("name"), Some("乙"));
        assert_eq!(records[1].get("id_card"), Some(""));
        assert_eq!(records[1].get("level"), Some(""));
    }

    #[test]
    fn test_pk_validation() {
        let fields = id_schema();
        let mut valid = Record::new("a.png");
        valid.set("name", "张三");
        valid.set("id_card", "1101");
        assert!(has_valid_pk(&valid, &fields));

        let mut blank_pk = Record::new("a.png");
        blank_pk.set("name", "张三");
        blank_pk.set("id_card", "   ");
        assert!(!has_valid_pk(&blank_pk, &fields));

        // Auto-id strategy validates trivially.
        let auto = vec![FieldSchema::text("name", "姓名")];
        assert!(has_valid_pk(&blank_pk, &auto));
    }
}
