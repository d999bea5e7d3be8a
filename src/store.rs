//! SQLite persistence for extracted records.
//!
//! Layout per primary table:
//! - the primary table itself, columns from the applied field schema, keyed
//!   by either a system `id INTEGER PRIMARY KEY AUTOINCREMENT` or the
//!   business primary-key fields
//! - `{table}_import_sources`: source filename registry (unique filename,
//!   autoincrement id)
//! - `{table}_source_map`: many-to-many map between source id and primary
//!   row id, so provenance survives without polluting the primary table
//! - `_sys_meta_dict(type, key, value)`: human-friendly display names for
//!   tables and fields, keyed independently of the raw identifiers
//!
//! Table creation is idempotent; on every open of an existing table the
//! adapter adds missing expected columns and never drops or renames.

use crate::binding::{has_valid_pk, PkStrategy, AUTO_ID_COLUMN};
use crate::core::{ExtractError, ExtractResult};
use crate::domain::{FieldSchema, Record, SqlType};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

const META_DICT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS _sys_meta_dict (
    type  TEXT NOT NULL,
    key   TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (type, key)
)";

/// Aggregated outcome of one batch import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records written to the primary table.
    pub imported: usize,
    /// Records skipped before insertion (missing business primary key).
    pub skipped: usize,
    /// Records the database rejected (constraint violations).
    pub failed: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} skipped, {} failed",
            self.imported, self.skipped, self.failed
        )
    }
}

/// SQLite-backed store for extracted records.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> ExtractResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store, mainly for tests.
    pub fn open_in_memory() -> ExtractResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ExtractResult<Self> {
        conn.execute(META_DICT_SCHEMA, [])?;
        Ok(Self { conn })
    }

    /// Creates the primary table and its sidecars if they do not exist, and
    /// records the schema's display names in the meta dict.
    ///
    /// The schema must already have passed [`crate::binding::apply_schema`].
    /// The table's own display name is separate from the schema; callers
    /// that have one store it with
    /// [`set_display_name`](Self::set_display_name)`("table", table, name)`
    /// and recover it with [`display_name`](Self::display_name).
    pub fn create_table(&self, table: &str, fields: &[FieldSchema]) -> ExtractResult<()> {
        validate_identifier(table)?;
        for field in fields {
            validate_identifier(&field.key)?;
        }

        let mut columns: Vec<String> = Vec::with_capacity(fields.len() + 1);
        match PkStrategy::of(fields) {
            PkStrategy::AutoId => {
                columns.push(format!(
                    "\"{AUTO_ID_COLUMN}\" INTEGER PRIMARY KEY AUTOINCREMENT"
                ));
                for field in fields {
                    columns.push(format!("\"{}\" {}", field.key, field.sql_type));
                }
            }
            PkStrategy::BusinessFields => {
                for field in fields {
                    columns.push(format!("\"{}\" {}", field.key, field.sql_type));
                }
                let pk_keys: Vec<String> = fields
                    .iter()
                    .filter(|f| f.is_primary_key)
                    .map(|f| format!("\"{}\"", f.key))
                    .collect();
                columns.push(format!("PRIMARY KEY ({})", pk_keys.join(", ")));
            }
        }
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" ({})",
                columns.join(", ")
            ),
            [],
        )?;

        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{table}_import_sources\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename TEXT NOT NULL UNIQUE
                )"
            ),
            [],
        )?;
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{table}_source_map\" (
                    source_id INTEGER NOT NULL,
                    record_rowid INTEGER NOT NULL,
                    UNIQUE (source_id, record_rowid)
                )"
            ),
            [],
        )?;

        for field in fields {
            self.set_display_name("field", &field.key, &field.display_name)?;
        }
        self.ensure_columns(table, fields)
    }

    /// Adds any schema columns missing from an existing table.
    ///
    /// Columns are only ever added; existing columns are never dropped or
    /// renamed automatically.
    pub fn ensure_columns(&self, table: &str, fields: &[FieldSchema]) -> ExtractResult<()> {
        validate_identifier(table)?;
        let existing = self.column_names(table)?;
        for field in fields {
            if !existing.iter().any(|c| c == &field.key) {
                validate_identifier(&field.key)?;
                info!(table, column = %field.key, "adding missing column");
                self.conn.execute(
                    &format!(
                        "ALTER TABLE \"{table}\" ADD COLUMN \"{}\" {}",
                        field.key, field.sql_type
                    ),
                    [],
                )?;
            }
        }
        Ok(())
    }

    /// Reconstructs a field schema from an existing table, restoring
    /// previously-chosen display names from the meta dict.
    pub fn load_schema(&self, table: &str) -> ExtractResult<Vec<FieldSchema>> {
        validate_identifier(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>("name")?,
                row.get::<_, String>("type")?,
                row.get::<_, i64>("pk")?,
            ))
        })?;

        let mut fields = Vec::new();
        for row in rows {
            let (name, type_name, pk) = row?;
            let sql_type = type_name.parse::<SqlType>().unwrap_or(SqlType::Text);
            // The system auto-id column is not part of the user schema.
            if name == AUTO_ID_COLUMN && pk > 0 && sql_type == SqlType::Integer {
                continue;
            }
            let display_name = self
                .display_name("field", &name)?
                .unwrap_or_else(|| name.clone());
            fields.push(FieldSchema {
                key: name,
                display_name,
                sql_type,
                is_primary_key: pk > 0,
            });
        }
        Ok(fields)
    }

    /// Writes a batch of records inside one transaction.
    ///
    /// Insertion uses INSERT OR REPLACE keyed on the declared primary key.
    /// Replacing a business-PK row frees the displaced rowid, so its
    /// provenance rows are deleted first; a reused rowid must never inherit
    /// the replaced record's source attribution. Records missing a business
    /// primary-key value are skipped before insertion; records the database
    /// rejects are logged and skipped. Either way the batch continues, and
    /// the one transaction makes the committed-versus-rolled-back boundary
    /// unambiguous.
    pub fn import_records(
        &mut self,
        table: &str,
        fields: &[FieldSchema],
        records: &[Record],
    ) -> ExtractResult<ImportSummary> {
        validate_identifier(table)?;
        let column_list = fields.iter().map(|f| format!("\"{}\"", f.key)).join(", ");
        let placeholders = (1..=fields.len()).map(|i| format!("?{i}")).join(", ");
        let insert_sql =
            format!("INSERT OR REPLACE INTO \"{table}\" ({column_list}) VALUES ({placeholders})");

        // Only a business-PK table can displace an existing row on insert.
        let pk_fields: Vec<&FieldSchema> =
            fields.iter().filter(|f| f.is_primary_key).collect();
        let displaced_sql = (!pk_fields.is_empty()).then(|| {
            let clause = pk_fields
                .iter()
                .map(|f| format!("\"{}\" = ?", f.key))
                .join(" AND ");
            format!("SELECT rowid FROM \"{table}\" WHERE {clause}")
        });

        let mut summary = ImportSummary::default();
        let tx = self.conn.transaction()?;
        for record in records {
            if !has_valid_pk(record, fields) {
                warn!(
                    source = %record.source_filename,
                    "skipping record with empty primary-key value"
                );
                summary.skipped += 1;
                continue;
            }

            if let Some(sql) = &displaced_sql {
                let pk_values: Vec<&str> = pk_fields
                    .iter()
                    .map(|f| record.get(&f.key).unwrap_or_default())
                    .collect();
                let displaced: Option<i64> = tx
                    .query_row(sql, rusqlite::params_from_iter(pk_values.iter()), |row| {
                        row.get(0)
                    })
                    .optional()?;
                if let Some(old_rowid) = displaced {
                    tx.execute(
                        &format!(
                            "DELETE FROM \"{table}_source_map\" WHERE record_rowid = ?1"
                        ),
                        params![old_rowid],
                    )?;
                }
            }

            let values: Vec<String> = fields
                .iter()
                .map(|f| record.get(&f.key).unwrap_or_default().to_string())
                .collect();
            let inserted = tx.execute(
                &insert_sql,
                rusqlite::params_from_iter(values.iter()),
            );
            match inserted {
                Ok(_) => {
                    let rowid = tx.last_insert_rowid();
                    let source_id = ensure_source(&tx, table, &record.source_filename)?;
                    tx.execute(
                        &format!(
                            "INSERT OR IGNORE INTO \"{table}_source_map\"
                             (source_id, record_rowid) VALUES (?1, ?2)"
                        ),
                        params![source_id, rowid],
                    )?;
                    summary.imported += 1;
                }
                Err(e) => {
                    warn!(
                        source = %record.source_filename,
                        error = %e,
                        "record rejected by the database"
                    );
                    summary.failed += 1;
                }
            }
        }
        tx.commit()?;
        info!(table, %summary, "batch import finished");
        Ok(summary)
    }

    /// Filenames registered as import sources for a table.
    pub fn sources(&self, table: &str) -> ExtractResult<Vec<String>> {
        validate_identifier(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT filename FROM \"{table}_import_sources\" ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Stores a human-friendly display name for a table or field key.
    ///
    /// `kind` is `"field"` for columns and `"table"` for the table itself;
    /// the meta dict is keyed on `(kind, key)` so the two namespaces never
    /// collide.
    pub fn set_display_name(&self, kind: &str, key: &str, value: &str) -> ExtractResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO _sys_meta_dict (type, key, value) VALUES (?1, ?2, ?3)",
            params![kind, key, value],
        )?;
        Ok(())
    }

    /// Looks up a display name from the meta dict.
    pub fn display_name(&self, kind: &str, key: &str) -> ExtractResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM _sys_meta_dict WHERE type = ?1 AND key = ?2",
                params![kind, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Number of rows currently in a table.
    pub fn row_count(&self, table: &str) -> ExtractResult<i64> {
        validate_identifier(table)?;
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    fn column_names(&self, table: &str) -> ExtractResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>("name"))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Registers a source filename if new and returns its id.
fn ensure_source(tx: &rusqlite::Transaction<'_>, table: &str, filename: &str) -> ExtractResult<i64> {
    tx.execute(
        &format!("INSERT OR IGNORE INTO \"{table}_import_sources\" (filename) VALUES (?1)"),
        params![filename],
    )?;
    let id = tx.query_row(
        &format!("SELECT id FROM \"{table}_import_sources\" WHERE filename = ?1"),
        params![filename],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Restricts table and column identifiers to `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Identifiers are interpolated into DDL, so anything else is rejected
/// up front rather than quoted around.
fn validate_identifier(name: &str) -> ExtractResult<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ExtractError::invalid_input(format!(
            "'{name}' is not a valid SQL identifier"
        )))
    }
}
