//! The field catalog: every data-entry field name any form has ever
//! collected.
//!
//! Append-only by design. A field retired from a form may still be referenced
//! by historical data rows, and its catalog entry is the only guarantee those
//! rows remain query-able — so entries are never reaped.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Row};

use super::TreasuryDb;
use crate::badi::now_stamp;
use crate::error::StoreError;

/// A row from the `field_type` table.
#[derive(Debug, Clone)]
pub struct FieldRow {
    pub pk: i64,
    pub field: String,
    pub c_time: String,
    pub m_time: String,
}

impl FieldRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pk: row.get(0)?,
            field: row.get(1)?,
            c_time: row.get(2)?,
            m_time: row.get(3)?,
        })
    }
}

impl TreasuryDb {
    /// Insert whichever candidate names the catalog does not know yet.
    ///
    /// Returns the newly added names, sorted (empty when nothing was new).
    /// Never removes anything.
    pub fn ensure_fields(&self, candidates: &HashSet<String>) -> Result<Vec<String>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let known = self.known_field_names()?;
        let mut added: Vec<String> = candidates.difference(&known).cloned().collect();
        added.sort();

        let stamp = now_stamp();
        for field in &added {
            self.conn_ref().execute(
                "INSERT INTO field_type (field, c_time, m_time) VALUES (?1, ?2, ?2)",
                params![field, stamp],
            )?;
        }
        if !added.is_empty() {
            log::info!("Field catalog grew by {}: {:?}", added.len(), added);
        }
        Ok(added)
    }

    /// Catalog rows for the given names. An empty input set is a caller bug
    /// and fails fast rather than returning an empty result.
    pub fn field_types(&self, names: &HashSet<String>) -> Result<Vec<FieldRow>, StoreError> {
        if names.is_empty() {
            return Err(StoreError::EmptyFieldQuery);
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT pk, field, c_time, m_time FROM field_type
             WHERE field IN ({placeholders}) ORDER BY field"
        ))?;
        let mapped = stmt.query_map(params_from_iter(names.iter()), FieldRow::from_row)?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Every name the catalog knows.
    pub fn known_field_names(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.conn_ref().prepare("SELECT field FROM field_type")?;
        let mapped = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = HashSet::new();
        for name in mapped {
            names.insert(name?);
        }
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================
