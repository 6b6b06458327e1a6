//! SQLite-backed treasury store.
//!
//! The database lives at `~/.badi-treasury/treasury.db` and holds the fiscal
//! year chain, the month table, the field catalog, the per-field data rows,
//! and the report tables. The form layer supplies `{field_name: value}` maps
//! on save and reads the same shape back on populate; everything in between
//! is this module and its submodules.

use std::path::PathBuf;

use rusqlite::Connection;

use crate::error::StoreError;
use crate::settings::Settings;

pub mod fields;
pub mod fiscal_years;
pub mod months;
pub mod reports;
pub mod values;

pub use fiscal_years::{FiscalYearRow, YearContext, YearFilter};
pub use months::{MonthFilter, MonthRow};
pub use values::{FormValue, SaveOutcome, StoredValue, ValueRow};

/// The fixed table set this build understands. Anything else on disk is a
/// schema mismatch and refuses to open.
const EXPECTED_TABLES: [&str; 6] = [
    "fiscal_year",
    "month",
    "field_type",
    "data",
    "report_type",
    "report_pivot",
];

/// SQLite connection wrapper for the treasury store.
///
/// Intentionally NOT `Clone` or `Sync`: it is held behind a mutex by the
/// async facade so that all mutations serialize through one writer.
#[derive(Debug)]
pub struct TreasuryDb {
    conn: Connection,
}

impl TreasuryDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at its configured path and bring the
    /// schema up to date.
    pub fn open(settings: &Settings) -> Result<Self, StoreError> {
        let path = Self::db_path(settings)?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub(crate) fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(StoreError::Migration)?;

        // Refuse to operate against a structure this build does not recognize.
        Self::verify_schema(&conn)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self { conn };
        db.seed_months()?;
        Ok(db)
    }

    /// Resolve the database path: the configured data directory if set,
    /// otherwise `~/.badi-treasury/treasury.db`.
    fn db_path(settings: &Settings) -> Result<PathBuf, StoreError> {
        let dir = match &settings.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or(StoreError::HomeDirNotFound)?
                .join(".badi-treasury"),
        };
        Ok(dir.join("treasury.db"))
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Compare the on-disk table set against [`EXPECTED_TABLES`].
    ///
    /// `schema_version` (the migration ledger) and SQLite's own internal
    /// tables are exempt. Any other difference is startup-fatal.
    fn verify_schema(conn: &Connection) -> Result<(), StoreError> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table'
               AND name NOT LIKE 'sqlite_%'
               AND name != 'schema_version'
             ORDER BY name",
        )?;
        let found: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let missing: Vec<String> = EXPECTED_TABLES
            .iter()
            .filter(|t| !found.iter().any(|f| f == *t))
            .map(|t| t.to_string())
            .collect();
        let unexpected: Vec<String> = found
            .into_iter()
            .filter(|f| !EXPECTED_TABLES.contains(&f.as_str()))
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            log::error!(
                "Schema mismatch: missing {:?}, unexpected {:?}",
                missing,
                unexpected
            );
            Err(StoreError::SchemaMismatch {
                missing,
                unexpected,
            })
        }
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::TreasuryDb;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of
    /// the test. Test temp dirs are cleaned up by the OS.
    pub fn test_db() -> TreasuryDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        TreasuryDb::open_at(path).expect("Failed to open test database")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in EXPECTED_TABLES {
            let count: i32 = db
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap_or_else(|_| panic!("{table} table should exist"));
            if table == "month" {
                assert!(count > 0, "month table is seeded on open");
            } else {
                assert_eq!(count, 0, "{table} should start empty");
            }
        }
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("idempotent.db");

        let _db1 = TreasuryDb::open_at(path.clone()).expect("first open");
        let _db2 = TreasuryDb::open_at(path).expect("second open should not fail");
    }

    #[test]
    fn test_unexpected_table_refuses_to_open() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stray.db");

        {
            let db = TreasuryDb::open_at(path.clone()).expect("first open");
            db.conn
                .execute_batch("CREATE TABLE stray (pk INTEGER PRIMARY KEY);")
                .expect("create stray table");
        }

        let err = TreasuryDb::open_at(path).expect_err("stray table should refuse open");
        match err {
            StoreError::SchemaMismatch { unexpected, .. } => {
                assert_eq!(unexpected, vec!["stray".to_string()]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_table_refuses_to_open() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dropped.db");

        {
            let db = TreasuryDb::open_at(path.clone()).expect("first open");
            // Migrations already recorded as applied, so the table will not
            // come back on reopen.
            db.conn
                .execute_batch("DROP TABLE report_pivot;")
                .expect("drop table");
        }

        let err = TreasuryDb::open_at(path).expect_err("missing table should refuse open");
        match err {
            StoreError::SchemaMismatch { missing, .. } => {
                assert_eq!(missing, vec!["report_pivot".to_string()]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_with_transaction_rolls_back_on_err() {
        let db = test_db();

        let result: Result<(), StoreError> = db.with_transaction(|db| {
            db.conn.execute(
                "INSERT INTO field_type (field, c_time, m_time) VALUES ('doomed', 't', 't')",
                [],
            )?;
            Err(StoreError::MissingField("doomed".into()))
        });
        assert!(result.is_err());

        let count: i32 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM field_type WHERE field = 'doomed'",
                [],
                |row| row.get(0),
            )
            .expect("count query");
        assert_eq!(count, 0, "rolled-back insert must not be visible");
    }
}
