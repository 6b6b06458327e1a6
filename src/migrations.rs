//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.
//!
//! For databases created before the framework existed, the bootstrap function
//! detects the presence of known tables and marks migration 001 as applied so
//! the baseline SQL never runs against an already-populated database.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Detect a pre-framework database and mark the baseline as applied.
///
/// If the `fiscal_year` table exists but `schema_version` has no rows, this
/// database predates the migration framework. Mark migration 001 (the
/// baseline) as applied so its CREATE TABLE statements never run against an
/// already-populated database.
fn bootstrap_existing_db(conn: &Connection) -> Result<bool, String> {
    let version = current_version(conn)?;
    if version > 0 {
        return Ok(false);
    }

    let has_fiscal_year: bool = conn
        .prepare("SELECT 1 FROM fiscal_year LIMIT 1")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if has_fiscal_year {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [1],
        )
        .map_err(|e| format!("Failed to bootstrap schema version: {}", e))?;
        log::info!("Migration bootstrap: marked v1 (baseline) as applied for existing database");
        return Ok(true);
    }

    Ok(false)
}

/// Back up the database before applying migrations.
///
/// Uses SQLite's online backup API to create a hot copy at
/// `<db_path>.pre-migration.bak`. Only called when there are pending
/// migrations.
fn backup_before_migration(conn: &Connection) -> Result<(), String> {
    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("Failed to get database path: {}", e))?;

    if db_path.is_empty() || db_path == ":memory:" {
        // In-memory or temp database — skip backup
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = rusqlite::Connection::open(&backup_path)
        .map_err(|e| format!("Failed to open backup file: {}", e))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)
        .map_err(|e| format!("Failed to initialize pre-migration backup: {}", e))?;

    backup
        .step(-1)
        .map_err(|e| format!("Pre-migration backup failed: {}", e))?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
///
/// Forward-compat guard: if the database has a higher version than the
/// highest known migration, returns an error telling the operator to update.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;
    bootstrap_existing_db(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    // Forward-compat guard
    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this build supports ({}). \
             Please update the application.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn)?;

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_baseline() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1, "should apply exactly 1 migration (baseline)");

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 1);

        // All six tables exist and are empty.
        for table in [
            "fiscal_year",
            "month",
            "field_type",
            "data",
            "report_type",
            "report_pivot",
        ] {
            let count: i32 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap_or_else(|_| panic!("{table} table should exist"));
            assert_eq!(count, 0, "{table} should start empty");
        }

        // The data.value column accepts both TEXT and INTEGER.
        conn.execute_batch(
            "INSERT INTO fiscal_year (year, month, day, current, c_time, m_time)
             VALUES (182, 2, 19, 1, 't', 't'), (183, 2, 19, 0, 't', 't');
             INSERT INTO field_type (field, c_time, m_time) VALUES ('cash_in_bank', 't', 't');
             INSERT INTO data (value, fy1fk, fy2fk, ffk, c_time, m_time)
             VALUES (100000, 1, 2, 1, 't', 't');
             INSERT INTO data (value, fy1fk, fy2fk, ffk, c_time, m_time)
             VALUES ('R. Khan', 1, 2, 1, 't', 't');",
        )
        .expect("dynamic-typed value column");
    }

    #[test]
    fn test_bootstrap_existing_db() {
        let conn = mem_db();

        // Simulate a pre-framework database: hand-built fiscal_year with data.
        conn.execute_batch(
            "CREATE TABLE fiscal_year (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                year INTEGER NOT NULL UNIQUE,
                month INTEGER NOT NULL,
                day INTEGER NOT NULL,
                current INTEGER NOT NULL DEFAULT 0,
                work_on INTEGER NOT NULL DEFAULT 0,
                audit INTEGER NOT NULL DEFAULT 0,
                c_time TEXT NOT NULL,
                m_time TEXT NOT NULL
            );
            INSERT INTO fiscal_year (year, month, day, current, c_time, m_time)
            VALUES (182, 2, 19, 1, '0182-02-19T00:00:00', '0182-02-19T00:00:00');",
        )
        .expect("seed existing db");

        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 0, "bootstrap should mark v1 as applied, not run SQL");

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 1);

        // Existing data untouched.
        let year: i32 = conn
            .query_row("SELECT year FROM fiscal_year WHERE current = 1", [], |r| {
                r.get(0)
            })
            .expect("existing data should be preserved");
        assert_eq!(year, 182);
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();

        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let result = run_migrations(&conn);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(
            err.contains("newer than this build"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();

        let first = run_migrations(&conn).expect("first run");
        assert_eq!(first, 1);

        let second = run_migrations(&conn).expect("second run");
        assert_eq!(second, 0, "second run should apply no migrations");

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 1);
    }

    #[test]
    fn test_pre_migration_backup_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test_backup.db");

        let conn = Connection::open(&db_path).expect("open db");
        conn.execute_batch("PRAGMA journal_mode=WAL;").unwrap();

        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1);

        let backup_path = dir.path().join("test_backup.db.pre-migration.bak");
        assert!(
            backup_path.exists(),
            "pre-migration backup should be created at {}",
            backup_path.display()
        );
    }
}
