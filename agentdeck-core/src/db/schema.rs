//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: append-only change log
    r#"
    CREATE TABLE IF NOT EXISTS changes (
        seq              INTEGER PRIMARY KEY AUTOINCREMENT,
        id               TEXT NOT NULL UNIQUE,
        resource_id      TEXT NOT NULL,
        timestamp        DATETIME NOT NULL,
        reason           TEXT NOT NULL,
        change_type      TEXT NOT NULL,
        before_content   TEXT,
        after_content    TEXT NOT NULL,
        project_path     TEXT,
        file_path        TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_changes_resource ON changes(resource_id, seq);

    CREATE TRIGGER IF NOT EXISTS changes_no_update
    BEFORE UPDATE ON changes
    BEGIN
        SELECT RAISE(ABORT, 'changes are append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS changes_no_delete
    BEFORE DELETE ON changes
    BEGIN
        SELECT RAISE(ABORT, 'changes are append-only');
    END;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_changes_table_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let exists: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='changes'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1);
    }

    #[test]
    fn test_changes_are_append_only() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO changes (id, resource_id, timestamp, reason, change_type, after_content, file_path)
             VALUES ('c1', 'r', '2025-01-01T00:00:00Z', 'x', 'create', 'a', '/f')",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE changes SET reason = 'y' WHERE id = 'c1'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM changes", []).is_err());
    }
}
