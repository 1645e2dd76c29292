//! Database repository layer
//!
//! Insert and query operations for the change log.

use crate::changes::ChangeLog;
use crate::error::{Error, Result};
use crate::types::{Change, ChangeType, ResourceId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed store.
///
/// The connection sits behind a mutex, which also serializes appends.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Change operations
    // ============================================

    /// Append a change
    pub fn insert_change(&self, change: &Change) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO changes (
                id, resource_id, timestamp, reason, change_type,
                before_content, after_content, project_path, file_path
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                change.id,
                change.resource_id.as_str(),
                change.timestamp.to_rfc3339(),
                change.reason,
                change.change_type.as_str(),
                change.before_content,
                change.after_content,
                change
                    .project_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                change.file_path.to_string_lossy().to_string(),
            ],
        )?;
        Ok(())
    }

    /// All changes for a resource, oldest first
    pub fn get_changes_for_resource(&self, resource_id: &ResourceId) -> Result<Vec<Change>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT * FROM changes WHERE resource_id = ?1 ORDER BY seq ASC",
        )?;
        let changes = stmt
            .query_map([resource_id.as_str()], Self::row_to_change)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(changes)
    }

    /// One change by id, scoped to its resource
    pub fn get_change(&self, resource_id: &ResourceId, change_id: &str) -> Result<Option<Change>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM changes WHERE resource_id = ?1 AND id = ?2",
            params![resource_id.as_str(), change_id],
            Self::row_to_change,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Total number of recorded changes
    pub fn count_changes(&self) -> Result<i64> {
        let conn = self.connection();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM changes", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_change(row: &Row) -> rusqlite::Result<Change> {
        let resource_id: String = row.get("resource_id")?;
        let timestamp_str: String = row.get("timestamp")?;
        let change_type_str: String = row.get("change_type")?;
        let project_path: Option<String> = row.get("project_path")?;
        let file_path: String = row.get("file_path")?;

        let change_type = change_type_str.parse::<ChangeType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Change {
            id: row.get("id")?,
            resource_id: ResourceId::from(resource_id),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            reason: row.get("reason")?,
            change_type,
            before_content: row.get("before_content")?,
            after_content: row.get("after_content")?,
            project_path: project_path.map(PathBuf::from),
            file_path: PathBuf::from(file_path),
        })
    }
}

impl ChangeLog for Database {
    fn append(&self, change: &Change) -> Result<()> {
        self.insert_change(change)
    }

    fn history(&self, resource_id: &ResourceId) -> Result<Vec<Change>> {
        self.get_changes_for_resource(resource_id)
    }

    fn find(&self, resource_id: &ResourceId, change_id: &str) -> Result<Option<Change>> {
        self.get_change(resource_id, change_id)
    }
}
