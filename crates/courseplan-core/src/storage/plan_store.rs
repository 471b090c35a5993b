//! Persisted plans with optimistic versioning.
//!
//! Each student has one stored [`PlanSnapshot`] and a version counter that
//! goes up by one on every save. A writer passes the version it last read;
//! if another writer got there first the save fails with
//! [`StoreError::VersionConflict`] and the caller re-reads, re-applies and
//! tries again.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, StoreError};
use crate::selection::PlanSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlan {
    /// Starts at 1 for the first save.
    pub version: u64,
    pub snapshot: PlanSnapshot,
    pub saved_at: DateTime<Utc>,
}

/// Opaque per-student plan storage.
pub trait PlanStore {
    /// The student's plan, or `None` if nothing was saved yet.
    fn load(&self, student: &str) -> Result<Option<StoredPlan>, StoreError>;

    /// Save `snapshot` if the stored version still equals `expected_version`
    /// (0 when no plan exists yet). Returns the new version.
    fn save(
        &self,
        student: &str,
        expected_version: u64,
        snapshot: &PlanSnapshot,
    ) -> Result<u64, StoreError>;
}

/// SQLite-backed [`PlanStore`].
pub struct SqlitePlanStore {
    conn: Connection,
}

impl SqlitePlanStore {
    /// Open `courseplan.db` in the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened,
    /// or the schema cannot be migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir()?;
        Self::open_at(&dir.join("courseplan.db"))
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn current_version(&self, student: &str) -> Result<u64, StoreError> {
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM plans WHERE student = ?1",
                [student],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map_or(0, to_version))
    }

    /// Students with a stored plan.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn students(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT student FROM plans ORDER BY student")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a student's plan. Returns whether one existed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn delete(&self, student: &str) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM plans WHERE student = ?1", [student])?;
        Ok(n > 0)
    }
}

impl PlanStore for SqlitePlanStore {
    fn load(&self, student: &str) -> Result<Option<StoredPlan>, StoreError> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(
                "SELECT version, snapshot, saved_at FROM plans WHERE student = ?1",
                [student],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((version, snapshot, saved_at)) = row else {
            return Ok(None);
        };

        let corrupt = |message: String| StoreError::Corrupt {
            student: student.to_string(),
            message,
        };
        let snapshot: PlanSnapshot =
            serde_json::from_str(&snapshot).map_err(|e| corrupt(e.to_string()))?;
        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc);
        Ok(Some(StoredPlan {
            version: to_version(version),
            snapshot,
            saved_at,
        }))
    }

    fn save(
        &self,
        student: &str,
        expected_version: u64,
        snapshot: &PlanSnapshot,
    ) -> Result<u64, StoreError> {
        let json = serde_json::to_string(snapshot).map_err(|e| StoreError::Corrupt {
            student: student.to_string(),
            message: e.to_string(),
        })?;
        let now = Utc::now().to_rfc3339();
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);

        let changed = if expected_version == 0 {
            self.conn.execute(
                "INSERT OR IGNORE INTO plans (student, version, snapshot, saved_at)
                 VALUES (?1, 1, ?2, ?3)",
                params![student, json, now],
            )?
        } else {
            self.conn.execute(
                "UPDATE plans SET version = version + 1, snapshot = ?2, saved_at = ?3
                 WHERE student = ?1 AND version = ?4",
                params![student, json, now, expected],
            )?
        };

        if changed == 0 {
            let actual = self.current_version(student)?;
            tracing::warn!(student, expected = expected_version, actual, "plan version conflict");
            return Err(StoreError::VersionConflict {
                student: student.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = expected_version + 1;
        tracing::info!(student, version, courses = snapshot.courses.len(), "saved plan");
        Ok(version)
    }
}

fn to_version(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}
