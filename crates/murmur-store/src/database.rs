//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at an explicit path.
    ///
    /// Missing parent directories are created.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Run `f` inside a savepoint.
    ///
    /// Any error returned by `f` rolls the whole unit back, so callers can
    /// chain several CRUD helpers and get all-or-nothing semantics.
    /// Savepoints nest, so helpers that are themselves transactional can be
    /// called from inside another transaction.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Database) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.conn
            .execute_batch("SAVEPOINT murmur_tx")
            .map_err(StoreError::from)?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("RELEASE murmur_tx")
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO murmur_tx; RELEASE murmur_tx")
                {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        assert!(path.exists());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.transaction(|db| -> Result<()> {
            db.conn()
                .execute("INSERT INTO users (username, created_at) VALUES ('ann', 'now')", [])?;
            Err(StoreError::NotFound)
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_nested_failure_only_undoes_inner_work() {
        let db = Database::open_in_memory().unwrap();

        db.transaction(|db| -> Result<()> {
            db.conn()
                .execute("INSERT INTO users (username, created_at) VALUES ('ann', 'now')", [])?;
            let inner: Result<()> = db.transaction(|db| -> Result<()> {
                db.conn().execute(
                    "INSERT INTO users (username, created_at) VALUES ('bob', 'now')",
                    [],
                )?;
                Err(StoreError::NotFound)
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        let names: Vec<String> = db
            .conn()
            .prepare("SELECT username FROM users")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(names, vec!["ann".to_string()]);
    }

    #[test]
    fn test_successful_transaction_commits() {
        let db = Database::open_in_memory().unwrap();

        db.transaction(|db| -> Result<()> {
            db.conn()
                .execute("INSERT INTO users (username, created_at) VALUES ('ann', 'now')", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
