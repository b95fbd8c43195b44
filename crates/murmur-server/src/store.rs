//! Shared handle to the SQLite database.
//!
//! `rusqlite::Connection` is not `Sync`, so the server keeps a single
//! connection behind a mutex.  Calls are short and synchronous; the lock is
//! never held across an `.await`.

use std::sync::{Arc, Mutex};

use murmur_store::Database;

use crate::error::ServerError;

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the database.
    pub fn call<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Database) -> Result<T, ServerError>,
    {
        let db = self
            .db
            .lock()
            .map_err(|_| ServerError::Transient("database lock poisoned".into()))?;
        f(&db)
    }

    /// Run `f` inside a store transaction; any error rolls every write back.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Database) -> Result<T, ServerError>,
    {
        self.call(|db| db.transaction(f))
    }
}

#[cfg(test)]
impl Store {
    pub fn in_memory() -> Self {
        Self::new(Database::open_in_memory().expect("in-memory database"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_transaction_leaves_no_trace() {
        let store = Store::in_memory();

        let result: Result<(), ServerError> = store.transaction(|db| {
            db.create_user("ann", "", "")?;
            Err(ServerError::InvalidState("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .call(|db| {
                Ok(db
                    .conn()
                    .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(murmur_store::StoreError::from)?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
