//! CRUD operations for [`User`] records.

use chrono::Utc;
use murmur_shared::constants::DEFAULT_FRIEND_GROUP_NAME;
use murmur_shared::UserId;
use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{timestamp_at, User};

impl Database {
    /// Insert a new user together with their default friend group.
    pub fn create_user(&self, username: &str, avatar_url: &str, bio: &str) -> Result<User> {
        self.transaction(|db| -> Result<User> {
            let now = Utc::now();
            db.conn().execute(
                "INSERT INTO users (username, avatar_url, bio, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![username, avatar_url, bio, now.to_rfc3339()],
            )?;
            let id = UserId(db.conn().last_insert_rowid());
            db.create_friend_group(id, DEFAULT_FRIEND_GROUP_NAME)?;

            tracing::debug!(user = %id, "created user");

            Ok(User {
                id,
                username: username.to_string(),
                avatar_url: avatar_url.to_string(),
                bio: bio.to_string(),
                created_at: now,
            })
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, avatar_url, bio, created_at FROM users WHERE id = ?1",
                params![id.0],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn user_exists(&self, id: UserId) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        avatar_url: row.get(2)?,
        bio: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[test]
    fn test_create_user_adds_default_friend_group() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ann", "", "hello").unwrap();

        assert_eq!(db.get_user(user.id).unwrap(), user);
        let groups = db.list_friend_groups(user.id).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, DEFAULT_FRIEND_GROUP_NAME);
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user(UserId(99)), Err(StoreError::NotFound)));
        assert!(!db.user_exists(UserId(99)).unwrap());
    }
}
