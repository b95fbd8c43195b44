//! CRUD operations for [`FriendGroup`] records.

use chrono::Utc;
use murmur_shared::constants::DEFAULT_FRIEND_GROUP_NAME;
use murmur_shared::{FriendGroupId, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{timestamp_at, FriendGroup};

impl Database {
    pub fn create_friend_group(&self, user_id: UserId, name: &str) -> Result<FriendGroup> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO friend_groups (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user_id.0, name, now.to_rfc3339()],
        )?;
        Ok(FriendGroup {
            id: FriendGroupId(self.conn().last_insert_rowid()),
            user_id,
            name: name.to_string(),
            created_at: now,
        })
    }

    pub fn get_friend_group(&self, id: FriendGroupId) -> Result<FriendGroup> {
        self.conn()
            .query_row(
                "SELECT id, user_id, name, created_at FROM friend_groups WHERE id = ?1",
                params![id.0],
                row_to_friend_group,
            )
            .map_err(not_found)
    }

    /// All folders of one user, oldest first (the default group leads).
    pub fn list_friend_groups(&self, user_id: UserId) -> Result<Vec<FriendGroup>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, name, created_at
             FROM friend_groups
             WHERE user_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id.0], row_to_friend_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// The user's "My Friends" folder, created on demand.
    pub fn default_friend_group(&self, user_id: UserId) -> Result<FriendGroup> {
        let existing = self
            .conn()
            .query_row(
                "SELECT id, user_id, name, created_at
                 FROM friend_groups
                 WHERE user_id = ?1 AND name = ?2
                 ORDER BY id ASC
                 LIMIT 1",
                params![user_id.0, DEFAULT_FRIEND_GROUP_NAME],
                row_to_friend_group,
            )
            .optional()?;

        match existing {
            Some(group) => Ok(group),
            None => self.create_friend_group(user_id, DEFAULT_FRIEND_GROUP_NAME),
        }
    }
}

fn row_to_friend_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendGroup> {
    Ok(FriendGroup {
        id: FriendGroupId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        name: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
    })
}
