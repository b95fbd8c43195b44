//! CRUD operations for directed [`Friendship`] edges.

use chrono::Utc;
use murmur_shared::{FriendGroupId, RequestStatus, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{enum_at, timestamp_at, Friend, Friendship, User};

const FRIENDSHIP_COLUMNS: &str =
    "id, user_id, friend_id, status, group_id, remark, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn insert_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
        status: RequestStatus,
        group_id: Option<FriendGroupId>,
        remark: &str,
    ) -> Result<Friendship> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO friendships (user_id, friend_id, status, group_id, remark, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user_id.0,
                friend_id.0,
                status.as_str(),
                group_id.map(|g| g.0),
                remark,
                now.to_rfc3339(),
            ],
        )?;
        Ok(Friendship {
            id: self.conn().last_insert_rowid(),
            user_id,
            friend_id,
            status,
            group_id,
            remark: remark.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Write an accepted edge, overwriting a pending edge in the same
    /// direction if one exists (both users had asked each other).
    pub fn upsert_accepted_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
        group_id: Option<FriendGroupId>,
        remark: &str,
    ) -> Result<Friendship> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO friendships (user_id, friend_id, status, group_id, remark, created_at, updated_at)
             VALUES (?1, ?2, 'accepted', ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, friend_id) DO UPDATE SET
                status     = 'accepted',
                group_id   = excluded.group_id,
                remark     = excluded.remark,
                updated_at = excluded.updated_at",
            params![user_id.0, friend_id.0, group_id.map(|g| g.0), remark, now],
        )?;
        self.get_friendship(user_id, friend_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_friendship(&self, user_id: UserId, friend_id: UserId) -> Result<Friendship> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE user_id = ?1 AND friend_id = ?2"
                ),
                params![user_id.0, friend_id.0],
                row_to_friendship,
            )
            .map_err(not_found)
    }

    pub fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<Friendship>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE user_id = ?1 AND friend_id = ?2"
                ),
                params![user_id.0, friend_id.0],
                row_to_friendship,
            )
            .optional()?)
    }

    pub fn has_pending_friendship(&self, user_id: UserId, friend_id: UserId) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(
                SELECT 1 FROM friendships
                WHERE user_id = ?1 AND friend_id = ?2 AND status = 'pending'
             )",
            params![user_id.0, friend_id.0],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Accepted friends of `user_id`, with profiles, ordered by name.
    pub fn list_friends(&self, user_id: UserId) -> Result<Vec<Friend>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username, u.avatar_url, u.bio, u.created_at,
                    f.group_id, f.remark, f.updated_at
             FROM friendships f
             JOIN users u ON u.id = f.friend_id
             WHERE f.user_id = ?1 AND f.status = 'accepted'
             ORDER BY u.username ASC",
        )?;
        let rows = stmt.query_map(params![user_id.0], |row| {
            Ok(Friend {
                user: User {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    avatar_url: row.get(2)?,
                    bio: row.get(3)?,
                    created_at: timestamp_at(row, 4)?,
                },
                group_id: row.get::<_, Option<i64>>(5)?.map(FriendGroupId),
                remark: row.get(6)?,
                since: timestamp_at(row, 7)?,
            })
        })?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn set_friendship_status(
        &self,
        user_id: UserId,
        friend_id: UserId,
        status: RequestStatus,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE friendships SET status = ?3, updated_at = ?4
             WHERE user_id = ?1 AND friend_id = ?2",
            params![
                user_id.0,
                friend_id.0,
                status.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    /// File a friend under another folder; `remark` is only replaced when
    /// given.
    pub fn move_friend(
        &self,
        user_id: UserId,
        friend_id: UserId,
        group_id: FriendGroupId,
        remark: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE friendships SET
                group_id   = ?3,
                remark     = COALESCE(?4, remark),
                updated_at = ?5
             WHERE user_id = ?1 AND friend_id = ?2",
            params![
                user_id.0,
                friend_id.0,
                group_id.0,
                remark,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove one directed edge.  Returns `true` if a row was deleted.
    pub fn delete_friendship(&self, user_id: UserId, friend_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
            params![user_id.0, friend_id.0],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_friendship(row: &rusqlite::Row<'_>) -> rusqlite::Result<Friendship> {
    Ok(Friendship {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        friend_id: UserId(row.get(2)?),
        status: enum_at(row, 3, RequestStatus::parse)?,
        group_id: row.get::<_, Option<i64>>(4)?.map(FriendGroupId),
        remark: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}
