//! CRUD operations for chat [`Group`]s and their [`GroupMember`]s.
//!
//! Role rules (who may invite, remove, promote) live in the server; this
//! module only stores what it is told.

use chrono::Utc;
use murmur_shared::{GroupId, GroupRole, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{enum_at, timestamp_at, Group, GroupMember, Membership};

impl Database {
    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Create a group and make `owner_id` its owner in one unit.
    pub fn create_group(&self, owner_id: UserId, name: &str) -> Result<Group> {
        self.transaction(|db| -> Result<Group> {
            let now = Utc::now();
            db.conn().execute(
                "INSERT INTO chat_groups (name, owner_id, avatar_url, created_at)
                 VALUES (?1, ?2, '', ?3)",
                params![name, owner_id.0, now.to_rfc3339()],
            )?;
            let id = GroupId(db.conn().last_insert_rowid());
            db.add_group_member(id, owner_id, GroupRole::Owner)?;

            tracing::debug!(group = %id, owner = %owner_id, "created group");

            Ok(Group {
                id,
                name: name.to_string(),
                owner_id,
                avatar_url: String::new(),
                created_at: now,
            })
        })
    }

    pub fn get_group(&self, id: GroupId) -> Result<Group> {
        self.conn()
            .query_row(
                "SELECT id, name, owner_id, avatar_url, created_at FROM chat_groups WHERE id = ?1",
                params![id.0],
                row_to_group,
            )
            .map_err(not_found)
    }

    pub fn set_group_owner(&self, group_id: GroupId, owner_id: UserId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE chat_groups SET owner_id = ?2 WHERE id = ?1",
            params![group_id.0, owner_id.0],
        )?;
        if affected == 0 {
            return Err(crate::StoreError::NotFound);
        }
        Ok(())
    }

    /// Groups `user_id` belongs to, with their role, oldest group first.
    pub fn list_groups_for_user(&self, user_id: UserId) -> Result<Vec<Membership>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.owner_id, g.avatar_url, g.created_at, m.role
             FROM group_members m
             JOIN chat_groups g ON g.id = m.group_id
             WHERE m.user_id = ?1
             ORDER BY g.id ASC",
        )?;
        let rows = stmt.query_map(params![user_id.0], |row| {
            Ok(Membership {
                group: row_to_group(row)?,
                role: enum_at(row, 5, GroupRole::parse)?,
            })
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?);
        }
        Ok(memberships)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Add a member.  Returns `false` if the user was already a member, in
    /// which case their role is left alone.
    pub fn add_group_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO group_members (group_id, user_id, role, nickname, joined_at)
             VALUES (?1, ?2, ?3, '', ?4)",
            params![group_id.0, user_id.0, role.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    pub fn get_membership(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<Option<GroupMember>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT group_id, user_id, role, nickname, joined_at
                 FROM group_members
                 WHERE group_id = ?1 AND user_id = ?2",
                params![group_id.0, user_id.0],
                row_to_member,
            )
            .optional()?)
    }

    pub fn list_group_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>> {
        let mut stmt = self.conn().prepare(
            "SELECT group_id, user_id, role, nickname, joined_at
             FROM group_members
             WHERE group_id = ?1
             ORDER BY joined_at ASC, user_id ASC",
        )?;
        let rows = stmt.query_map(params![group_id.0], row_to_member)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Ids of every current member, read fresh on each call.
    pub fn group_member_ids(&self, group_id: GroupId) -> Result<Vec<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY user_id ASC")?;
        let rows = stmt.query_map(params![group_id.0], |row| Ok(UserId(row.get(0)?)))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn set_member_role(
        &self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE group_members SET role = ?3 WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.0, user_id.0, role.as_str()],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_group_member(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.0, user_id.0],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId(row.get(0)?),
        name: row.get(1)?,
        owner_id: UserId(row.get(2)?),
        avatar_url: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
    })
}

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMember> {
    Ok(GroupMember {
        group_id: GroupId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        role: enum_at(row, 2, GroupRole::parse)?,
        nickname: row.get(3)?,
        joined_at: timestamp_at(row, 4)?,
    })
}
