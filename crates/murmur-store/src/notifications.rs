//! CRUD operations for [`Notification`] records.
//!
//! A friend request is a notification of kind `friend_request`; its
//! `status` column carries the request lifecycle.

use chrono::Utc;
use murmur_shared::{NotificationId, NotificationKind, RequestStatus, UserId};
use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{enum_at, timestamp_at, Notification};

const NOTIFICATION_COLUMNS: &str =
    "id, sender_id, receiver_id, kind, status, is_read, content, created_at, updated_at";

impl Database {
    pub fn insert_notification(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        kind: NotificationKind,
        content: &str,
    ) -> Result<Notification> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO notifications
                (sender_id, receiver_id, kind, status, is_read, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?5)",
            params![sender_id.0, receiver_id.0, kind.as_str(), content, now.to_rfc3339()],
        )?;
        Ok(Notification {
            id: NotificationId(self.conn().last_insert_rowid()),
            sender_id,
            receiver_id,
            kind,
            status: RequestStatus::Pending,
            is_read: false,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_notification(&self, id: NotificationId) -> Result<Notification> {
        self.conn()
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![id.0],
                row_to_notification,
            )
            .map_err(not_found)
    }

    /// Record the outcome of a request and mark it read.
    pub fn update_notification_outcome(
        &self,
        id: NotificationId,
        status: RequestStatus,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE notifications SET status = ?2, is_read = 1, updated_at = ?3 WHERE id = ?1",
            params![id.0, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(crate::StoreError::NotFound);
        }
        Ok(())
    }

    /// Notifications addressed to `user_id`, newest first, optionally
    /// filtered by kind.
    pub fn list_received_notifications(
        &self,
        user_id: UserId,
        kind: Option<NotificationKind>,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS}
             FROM notifications
             WHERE receiver_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(
            params![user_id.0, kind.map(NotificationKind::as_str)],
            row_to_notification,
        )?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Friend requests `user_id` has sent, newest first.
    pub fn list_sent_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS}
             FROM notifications
             WHERE sender_id = ?1 AND kind = 'friend_request'
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.0], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: NotificationId(row.get(0)?),
        sender_id: UserId(row.get(1)?),
        receiver_id: UserId(row.get(2)?),
        kind: enum_at(row, 3, NotificationKind::parse)?,
        status: enum_at(row, 4, RequestStatus::parse)?,
        is_read: row.get(5)?,
        content: row.get(6)?,
        created_at: timestamp_at(row, 7)?,
        updated_at: timestamp_at(row, 8)?,
    })
}
