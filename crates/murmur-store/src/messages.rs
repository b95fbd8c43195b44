//! The append-only message log.

use murmur_shared::{GroupId, MessageId, UserId};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{timestamp_at, Message, MessageTarget, NewMessage};

impl Database {
    pub fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let (receiver_user, receiver_group) = match message.target {
            MessageTarget::User(user) => (Some(user.0), None),
            MessageTarget::Group(group) => (None, Some(group.0)),
        };
        self.conn().execute(
            "INSERT INTO messages
                (sender_id, receiver_user_id, receiver_group_id, content, client_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.sender_id.0,
                receiver_user,
                receiver_group,
                message.content,
                message.client_id,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(Message {
            id: MessageId(self.conn().last_insert_rowid()),
            sender_id: message.sender_id,
            target: message.target,
            content: message.content.clone(),
            client_id: message.client_id.clone(),
            created_at: message.created_at,
        })
    }

    /// The last `limit` messages exchanged between `a` and `b` in either
    /// direction, oldest first.
    pub fn private_history(&self, a: UserId, b: UserId, limit: u32) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, receiver_user_id, receiver_group_id, content, client_id, created_at
             FROM messages
             WHERE (sender_id = ?1 AND receiver_user_id = ?2)
                OR (sender_id = ?2 AND receiver_user_id = ?1)
             ORDER BY id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![a.0, b.0, limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }

    /// The last `limit` messages posted to `group_id`, oldest first.
    pub fn group_history(&self, group_id: GroupId, limit: u32) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, receiver_user_id, receiver_group_id, content, client_id, created_at
             FROM messages
             WHERE receiver_group_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![group_id.0, limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let receiver_user: Option<i64> = row.get(2)?;
    let receiver_group: Option<i64> = row.get(3)?;
    // The table CHECK guarantees exactly one receiver column is set.
    let target = match (receiver_user, receiver_group) {
        (Some(user), _) => MessageTarget::User(UserId(user)),
        (None, Some(group)) => MessageTarget::Group(GroupId(group)),
        (None, None) => {
            return Err(rusqlite::Error::InvalidColumnType(
                2,
                "receiver_user_id".to_string(),
                rusqlite::types::Type::Null,
            ))
        }
    };

    Ok(Message {
        id: MessageId(row.get(0)?),
        sender_id: UserId(row.get(1)?),
        target,
        content: row.get(4)?,
        client_id: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(sender: UserId, target: MessageTarget, content: &str) -> NewMessage {
        NewMessage {
            sender_id: sender,
            target,
            content: content.to_string(),
            client_id: None,
            created_at: Utc::now(),
        }
    }

    /// Three users and a group owned by the first.
    fn fixture() -> (Database, [UserId; 3], GroupId) {
        let db = Database::open_in_memory().unwrap();
        let users = [
            db.create_user("ann", "", "").unwrap().id,
            db.create_user("bob", "", "").unwrap().id,
            db.create_user("cat", "", "").unwrap().id,
        ];
        let group = db.create_group(users[0], "team").unwrap().id;
        (db, users, group)
    }

    #[test]
    fn test_private_history_covers_both_directions() {
        let (db, [ann, bob, cat], _) = fixture();

        db.insert_message(&message(ann, MessageTarget::User(bob), "hi"))
            .unwrap();
        db.insert_message(&message(bob, MessageTarget::User(ann), "hello"))
            .unwrap();
        db.insert_message(&message(ann, MessageTarget::User(cat), "other"))
            .unwrap();

        let history = db.private_history(bob, ann, 10).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello"]);
    }

    #[test]
    fn test_history_limit_keeps_newest() {
        let (db, [ann, ..], group) = fixture();
        for i in 0..5 {
            db.insert_message(&message(ann, MessageTarget::Group(group), &i.to_string()))
                .unwrap();
        }

        let history = db.group_history(group, 2).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3", "4"]);
        assert!(db.group_history(GroupId(group.0 + 1), 10).unwrap().is_empty());
    }

    #[test]
    fn test_stored_message_keeps_target_and_client_id() {
        let (db, [ann, ..], group) = fixture();
        let mut new = message(ann, MessageTarget::Group(group), "yo");
        new.client_id = Some("\"c-1\"".to_string());

        let stored = db.insert_message(&new).unwrap();
        let history = db.group_history(group, 1).unwrap();
        assert_eq!(history, vec![stored]);
        assert_eq!(history[0].target, MessageTarget::Group(group));
    }

    #[test]
    fn test_schema_refuses_message_without_receiver() {
        let (db, [ann, ..], _) = fixture();
        let result = db.conn().execute(
            "INSERT INTO messages (sender_id, content, created_at) VALUES (?1, 'x', 'now')",
            params![ann.0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_refuses_unknown_sender_or_receiver() {
        let (db, [ann, ..], group) = fixture();

        let to_nobody = db.insert_message(&message(ann, MessageTarget::User(UserId(999)), "x"));
        assert!(to_nobody.is_err());
        let to_no_group =
            db.insert_message(&message(ann, MessageTarget::Group(GroupId(999)), "x"));
        assert!(to_no_group.is_err());
        let from_nobody = db.insert_message(&message(UserId(999), MessageTarget::Group(group), "x"));
        assert!(from_nobody.is_err());

        assert!(db.group_history(group, 10).unwrap().is_empty());
    }
}
