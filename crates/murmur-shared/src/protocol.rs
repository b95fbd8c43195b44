use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_FRAME_BYTES;
use crate::error::ProtocolError;
use crate::types::{GroupId, UserId};

/// Client-chosen id echoed back to recipients so they can match the frame
/// against their local copy.  Older clients send numbers, newer ones strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Private,
    Group,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

/// Chat frame exactly as it travels over the socket (JSON, camelCase).
///
/// Only one of `receiver_id` / `group_id` is meaningful for a given
/// `message_type`; the other is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub avatar: String,
    pub content: String,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a chat event goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTarget {
    Private(UserId),
    Group(GroupId),
}

impl ChatTarget {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Private(_) => MessageType::Private,
            Self::Group(_) => MessageType::Group,
        }
    }
}

/// A validated inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub id: Option<CorrelationId>,
    pub sender_id: UserId,
    pub sender_name: String,
    pub avatar: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub target: ChatTarget,
}

impl ChatEvent {
    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::TooLarge {
                size: text.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        let frame: ChatFrame = serde_json::from_str(text)?;
        Self::try_from(frame)
    }
}

impl TryFrom<ChatFrame> for ChatEvent {
    type Error = ProtocolError;

    fn try_from(frame: ChatFrame) -> Result<Self, Self::Error> {
        // Zero is what clients send for "unset".
        let target = match frame.message_type {
            MessageType::Private => frame
                .receiver_id
                .filter(|id| id.0 > 0)
                .map(ChatTarget::Private)
                .ok_or(ProtocolError::MissingTarget {
                    message_type: "private",
                    field: "receiverId",
                })?,
            MessageType::Group => frame
                .group_id
                .filter(|id| id.0 > 0)
                .map(ChatTarget::Group)
                .ok_or(ProtocolError::MissingTarget {
                    message_type: "group",
                    field: "groupId",
                })?,
        };

        Ok(Self {
            id: frame.id,
            sender_id: frame.sender_id,
            sender_name: frame.sender_name,
            avatar: frame.avatar,
            content: frame.content,
            created_at: frame.created_at.unwrap_or_else(Utc::now),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_private_frame() {
        let event = ChatEvent::decode(
            r#"{"id":9,"senderId":1,"receiverId":2,"senderName":"ann","avatar":"","content":"hi","messageType":"private"}"#,
        )
        .unwrap();
        assert_eq!(event.sender_id, UserId(1));
        assert_eq!(event.target, ChatTarget::Private(UserId(2)));
        assert_eq!(event.id, Some(CorrelationId::Number(9)));
        assert_eq!(event.content, "hi");
    }

    #[test]
    fn test_group_frame_ignores_receiver_id() {
        let event = ChatEvent::decode(
            r#"{"id":"c-1","senderId":1,"receiverId":0,"groupId":5,"content":"yo","messageType":"group","createdAt":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.target, ChatTarget::Group(GroupId(5)));
        assert_eq!(event.id, Some(CorrelationId::Text("c-1".into())));
        assert_eq!(event.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let err = ChatEvent::decode(
            r#"{"senderId":1,"receiverId":0,"content":"x","messageType":"private"}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingTarget { field: "receiverId", .. }
        ));

        let err =
            ChatEvent::decode(r#"{"senderId":1,"content":"x","messageType":"group"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingTarget { field: "groupId", .. }));
    }

    #[test]
    fn test_unknown_message_type_is_malformed() {
        let err = ChatEvent::decode(
            r#"{"senderId":1,"receiverId":2,"content":"x","messageType":"broadcast"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(matches!(
            ChatEvent::decode("not json").unwrap_err(),
            ProtocolError::Malformed(_)
        ));
    }

    #[test]
    fn test_oversize_frame_is_rejected() {
        let text = "x".repeat(MAX_FRAME_BYTES + 1);
        assert!(matches!(
            ChatEvent::decode(&text).unwrap_err(),
            ProtocolError::TooLarge { .. }
        ));
    }
}
