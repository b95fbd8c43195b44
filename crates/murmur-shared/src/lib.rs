//! # murmur-shared
//!
//! Types shared by the store and the server: row-id newtypes, the chat
//! wire protocol, the friend request state machine and session tokens.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod relationship;
pub mod session;
pub mod types;

pub use error::{InvalidTransition, ProtocolError, SessionError};
pub use protocol::{ChatEvent, ChatFrame, ChatTarget, CorrelationId, MessageType};
pub use relationship::{RequestStatus, Transition};
pub use types::{FriendGroupId, GroupId, GroupRole, MessageId, NotificationId, NotificationKind, UserId};
