//! Chat message routing.
//!
//! Each inbound chat frame is checked against the sender's authenticated
//! identity, appended to the message log, and pushed to every recipient that
//! is online right now.  Delivery is best-effort: offline recipients are
//! skipped, full queues drop the frame and dead connections are evicted.
//! Nothing is retried or queued for later.

use tracing::{debug, warn};

use murmur_shared::{ChatEvent, ChatTarget, GroupId, UserId};
use murmur_store::{Message, MessageTarget, NewMessage, StoreError};

use crate::error::ServerError;
use crate::registry::{ConnectionRegistry, Push};
use crate::store::Store;

/// The storage the router needs.  Production uses [`Store`]; tests plug in
/// failing implementations.
pub trait MessageStore: Send + Sync {
    fn append_message(&self, message: &NewMessage) -> Result<Message, ServerError>;

    fn user_exists(&self, user_id: UserId) -> Result<bool, ServerError>;

    /// Current members of a group, read fresh on every call.  `NotFound`
    /// when the group does not exist.
    fn group_member_ids(&self, group_id: GroupId) -> Result<Vec<UserId>, ServerError>;
}

impl MessageStore for Store {
    fn append_message(&self, message: &NewMessage) -> Result<Message, ServerError> {
        self.call(|db| Ok(db.insert_message(message)?))
    }

    fn user_exists(&self, user_id: UserId) -> Result<bool, ServerError> {
        self.call(|db| Ok(db.user_exists(user_id)?))
    }

    fn group_member_ids(&self, group_id: GroupId) -> Result<Vec<UserId>, ServerError> {
        self.call(|db| {
            db.get_group(group_id).map_err(|e| match e {
                StoreError::NotFound => {
                    ServerError::NotFound(format!("group {group_id} does not exist"))
                }
                other => other.into(),
            })?;
            Ok(db.group_member_ids(group_id)?)
        })
    }
}

/// What happened to one routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Recipients whose queue accepted the frame.
    pub delivered: Vec<UserId>,
    /// Whether the message log write succeeded.
    pub persisted: bool,
}

pub struct MessageRouter<S> {
    store: S,
    registry: ConnectionRegistry,
}

impl<S: MessageStore> MessageRouter<S> {
    pub fn new(store: S, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Decode a raw text frame from `origin`'s connection and route it.
    pub async fn route_frame(&self, origin: UserId, text: &str) -> Result<RouteOutcome, ServerError> {
        let event = ChatEvent::decode(text).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        self.route(origin, &event, text).await
    }

    /// Route a decoded event.  `frame` is the text pushed to recipients.
    pub async fn route(
        &self,
        origin: UserId,
        event: &ChatEvent,
        frame: &str,
    ) -> Result<RouteOutcome, ServerError> {
        if event.sender_id != origin {
            return Err(ServerError::Unauthorized(format!(
                "connection of user {origin} cannot send as user {}",
                event.sender_id
            )));
        }

        let recipients = match event.target {
            ChatTarget::Private(receiver) => {
                if !self.store.user_exists(receiver)? {
                    return Err(ServerError::NotFound(format!(
                        "user {receiver} does not exist"
                    )));
                }
                vec![receiver]
            }
            ChatTarget::Group(group) => {
                let members = self.store.group_member_ids(group)?;
                if !members.contains(&origin) {
                    return Err(ServerError::Unauthorized(format!(
                        "user {origin} is not a member of group {group}"
                    )));
                }
                members.into_iter().filter(|member| *member != origin).collect()
            }
        };

        let persisted = match self.store.append_message(&to_new_message(event)) {
            Ok(message) => {
                debug!(message = %message.id, sender = %origin, "Message stored");
                true
            }
            Err(e) => {
                warn!(sender = %origin, error = %e, "Failed to store message, delivering anyway");
                false
            }
        };

        let delivered = self.deliver(&recipients, frame).await;

        debug!(
            sender = %origin,
            kind = event.target.message_type().as_str(),
            recipients = recipients.len(),
            delivered = delivered.len(),
            "Routed chat event"
        );

        Ok(RouteOutcome {
            delivered,
            persisted,
        })
    }

    async fn deliver(&self, recipients: &[UserId], frame: &str) -> Vec<UserId> {
        let mut delivered = Vec::with_capacity(recipients.len());

        // The registry lock is released before any push.
        for (user, handle) in self.registry.lookup_many(recipients).await {
            match handle.push(frame.to_string()) {
                Push::Queued => delivered.push(user),
                Push::Full => {
                    debug!(
                        target_user = %user,
                        connection = handle.id(),
                        "Dropping frame for slow connection"
                    );
                }
                Push::Closed => {
                    debug!(
                        target_user = %user,
                        connection = handle.id(),
                        "Evicting closed connection"
                    );
                    self.registry.unregister(user, &handle).await;
                }
            }
        }

        delivered
    }
}

fn to_new_message(event: &ChatEvent) -> NewMessage {
    let target = match event.target {
        ChatTarget::Private(user) => MessageTarget::User(user),
        ChatTarget::Group(group) => MessageTarget::Group(group),
    };
    NewMessage {
        sender_id: event.sender_id,
        target,
        content: event.content.clone(),
        client_id: event
            .id
            .as_ref()
            .and_then(|id| serde_json::to_string(id).ok()),
        created_at: event.created_at,
    }
}
