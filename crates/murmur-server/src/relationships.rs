//! Friend requests and friendships.
//!
//! A request is a `friend_request` notification plus a pending
//! `requester -> target` edge.  Accepting it leaves two accepted edges, one
//! per direction; rejecting it drops the pending edge and never creates the
//! reverse one.  Each operation runs in a single store transaction.

use tracing::info;

use murmur_shared::{
    FriendGroupId, NotificationId, NotificationKind, RequestStatus, Transition, UserId,
};
use murmur_store::{Database, Friend, FriendGroup, Notification};

use crate::error::ServerError;
use crate::store::Store;

#[derive(Clone)]
pub struct RelationshipService {
    store: Store,
}

impl RelationshipService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Ask `target` to become `requester`'s friend, filed under
    /// `requester`'s folder `group_id`.
    pub fn request_friend(
        &self,
        requester: UserId,
        target: UserId,
        group_id: FriendGroupId,
        remark: &str,
    ) -> Result<Notification, ServerError> {
        if requester == target {
            return Err(ServerError::InvalidState(
                "cannot send a friend request to yourself".into(),
            ));
        }

        let notification = self.store.transaction(|db| -> Result<Notification, ServerError> {
            if !db.user_exists(target)? {
                return Err(ServerError::NotFound(format!("user {target} does not exist")));
            }
            owned_friend_group(db, requester, group_id)?;

            match db.find_friendship(requester, target)? {
                Some(edge) if edge.status == RequestStatus::Accepted => {
                    return Err(ServerError::InvalidState(format!(
                        "user {target} is already a friend"
                    )));
                }
                Some(edge) if edge.status == RequestStatus::Pending => {
                    return Err(ServerError::InvalidState(format!(
                        "a friend request to user {target} is already pending"
                    )));
                }
                // Leftover of an older attempt.
                Some(_) => {
                    db.delete_friendship(requester, target)?;
                }
                None => {}
            }

            db.insert_friendship(
                requester,
                target,
                RequestStatus::Pending,
                Some(group_id),
                remark,
            )?;
            Ok(db.insert_notification(
                requester,
                target,
                NotificationKind::FriendRequest,
                remark,
            )?)
        })?;

        info!(
            requester = %requester,
            target = %target,
            notification = %notification.id,
            "Friend request sent"
        );
        Ok(notification)
    }

    /// Accept a pending request as its receiver.  The reverse edge goes into
    /// `group_id`, or the receiver's default folder when none is given.
    pub fn accept(
        &self,
        actor: UserId,
        notification_id: NotificationId,
        group_id: Option<FriendGroupId>,
    ) -> Result<Transition, ServerError> {
        let transition = self.store.transaction(|db| -> Result<Transition, ServerError> {
            let notification = request_for_receiver(db, actor, notification_id)?;

            let transition = notification.status.accept()?;
            if transition == Transition::Unchanged {
                return Ok(transition);
            }

            let requester = notification.sender_id;
            let folder = match group_id {
                Some(id) => owned_friend_group(db, actor, id)?,
                None => db.default_friend_group(actor)?,
            };
            let requester_name = db.get_user(requester)?.username;

            db.update_notification_outcome(notification.id, RequestStatus::Accepted)?;
            db.upsert_accepted_friendship(actor, requester, Some(folder.id), &requester_name)?;
            if !db.set_friendship_status(requester, actor, RequestStatus::Accepted)? {
                // The requester's edge went missing (e.g. an unfriend raced
                // the accept); recreate it so the pair stays symmetric.
                let folder = db.default_friend_group(requester)?;
                let name = db.get_user(actor)?.username;
                db.upsert_accepted_friendship(requester, actor, Some(folder.id), &name)?;
            }
            Ok(transition)
        })?;

        if transition != Transition::Unchanged {
            info!(user = %actor, notification = %notification_id, "Friend request accepted");
        }
        Ok(transition)
    }

    /// Reject a pending request as its receiver.
    pub fn reject(
        &self,
        actor: UserId,
        notification_id: NotificationId,
    ) -> Result<Transition, ServerError> {
        let transition = self.store.transaction(|db| -> Result<Transition, ServerError> {
            let notification = request_for_receiver(db, actor, notification_id)?;

            let transition = notification.status.reject()?;
            if transition == Transition::Unchanged {
                return Ok(transition);
            }

            db.update_notification_outcome(notification.id, RequestStatus::Rejected)?;
            // Only a pending edge is dropped; an accepted one belongs to an
            // earlier, completed request.
            if db.has_pending_friendship(notification.sender_id, actor)? {
                db.delete_friendship(notification.sender_id, actor)?;
            }
            Ok(transition)
        })?;

        if transition != Transition::Unchanged {
            info!(user = %actor, notification = %notification_id, "Friend request rejected");
        }
        Ok(transition)
    }

    /// Remove both directions of a friendship.  Missing edges are fine.
    /// Returns `true` if anything was removed.
    pub fn unfriend(&self, user: UserId, friend: UserId) -> Result<bool, ServerError> {
        let removed = self.store.transaction(|db| -> Result<bool, ServerError> {
            let forward = db.delete_friendship(user, friend)?;
            let reverse = db.delete_friendship(friend, user)?;
            Ok(forward || reverse)
        })?;

        if removed {
            info!(user = %user, friend = %friend, "Friendship removed");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Queries and folder management
    // ------------------------------------------------------------------

    pub fn friends(&self, user: UserId) -> Result<Vec<Friend>, ServerError> {
        self.store.call(|db| Ok(db.list_friends(user)?))
    }

    pub fn received_notifications(
        &self,
        user: UserId,
        kind: Option<NotificationKind>,
    ) -> Result<Vec<Notification>, ServerError> {
        self.store
            .call(|db| Ok(db.list_received_notifications(user, kind)?))
    }

    pub fn sent_notifications(&self, user: UserId) -> Result<Vec<Notification>, ServerError> {
        self.store.call(|db| Ok(db.list_sent_notifications(user)?))
    }

    pub fn move_friend(
        &self,
        user: UserId,
        friend: UserId,
        group_id: FriendGroupId,
        remark: Option<&str>,
    ) -> Result<(), ServerError> {
        self.store.transaction(|db| {
            owned_friend_group(db, user, group_id)?;
            match db.find_friendship(user, friend)? {
                Some(edge) if edge.status == RequestStatus::Accepted => {
                    db.move_friend(user, friend, group_id, remark)?;
                    Ok(())
                }
                _ => Err(ServerError::NotFound(format!(
                    "user {friend} is not a friend"
                ))),
            }
        })
    }

    pub fn friend_groups(&self, user: UserId) -> Result<Vec<FriendGroup>, ServerError> {
        self.store.call(|db| Ok(db.list_friend_groups(user)?))
    }

    pub fn create_friend_group(&self, user: UserId, name: &str) -> Result<FriendGroup, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::BadRequest("group name must not be empty".into()));
        }
        self.store
            .call(|db| Ok(db.create_friend_group(user, name)?))
    }
}

/// A friend folder that exists and belongs to `owner`.
fn owned_friend_group(
    db: &Database,
    owner: UserId,
    group_id: FriendGroupId,
) -> Result<FriendGroup, ServerError> {
    match db.get_friend_group(group_id) {
        Ok(group) if group.user_id == owner => Ok(group),
        Ok(_) | Err(murmur_store::StoreError::NotFound) => Err(ServerError::NotFound(format!(
            "friend group {group_id} does not exist"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// The friend request notification `id`, which must be addressed to `actor`.
fn request_for_receiver(
    db: &Database,
    actor: UserId,
    id: NotificationId,
) -> Result<Notification, ServerError> {
    let notification = db.get_notification(id).map_err(|e| match e {
        murmur_store::StoreError::NotFound => {
            ServerError::NotFound(format!("notification {id} does not exist"))
        }
        other => other.into(),
    })?;

    if notification.receiver_id != actor {
        return Err(ServerError::Unauthorized(format!(
            "notification {id} is not addressed to user {actor}"
        )));
    }
    if notification.kind != NotificationKind::FriendRequest {
        return Err(ServerError::InvalidState(format!(
            "notification {id} is not a friend request"
        )));
    }
    Ok(notification)
}
