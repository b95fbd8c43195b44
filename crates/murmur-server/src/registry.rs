//! Live connection registry.
//!
//! Maps each online user to the outbound queue of their current WebSocket.
//! Every connection has exactly one writer task draining its queue, so
//! frames pushed from many routing tasks never interleave on the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use murmur_shared::UserId;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Result of pushing one frame onto a connection's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// The queue is full; the frame was dropped.
    Full,
    /// The writer task is gone; the connection is dead.
    Closed,
}

/// Sending half of one live connection.  Clones refer to the same
/// connection and compare equal.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a frame without waiting.
    pub fn push(&self, frame: String) -> Push {
        match self.tx.try_send(frame) {
            Ok(()) => Push::Queued,
            Err(TrySendError::Full(_)) => Push::Full,
            Err(TrySendError::Closed(_)) => Push::Closed,
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user` to `handle`, replacing any earlier binding.  The replaced
    /// handle is returned but not closed.
    pub async fn register(&self, user: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let connection = handle.id;
        let mut connections = self.connections.write().await;
        let previous = connections.insert(user, handle);

        info!(
            user = %user,
            connection,
            replaced = previous.is_some(),
            online = connections.len(),
            "Connection registered"
        );

        previous
    }

    /// Remove `user`'s binding only if it is still `handle`.  A stale
    /// unregister from a superseded connection is a no-op.
    pub async fn unregister(&self, user: UserId, handle: &ConnectionHandle) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(&user) {
            Some(current) if current == handle => {
                connections.remove(&user);
                info!(
                    user = %user,
                    connection = handle.id,
                    online = connections.len(),
                    "Connection unregistered"
                );
                true
            }
            _ => {
                debug!(
                    user = %user,
                    connection = handle.id,
                    "Ignoring unregister for superseded connection"
                );
                false
            }
        }
    }

    pub async fn lookup(&self, user: UserId) -> Option<ConnectionHandle> {
        self.connections.read().await.get(&user).cloned()
    }

    /// Handles for every user in `users` that is online; offline users are
    /// skipped.
    pub async fn lookup_many(&self, users: &[UserId]) -> Vec<(UserId, ConnectionHandle)> {
        let connections = self.connections.read().await;
        users
            .iter()
            .filter_map(|user| connections.get(user).map(|handle| (*user, handle.clone())))
            .collect()
    }

    pub async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::new(4);

        assert!(registry.register(UserId(1), handle.clone()).await.is_none());
        assert_eq!(registry.lookup(UserId(1)).await, Some(handle));
        assert!(registry.lookup(UserId(2)).await.is_none());
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn test_newer_connection_survives_stale_unregister() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = ConnectionHandle::new(4);
        let (second, _rx2) = ConnectionHandle::new(4);

        registry.register(UserId(1), first.clone()).await;
        let replaced = registry.register(UserId(1), second.clone()).await;
        assert_eq!(replaced, Some(first.clone()));
        assert_eq!(registry.lookup(UserId(1)).await, Some(second.clone()));

        assert!(!registry.unregister(UserId(1), &first).await);
        assert_eq!(registry.lookup(UserId(1)).await, Some(second.clone()));

        assert!(registry.unregister(UserId(1), &second).await);
        assert!(registry.lookup(UserId(1)).await.is_none());
        assert!(!registry.unregister(UserId(1), &second).await);
    }

    #[tokio::test]
    async fn test_lookup_many_skips_offline() {
        let registry = ConnectionRegistry::new();
        let (two, _rx2) = ConnectionHandle::new(4);
        let (three, _rx3) = ConnectionHandle::new(4);
        registry.register(UserId(2), two.clone()).await;
        registry.register(UserId(3), three.clone()).await;

        let found = registry
            .lookup_many(&[UserId(1), UserId(2), UserId(3), UserId(4)])
            .await;
        assert_eq!(found, vec![(UserId(2), two), (UserId(3), three)]);
    }

    #[tokio::test]
    async fn test_push_reports_full_and_closed() {
        let (handle, rx) = ConnectionHandle::new(1);

        assert_eq!(handle.push("a".into()), Push::Queued);
        assert_eq!(handle.push("b".into()), Push::Full);

        drop(rx);
        assert_eq!(handle.push("c".into()), Push::Closed);
    }

    #[test]
    fn test_handles_are_unique() {
        let (a, _rx_a) = ConnectionHandle::new(1);
        let (b, _rx_b) = ConnectionHandle::new(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
    }
}
