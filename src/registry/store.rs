//! Connection registry implementation
//!
//! Maps each online user to the single live handle they hold on this node.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::entry::{ConnectionEntry, ConnectionHandle, ConnectionId};
use crate::event::UserId;

/// Per-node registry of live connections
///
/// Mutations take the write lock and the fanout snapshot takes the read lock,
/// so the two never interleave. Handles are cloned out of the snapshot and
/// sent to with no lock held.
pub struct ConnectionRegistry<H> {
    /// Map of user id to their current connection
    connections: RwLock<HashMap<UserId, ConnectionEntry<H>>>,

    next_connection_id: AtomicU64,
}

impl<H: ConnectionHandle> ConnectionRegistry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Register a user's connection
    ///
    /// A previous handle for the same user is replaced silently; only one
    /// connection per user is tracked.
    pub async fn register(&self, user_id: UserId, handle: H) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let mut connections = self.connections.write().await;

        if let Some(previous) = connections.insert(user_id, ConnectionEntry::new(id, handle)) {
            tracing::debug!(
                user_id = user_id,
                replaced = %previous.id,
                connection = %id,
                "Connection replaced"
            );
        } else {
            tracing::debug!(user_id = user_id, connection = %id, "Connection registered");
        }

        id
    }

    /// Remove a user's connection
    ///
    /// Does nothing if the user is not registered; a disconnect may race with
    /// an earlier error-close of the same user.
    pub async fn unregister(&self, user_id: UserId) {
        let removed = self.connections.write().await.remove(&user_id);

        if let Some(entry) = removed {
            tracing::debug!(user_id = user_id, connection = %entry.id, "Connection unregistered");
        }
    }

    /// Remove a user's connection only if it is still the given registration
    ///
    /// Returns `true` if the entry was removed. A session that was replaced by
    /// a newer connection for the same user leaves the newer one in place.
    pub async fn unregister_connection(&self, user_id: UserId, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;

        match connections.get(&user_id) {
            Some(entry) if entry.id == id => {
                connections.remove(&user_id);
                tracing::debug!(user_id = user_id, connection = %id, "Connection unregistered");
                true
            }
            Some(entry) => {
                tracing::debug!(
                    user_id = user_id,
                    stale = %id,
                    current = %entry.id,
                    "Stale connection unregister ignored"
                );
                false
            }
            None => false,
        }
    }

    /// Snapshot the live handles for a set of candidate recipients
    ///
    /// Offline candidates are skipped and `exclude` (the sender) never
    /// receives its own event back.
    pub async fn resolve_live(
        &self,
        candidates: &HashSet<UserId>,
        exclude: UserId,
    ) -> Vec<(UserId, H)> {
        let connections = self.connections.read().await;

        candidates
            .iter()
            .filter(|&&user_id| user_id != exclude)
            .filter_map(|user_id| {
                connections
                    .get(user_id)
                    .map(|entry| (*user_id, entry.handle.clone()))
            })
            .collect()
    }

    /// Check whether a user currently holds a connection
    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    /// Current connection id for a user
    pub async fn connection_id(&self, user_id: UserId) -> Option<ConnectionId> {
        self.connections.read().await.get(&user_id).map(|e| e.id)
    }

    /// Ids of every online user
    pub async fn online_users(&self) -> Vec<UserId> {
        self.connections.read().await.keys().copied().collect()
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl<H: ConnectionHandle> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
