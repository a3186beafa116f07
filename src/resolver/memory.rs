//! In-process membership store
//!
//! Keeps guild and channel membership in memory. Used by the demo node and by
//! tests; a production node plugs in its database instead.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{MembershipError, MembershipStore};
use crate::event::{DestinationType, UserId};

type Memberships = HashMap<(DestinationType, u64), BTreeSet<UserId>>;

/// Cloneable in-memory membership table
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembership {
    members: Arc<RwLock<Memberships>>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_guild_member(&self, guild_id: u64, user_id: UserId) {
        self.add(DestinationType::Guild, guild_id, user_id);
    }

    pub fn add_channel_participant(&self, channel_id: u64, user_id: UserId) {
        self.add(DestinationType::Channel, channel_id, user_id);
    }

    pub fn add_dm_participant(&self, dm_channel_id: u64, user_id: UserId) {
        self.add(DestinationType::DmChannel, dm_channel_id, user_id);
    }

    /// Remove a user from a guild, channel or DM channel
    pub fn remove_member(&self, kind: DestinationType, parent_id: u64, user_id: UserId) {
        let mut members = self.members.write();
        if let Some(set) = members.get_mut(&(kind, parent_id)) {
            set.remove(&user_id);
            if set.is_empty() {
                members.remove(&(kind, parent_id));
            }
        }
    }

    fn add(&self, kind: DestinationType, parent_id: u64, user_id: UserId) {
        self.members
            .write()
            .entry((kind, parent_id))
            .or_default()
            .insert(user_id);
    }

    fn lookup(&self, kind: DestinationType, parent_id: u64) -> Vec<UserId> {
        self.members
            .read()
            .get(&(kind, parent_id))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl MembershipStore for InMemoryMembership {
    async fn guild_members(&self, guild_id: u64) -> Result<Vec<UserId>, MembershipError> {
        Ok(self.lookup(DestinationType::Guild, guild_id))
    }

    async fn channel_participants(&self, channel_id: u64) -> Result<Vec<UserId>, MembershipError> {
        Ok(self.lookup(DestinationType::Channel, channel_id))
    }

    async fn dm_channel_participants(
        &self,
        dm_channel_id: u64,
    ) -> Result<Vec<UserId>, MembershipError> {
        Ok(self.lookup(DestinationType::DmChannel, dm_channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_member() {
        let store = InMemoryMembership::new();
        store.add_guild_member(1, 5);
        store.add_guild_member(1, 6);

        store.remove_member(DestinationType::Guild, 1, 5);
        assert_eq!(store.guild_members(1).await.unwrap(), vec![6]);

        store.remove_member(DestinationType::Guild, 1, 6);
        assert!(store.guild_members(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let store = InMemoryMembership::new();
        store.add_guild_member(1, 5);

        assert!(store.channel_participants(1).await.unwrap().is_empty());
        assert!(store.dm_channel_participants(1).await.unwrap().is_empty());
    }
}
