//! Destination resolution
//!
//! Turns an event's [`Destination`] into the set of user ids that are members
//! of it. Membership lives in the persistence layer; this module only reads it
//! through the [`MembershipStore`] trait.

pub mod memory;

use std::collections::HashSet;
use std::future::Future;

use crate::event::{Destination, UserId};

pub use memory::InMemoryMembership;

/// Membership lookup failed in the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("membership lookup failed: {0}")]
pub struct MembershipError(pub String);

/// Read access to guild and channel membership
pub trait MembershipStore: Send + Sync + 'static {
    /// Users with a membership row for the guild
    fn guild_members(
        &self,
        guild_id: u64,
    ) -> impl Future<Output = Result<Vec<UserId>, MembershipError>> + Send;

    /// Participants of a guild channel
    fn channel_participants(
        &self,
        channel_id: u64,
    ) -> impl Future<Output = Result<Vec<UserId>, MembershipError>> + Send;

    /// Participants of a DM channel
    fn dm_channel_participants(
        &self,
        dm_channel_id: u64,
    ) -> impl Future<Output = Result<Vec<UserId>, MembershipError>> + Send;
}

/// Resolves destinations into recipient user ids
pub struct DestinationResolver<M> {
    store: M,
}

impl<M: MembershipStore> DestinationResolver<M> {
    pub fn new(store: M) -> Self {
        Self { store }
    }

    /// Access the underlying membership store
    pub fn store(&self) -> &M {
        &self.store
    }

    /// Resolve a destination into the set of member user ids
    ///
    /// A `User` destination resolves to that single user without touching the
    /// store.
    pub async fn resolve(&self, destination: &Destination) -> Result<HashSet<UserId>, MembershipError> {
        let members = match *destination {
            Destination::Guild(id) => self.store.guild_members(id).await?,
            Destination::Channel(id) => self.store.channel_participants(id).await?,
            Destination::DmChannel(id) => self.store.dm_channel_participants(id).await?,
            Destination::User(id) => vec![id],
        };

        Ok(members.into_iter().collect())
    }
}
