//! Session authentication collaborator
//!
//! Deciding whether a token is valid belongs to the surrounding system; a
//! session only asks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::UserId;
use crate::secret::secret_matches;

/// Checks the credentials a client presents when connecting
pub trait SessionAuthenticator: Send + Sync + 'static {
    /// Whether `token` is the live session token of `user_id`
    fn authenticate(&self, user_id: UserId, token: &str) -> impl Future<Output = bool> + Send;
}

/// Token table held in memory
///
/// Stands in for the session-token store used by the login flow.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessions {
    tokens: Arc<RwLock<HashMap<UserId, String>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the session token for a user, replacing any previous one
    pub fn insert_token(&self, user_id: UserId, token: impl Into<String>) {
        self.tokens.write().insert(user_id, token.into());
    }

    pub fn revoke(&self, user_id: UserId) {
        self.tokens.write().remove(&user_id);
    }
}

impl SessionAuthenticator for InMemorySessions {
    async fn authenticate(&self, user_id: UserId, token: &str) -> bool {
        match self.tokens.read().get(&user_id) {
            Some(expected) => secret_matches(token, expected),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authenticate() {
        let sessions = InMemorySessions::new();
        sessions.insert_token(1, "token-1");

        assert!(sessions.authenticate(1, "token-1").await);
        assert!(!sessions.authenticate(1, "token-2").await);
        assert!(!sessions.authenticate(2, "token-1").await);

        sessions.revoke(1);
        assert!(!sessions.authenticate(1, "token-1").await);
    }
}
