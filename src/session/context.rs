//! Session context
//!
//! Shared handles every WebSocket session needs, cloned into each spawned
//! connection task.

use std::sync::Arc;
use std::time::Duration;

use super::auth::SessionAuthenticator;
use super::handle::WsHandle;
use crate::dispatch::EventQueue;
use crate::registry::ConnectionRegistry;

/// Context passed to each session
pub struct SessionContext<A> {
    /// Registry the session's handle is published in
    pub registry: Arc<ConnectionRegistry<WsHandle>>,

    /// Queue validated client events are pushed onto
    pub queue: EventQueue,

    /// Checks the identity headers
    pub authenticator: Arc<A>,

    /// Capacity of the per-session outbound queue
    pub outbound_buffer: usize,

    /// Upper bound on the WebSocket upgrade
    pub handshake_timeout: Duration,
}

impl<A: SessionAuthenticator> SessionContext<A> {
    pub fn new(
        registry: Arc<ConnectionRegistry<WsHandle>>,
        queue: EventQueue,
        authenticator: Arc<A>,
    ) -> Self {
        Self {
            registry,
            queue,
            authenticator,
            outbound_buffer: 64,
            handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl<A> Clone for SessionContext<A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            queue: self.queue.clone(),
            authenticator: Arc::clone(&self.authenticator),
            outbound_buffer: self.outbound_buffer,
            handshake_timeout: self.handshake_timeout,
        }
    }
}
