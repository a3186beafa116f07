//! Session state machine
//!
//! Tracks a WebSocket session from TCP accept to disconnection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::event::UserId;
use crate::registry::ConnectionId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP accepted, WebSocket upgrade in progress
    Handshaking,
    /// Upgrade done, checking the identity headers
    Authenticating,
    /// Registered and exchanging frames
    Active,
    /// Session is closing
    Closing,
    /// Session closed
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Authenticated user, once known
    pub user_id: Option<UserId>,

    /// Registry connection, while registered
    pub connection_id: Option<ConnectionId>,

    /// Text frames read from the client
    pub frames_received: u64,

    /// Frames accepted onto the dispatch queue
    pub events_enqueued: u64,

    /// Frames rejected by validation
    pub frames_rejected: u64,
}

impl SessionState {
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Handshaking,
            connected_at: Instant::now(),
            user_id: None,
            connection_id: None,
            frames_received: 0,
            events_enqueued: 0,
            frames_rejected: 0,
        }
    }

    /// Upgrade finished
    pub fn complete_handshake(&mut self) {
        if self.phase == SessionPhase::Handshaking {
            self.phase = SessionPhase::Authenticating;
        }
    }

    /// User authenticated and registered
    pub fn activate(&mut self, user_id: UserId, connection_id: ConnectionId) {
        if self.phase == SessionPhase::Authenticating {
            self.user_id = Some(user_id);
            self.connection_id = Some(connection_id);
            self.phase = SessionPhase::Active;
        }
    }

    pub fn on_frame(&mut self) {
        self.frames_received += 1;
    }

    pub fn on_enqueued(&mut self) {
        self.events_enqueued += 1;
    }

    pub fn on_rejected(&mut self) {
        self.frames_rejected += 1;
    }

    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Start closing the session
    pub fn close(&mut self) {
        if self.phase != SessionPhase::Closed {
            self.phase = SessionPhase::Closing;
        }
    }

    /// Session fully torn down
    pub fn finish(&mut self) {
        self.connection_id = None;
        self.phase = SessionPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn state() -> SessionState {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        SessionState::new(1, addr)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = state();
        assert_eq!(state.phase, SessionPhase::Handshaking);

        state.complete_handshake();
        assert_eq!(state.phase, SessionPhase::Authenticating);

        state.activate(7, ConnectionId(3));
        assert!(state.is_active());
        assert_eq!(state.user_id, Some(7));
        assert_eq!(state.connection_id, Some(ConnectionId(3)));

        state.on_frame();
        state.on_enqueued();
        state.on_frame();
        state.on_rejected();
        assert_eq!(state.frames_received, 2);
        assert_eq!(state.events_enqueued, 1);
        assert_eq!(state.frames_rejected, 1);

        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        state.finish();
        assert_eq!(state.phase, SessionPhase::Closed);
        assert_eq!(state.connection_id, None);
    }

    #[test]
    fn test_activate_requires_authenticating() {
        let mut state = state();

        state.activate(7, ConnectionId(1));
        assert_eq!(state.phase, SessionPhase::Handshaking);
        assert_eq!(state.user_id, None);
    }

    #[test]
    fn test_close_after_closed_stays_closed() {
        let mut state = state();
        state.finish();
        state.close();
        assert_eq!(state.phase, SessionPhase::Closed);
    }
}
