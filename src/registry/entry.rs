//! Connection handles and registry entries

use std::future::Future;

use tokio::sync::mpsc;

use super::error::DeliveryError;
use super::frame::EventFrame;

/// Registry-assigned identifier of one registration
///
/// Distinguishes a user's current connection from an earlier one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Live transport handle for one connected client
///
/// Implementations must be cheap to clone; the dispatcher clones handles out
/// of the registry before sending so no lock is held across I/O.
pub trait ConnectionHandle: Clone + Send + Sync + 'static {
    /// Push a frame to the client
    fn send(&self, frame: EventFrame) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Handle backed by a bounded channel
///
/// The receiving half belongs to whatever drives the client socket (or to a
/// test). A full channel makes `send` wait, which the dispatcher bounds with
/// its delivery timeout.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<EventFrame>,
}

impl ChannelHandle {
    /// Create a handle and the receiver for its frames
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ConnectionHandle for ChannelHandle {
    async fn send(&self, frame: EventFrame) -> Result<(), DeliveryError> {
        self.tx.send(frame).await.map_err(|_| DeliveryError::Closed)
    }
}

/// Entry for a single user in the registry
#[derive(Debug, Clone)]
pub struct ConnectionEntry<H> {
    /// Identifier of this registration
    pub id: ConnectionId,

    /// Transport handle
    pub handle: H,
}

impl<H> ConnectionEntry<H> {
    pub(super) fn new(id: ConnectionId, handle: H) -> Self {
        Self {
            id,
            handle,
        }
    }
}
