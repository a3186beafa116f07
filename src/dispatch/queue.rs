//! Producer side of the event queue

use tokio::sync::mpsc;

use crate::event::Event;

/// The event queue refused an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher has stopped
    #[error("event dispatcher is closed")]
    Closed,

    /// The queue is at capacity (only from `try_register_event`)
    #[error("event queue is full")]
    Full,
}

/// Cloneable handle for enqueueing events
///
/// Request handlers call [`register_event`](Self::register_event) after the
/// backing row is committed; the inbound frame handler calls it after a
/// client frame validates.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
}

impl EventQueue {
    pub(super) fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Enqueue an event, waiting for room if the queue is full
    pub async fn register_event(&self, event: Event) -> Result<(), DispatchError> {
        self.tx.send(event).await.map_err(|_| DispatchError::Closed)
    }

    /// Enqueue an event without waiting
    pub fn try_register_event(&self, event: Event) -> Result<(), DispatchError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    /// Whether the dispatcher has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
