//! Outbound side of a WebSocket session

use tokio::sync::mpsc;

use crate::registry::{ConnectionHandle, DeliveryError, EventFrame};

/// Message queued for a session's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A dispatched event
    Frame(EventFrame),
    /// A protocol reply such as `recognized` or `done`
    Reply(String),
    /// Send a close frame and stop writing
    Close,
}

/// Registry handle for a WebSocket session
///
/// Event frames and session replies share one queue, so the client sees them
/// in the order they were produced.
#[derive(Debug, Clone)]
pub struct WsHandle {
    tx: mpsc::Sender<Outbound>,
}

impl WsHandle {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a protocol reply
    pub async fn reply(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.tx
            .send(Outbound::Reply(text.into()))
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Ask the writer to close the socket
    pub async fn close(&self) {
        let _ = self.tx.send(Outbound::Close).await;
    }
}

impl ConnectionHandle for WsHandle {
    async fn send(&self, frame: EventFrame) -> Result<(), DeliveryError> {
        self.tx
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}
