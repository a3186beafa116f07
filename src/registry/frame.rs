//! Outbound event frames
//!
//! An event is serialized once per dispatch into an [`EventFrame`] and the
//! same frame is handed to every recipient.

use std::fmt;
use std::sync::Arc;

use crate::event::{Event, EventKind};

/// A serialized event ready to be pushed to connections
///
/// The text has two lines: `event: <kind>` and `data: <json payload>`.
/// Cheap to clone: recipients share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    /// Kind of the event this frame carries
    pub kind: EventKind,
    text: Arc<str>,
}

impl EventFrame {
    /// Serialize an event
    pub fn encode(event: &Event) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_string(event.payload())?;
        Ok(Self {
            kind: event.kind(),
            text: format!("event: {}\ndata: {}", event.kind(), data).into(),
        })
    }

    /// Frame text as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Shared handle to the frame text
    pub fn text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

impl fmt::Display for EventFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::Destination;

    #[test]
    fn test_encode_two_line_frame() {
        let event = Event::new(EventKind::NewMessage, 5, Destination::User(10))
            .with_data(json!({"content": "hi"}));
        let frame = EventFrame::encode(&event).unwrap();

        assert_eq!(frame.as_str(), "event: new_message\ndata: {\"content\":\"hi\"}");
        assert_eq!(frame.kind, EventKind::NewMessage);
    }

    #[test]
    fn test_empty_payload() {
        let event = Event::new(EventKind::FriendRemove, 1, Destination::User(2));
        let frame = EventFrame::encode(&event).unwrap();

        assert_eq!(frame.to_string(), "event: friend_remove\ndata: {}");
    }

    #[test]
    fn test_clone_shares_text() {
        let event = Event::new(EventKind::UserEdit, 1, Destination::Guild(2));
        let frame = EventFrame::encode(&event).unwrap();
        let copy = frame.clone();

        assert!(Arc::ptr_eq(&frame.text(), &copy.text()));
    }
}
