//! Chat events and their destinations
//!
//! An [`Event`] describes something that happened (a message was sent, a
//! friend request was answered), who caused it, and where it is headed. It is
//! built by a request handler after the backing row is committed, or by
//! [`parse_frame`] from a client's inbound frame, and is consumed exactly once
//! by the dispatcher.

pub mod error;
pub mod parse;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

pub use error::FrameError;
pub use parse::parse_frame;

/// Identifier of a user (and of the connection they hold on this node)
pub type UserId = u64;

/// Opaque key-value payload carried by an event
pub type Payload = Map<String, Value>;

/// Kind of chat event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewMessage,
    EditMessage,
    DeleteMessage,
    FriendRequest,
    FriendRequestReply,
    FriendRemove,
    UserEdit,
    /// A user was added to a DM channel (server-originated only)
    DmChannelAdd,
}

impl EventKind {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewMessage => "new_message",
            EventKind::EditMessage => "edit_message",
            EventKind::DeleteMessage => "delete_message",
            EventKind::FriendRequest => "friend_request",
            EventKind::FriendRequestReply => "friend_request_reply",
            EventKind::FriendRemove => "friend_remove",
            EventKind::UserEdit => "user_edit",
            EventKind::DmChannelAdd => "dmchannel_add",
        }
    }

    /// Whether a client may emit this kind over its live connection
    pub fn is_client_sendable(&self) -> bool {
        !matches!(self, EventKind::DmChannelAdd)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_message" => Ok(EventKind::NewMessage),
            "edit_message" => Ok(EventKind::EditMessage),
            "delete_message" => Ok(EventKind::DeleteMessage),
            "friend_request" => Ok(EventKind::FriendRequest),
            "friend_request_reply" => Ok(EventKind::FriendRequestReply),
            "friend_remove" => Ok(EventKind::FriendRemove),
            "user_edit" => Ok(EventKind::UserEdit),
            "dmchannel_add" => Ok(EventKind::DmChannelAdd),
            other => Err(FrameError::UnknownEvent(other.to_string())),
        }
    }
}

/// Discriminator selecting how a destination resolves into recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationType {
    Guild,
    Channel,
    DmChannel,
    User,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Guild => "guild",
            DestinationType::Channel => "channel",
            DestinationType::DmChannel => "dmchannel",
            DestinationType::User => "user",
        }
    }

    /// Pair the discriminator with an id
    pub fn with_id(self, id: u64) -> Destination {
        match self {
            DestinationType::Guild => Destination::Guild(id),
            DestinationType::Channel => Destination::Channel(id),
            DestinationType::DmChannel => Destination::DmChannel(id),
            DestinationType::User => Destination::User(id),
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "guild" => Ok(DestinationType::Guild),
            "channel" => Ok(DestinationType::Channel),
            "dmchannel" => Ok(DestinationType::DmChannel),
            "user" => Ok(DestinationType::User),
            other => Err(FrameError::UnknownDestinationType(other.to_string())),
        }
    }
}

/// Where an event is headed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Every member of a guild
    Guild(u64),
    /// Every participant of a guild channel
    Channel(u64),
    /// Every participant of a DM channel
    DmChannel(u64),
    /// A single user
    User(UserId),
}

impl Destination {
    /// Build a destination from its textual type, failing on unknown types
    pub fn parse(id: u64, destination_type: &str) -> Result<Self, FrameError> {
        Ok(destination_type.parse::<DestinationType>()?.with_id(id))
    }

    pub fn id(&self) -> u64 {
        match *self {
            Destination::Guild(id)
            | Destination::Channel(id)
            | Destination::DmChannel(id)
            | Destination::User(id) => id,
        }
    }

    pub fn destination_type(&self) -> DestinationType {
        match self {
            Destination::Guild(_) => DestinationType::Guild,
            Destination::Channel(_) => DestinationType::Channel,
            Destination::DmChannel(_) => DestinationType::DmChannel,
            Destination::User(_) => DestinationType::User,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.destination_type(), self.id())
    }
}

/// An immutable chat event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    source: UserId,
    destination: Destination,
    payload: Payload,
}

impl Event {
    /// Create an event with an empty payload
    pub fn new(kind: EventKind, source: UserId, destination: Destination) -> Self {
        Self {
            kind,
            source,
            destination,
            payload: Payload::new(),
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a payload from any JSON value; non-objects are wrapped under `"value"`
    pub fn with_data(self, data: Value) -> Self {
        let payload = match data {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                let mut map = Payload::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.with_payload(payload)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// User whose action produced the event
    pub fn source(&self) -> UserId {
        self.source
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            EventKind::NewMessage,
            EventKind::EditMessage,
            EventKind::DeleteMessage,
            EventKind::FriendRequest,
            EventKind::FriendRequestReply,
            EventKind::FriendRemove,
            EventKind::UserEdit,
            EventKind::DmChannelAdd,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "typing".parse::<EventKind>().unwrap_err();
        assert!(matches!(err, FrameError::UnknownEvent(k) if k == "typing"));
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse(7, "guild").unwrap(), Destination::Guild(7));
        assert_eq!(
            Destination::parse(7, " dmchannel ").unwrap(),
            Destination::DmChannel(7)
        );
        assert_eq!(Destination::parse(7, "user").unwrap(), Destination::User(7));

        let err = Destination::parse(7, "server").unwrap_err();
        assert!(matches!(err, FrameError::UnknownDestinationType(t) if t == "server"));
    }

    #[test]
    fn test_destination_accessors() {
        let dest = Destination::Channel(42);
        assert_eq!(dest.id(), 42);
        assert_eq!(dest.destination_type(), DestinationType::Channel);
        assert_eq!(dest.to_string(), "channel:42");
    }

    #[test]
    fn test_event_with_data() {
        let event = Event::new(EventKind::NewMessage, 5, Destination::User(10))
            .with_data(json!({"content": "hi"}));
        assert_eq!(event.payload().get("content"), Some(&json!("hi")));

        let wrapped = Event::new(EventKind::UserEdit, 5, Destination::User(10)).with_data(json!(3));
        assert_eq!(wrapped.payload().get("value"), Some(&json!(3)));

        let empty = Event::new(EventKind::UserEdit, 5, Destination::User(10)).with_data(Value::Null);
        assert!(empty.payload().is_empty());
    }

    #[test]
    fn test_server_only_kind() {
        assert!(EventKind::NewMessage.is_client_sendable());
        assert!(!EventKind::DmChannelAdd.is_client_sendable());
    }
}
