//! Inbound client frame parser
//!
//! Clients push events as newline-separated `key: value` lines:
//!
//! ```text
//! event: new_message
//! destination: 10
//! destination_type: user
//! data: {"content":"hi"}
//! ```
//!
//! `data` is optional and must be a JSON object when present. Unknown keys
//! are ignored. The event source is never taken from the frame; it is always
//! the user the connection authenticated as.

use serde_json::Value;

use super::error::FrameError;
use super::{Destination, Event, EventKind, Payload, UserId};

/// Parse a client frame into an event sourced from `source`
pub fn parse_frame(raw: &str, source: UserId) -> Result<Event, FrameError> {
    let mut kind = None;
    let mut destination = None;
    let mut destination_type = None;
    let mut data = None;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedLine(line.to_string()))?;

        match key.trim() {
            "event" => kind = Some(value.trim()),
            "destination" => destination = Some(value.trim()),
            "destination_type" => destination_type = Some(value.trim()),
            "data" => data = Some(value.trim()),
            _ => {}
        }
    }

    let kind: EventKind = kind.ok_or(FrameError::MissingField("event"))?.parse()?;
    if !kind.is_client_sendable() {
        return Err(FrameError::NotClientSendable(kind.to_string()));
    }

    let id = destination.ok_or(FrameError::MissingField("destination"))?;
    let id: u64 = id
        .parse()
        .map_err(|_| FrameError::InvalidDestination(id.to_string()))?;
    let destination = Destination::parse(
        id,
        destination_type.ok_or(FrameError::MissingField("destination_type"))?,
    )?;

    let payload = match data {
        None | Some("") => Payload::new(),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(FrameError::InvalidData(format!("expected object, got {other}"))),
            Err(e) => return Err(FrameError::InvalidData(e.to_string())),
        },
    };

    Ok(Event::new(kind, source, destination).with_payload(payload))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_full_frame() {
        let raw = "event: new_message\ndestination: 10\ndestination_type: user\ndata: {\"content\":\"hi\"}";
        let event = parse_frame(raw, 5).unwrap();

        assert_eq!(event.kind(), EventKind::NewMessage);
        assert_eq!(event.source(), 5);
        assert_eq!(event.destination(), Destination::User(10));
        assert_eq!(event.payload().get("content"), Some(&json!("hi")));
    }

    #[test]
    fn test_parse_without_data() {
        let raw = "event: delete_message\r\ndestination: 3\r\ndestination_type: guild\r\n";
        let event = parse_frame(raw, 1).unwrap();

        assert_eq!(event.destination(), Destination::Guild(3));
        assert!(event.payload().is_empty());
    }

    #[test]
    fn test_data_keeps_colons() {
        let raw = "event: edit_message\ndestination: 8\ndestination_type: dmchannel\ndata: {\"content\":\"at 10:30\"}";
        let event = parse_frame(raw, 1).unwrap();

        assert_eq!(event.payload().get("content"), Some(&json!("at 10:30")));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_frame("destination: 1\ndestination_type: user", 1).unwrap_err(),
            FrameError::MissingField("event")
        );
        assert_eq!(
            parse_frame("event: new_message\ndestination_type: user", 1).unwrap_err(),
            FrameError::MissingField("destination")
        );
        assert_eq!(
            parse_frame("event: new_message\ndestination: 1", 1).unwrap_err(),
            FrameError::MissingField("destination_type")
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let unknown_kind = "event: typing\ndestination: 1\ndestination_type: user";
        assert!(matches!(
            parse_frame(unknown_kind, 1),
            Err(FrameError::UnknownEvent(_))
        ));

        let server_only = "event: dmchannel_add\ndestination: 1\ndestination_type: dmchannel";
        assert!(matches!(
            parse_frame(server_only, 1),
            Err(FrameError::NotClientSendable(_))
        ));

        let bad_type = "event: new_message\ndestination: 1\ndestination_type: planet";
        assert!(matches!(
            parse_frame(bad_type, 1),
            Err(FrameError::UnknownDestinationType(_))
        ));

        let bad_id = "event: new_message\ndestination: abc\ndestination_type: user";
        assert!(matches!(
            parse_frame(bad_id, 1),
            Err(FrameError::InvalidDestination(_))
        ));

        let array_data = "event: new_message\ndestination: 1\ndestination_type: user\ndata: [1,2]";
        assert!(matches!(
            parse_frame(array_data, 1),
            Err(FrameError::InvalidData(_))
        ));

        let no_colon = "event new_message";
        assert!(matches!(
            parse_frame(no_colon, 1),
            Err(FrameError::MalformedLine(_))
        ));
    }
}
