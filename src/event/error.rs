//! Inbound frame validation errors

/// A client frame could not be turned into an event
///
/// Reported back to the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A required `key: value` line is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A line is not of the form `key: value`
    #[error("malformed line: {0}")]
    MalformedLine(String),

    /// The `event` line names no known event
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The event exists but only the server may emit it
    #[error("event not allowed from clients: {0}")]
    NotClientSendable(String),

    /// The `destination_type` line is outside guild/channel/dmchannel/user
    #[error("unknown destination type: {0}")]
    UnknownDestinationType(String),

    /// The `destination` line is not a numeric id
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The `data` line is not a JSON object
    #[error("invalid data: {0}")]
    InvalidData(String),
}
