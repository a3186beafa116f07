//! WebSocket client sessions
//!
//! A client connects with `Author` (its user id) and `Authorization` (its
//! session token) headers. Once authenticated the session is registered in
//! the connection registry and the client may push events as text frames:
//!
//! ```text
//!  client                       session                      node
//!    │── upgrade + headers ───────►│                             │
//!    │◄──────────── recognized ────│── register ────────────────►│ registry
//!    │── event frame ─────────────►│── register_event ──────────►│ queue
//!    │◄──────────────────── done ──│                             │
//!    │◄──────────── event frame ───│◄── dispatched fanout ───────│
//! ```

pub mod auth;
pub mod connection;
pub mod context;
pub mod handle;
pub mod state;

pub use auth::{InMemorySessions, SessionAuthenticator};
pub use connection::{
    Connection, AUTHOR_HEADER, AUTHORIZATION_HEADER, AUTHOR_MISMATCH, AUTH_ERROR, DONE,
    INVALID_EVENT, MISSING_HEADERS, RECOGNIZED,
};
pub use context::SessionContext;
pub use handle::{Outbound, WsHandle};
pub use state::{SessionPhase, SessionState};
