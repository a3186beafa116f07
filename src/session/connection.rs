//! Per-connection WebSocket handler
//!
//! Owns the read half of the socket. Everything written to the client goes
//! through the session's [`WsHandle`], drained by a dedicated writer task, so
//! protocol replies and dispatched events reach the client in the order they
//! were queued.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::auth::SessionAuthenticator;
use super::context::SessionContext;
use super::handle::{Outbound, WsHandle};
use super::state::SessionState;
use crate::error::Result;
use crate::event::{parse_frame, Event, EventKind, UserId};

/// Sent once the session is registered
pub const RECOGNIZED: &str = "recognized";
/// Sent after every processed frame
pub const DONE: &str = "done";
pub const MISSING_HEADERS: &str = "error: missing headers";
pub const AUTH_ERROR: &str = "error: authentication error";
pub const INVALID_EVENT: &str = "error: invalid event";
pub const AUTHOR_MISMATCH: &str = "error: author ID not the same as given ID in headers";

/// Header carrying the connecting user's id
pub const AUTHOR_HEADER: &str = "author";
/// Header carrying the session token
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Bound on flushing the outbound queue at teardown
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Identity headers presented during the upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    author: String,
    token: String,
}

impl Credentials {
    /// `None` when either header is absent or not valid UTF-8
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let author = headers.get(AUTHOR_HEADER)?.to_str().ok()?;
        let token = headers.get(AUTHORIZATION_HEADER)?.to_str().ok()?;
        Some(Self {
            author: author.trim().to_string(),
            token: token.to_string(),
        })
    }
}

/// What to do after handling one client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Continue,
    Close,
}

/// A single client connection
pub struct Connection<A> {
    state: SessionState,
    ctx: SessionContext<A>,
    shutdown: CancellationToken,
}

impl<A: SessionAuthenticator> Connection<A> {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        ctx: SessionContext<A>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: SessionState::new(session_id, peer_addr),
            ctx,
            shutdown,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the connection until the client leaves, misbehaves, or the node
    /// shuts down
    ///
    /// The registry entry is removed on every exit path once the session was
    /// registered.
    pub async fn run<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (ws, credentials) = self.handshake(stream).await?;
        self.state.complete_handshake();

        let (sink, mut source) = ws.split();
        let (handle, rx) = WsHandle::new(self.ctx.outbound_buffer);
        let writer = tokio::spawn(write_loop(sink, rx, self.state.id));

        let result = self.serve(credentials, &handle, &mut source).await;

        self.state.close();
        if let (Some(user_id), Some(id)) = (self.state.user_id, self.state.connection_id) {
            self.ctx.registry.unregister_connection(user_id, id).await;
        }

        // Our clone in the registry is gone; this one is the last we own.
        let teardown = async move {
            handle.close().await;
            drop(handle);
            writer.await
        };
        if tokio::time::timeout(CLOSE_GRACE, teardown).await.is_err() {
            tracing::debug!(session_id = self.state.id, "Writer did not finish in time");
        }

        self.state.finish();
        tracing::debug!(
            session_id = self.state.id,
            user_id = ?self.state.user_id,
            frames = self.state.frames_received,
            enqueued = self.state.events_enqueued,
            duration_ms = self.state.duration().as_millis() as u64,
            "Session ended"
        );
        result
    }

    async fn handshake<S>(&self, stream: S) -> Result<(WebSocketStream<S>, Option<Credentials>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut credentials = None;
        let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            credentials = Credentials::from_headers(request.headers());
            Ok(response)
        };

        let ws = tokio::time::timeout(self.ctx.handshake_timeout, accept_hdr_async(stream, callback))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "WebSocket handshake timed out"))??;

        Ok((ws, credentials))
    }

    async fn serve<St>(
        &mut self,
        credentials: Option<Credentials>,
        handle: &WsHandle,
        source: &mut St,
    ) -> Result<()>
    where
        St: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        let Some(user_id) = self.authenticate(credentials, handle).await? else {
            return Ok(());
        };

        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(()),
                message = source.next() => message,
            };

            let message = match message {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            };

            match message {
                Message::Text(text) => {
                    if self.on_text(user_id, &text, handle).await? == FrameOutcome::Close {
                        return Ok(());
                    }
                }
                Message::Binary(_) => self.on_binary(handle).await?,
                Message::Close(_) => {
                    tracing::debug!(session_id = self.state.id, "Client closed");
                    return Ok(());
                }
                // Pings are answered by tungstenite
                _ => {}
            }
        }
    }

    /// Check the identity headers and register the session
    ///
    /// Returns `None` after telling the client why it was refused.
    async fn authenticate(
        &mut self,
        credentials: Option<Credentials>,
        handle: &WsHandle,
    ) -> Result<Option<UserId>> {
        let Some(credentials) = credentials else {
            tracing::debug!(session_id = self.state.id, "Missing identity headers");
            handle.reply(MISSING_HEADERS).await?;
            return Ok(None);
        };

        let authenticated = match credentials.author.parse::<UserId>() {
            Ok(user_id) => self
                .ctx
                .authenticator
                .authenticate(user_id, &credentials.token)
                .await
                .then_some(user_id),
            Err(_) => None,
        };
        let Some(user_id) = authenticated else {
            tracing::debug!(
                session_id = self.state.id,
                author = %credentials.author,
                "Authentication failed"
            );
            handle.reply(AUTH_ERROR).await?;
            return Ok(None);
        };

        // Queued before the handle is published, so no event frame can
        // overtake it.
        handle.reply(RECOGNIZED).await?;
        let connection_id = self.ctx.registry.register(user_id, handle.clone()).await;
        self.state.activate(user_id, connection_id);

        tracing::info!(
            session_id = self.state.id,
            user_id = user_id,
            peer = %self.state.peer_addr,
            "User connected"
        );
        Ok(Some(user_id))
    }

    /// Frames are text; binary payloads are answered as invalid events
    async fn on_binary(&mut self, handle: &WsHandle) -> Result<()> {
        self.state.on_frame();
        self.state.on_rejected();
        tracing::debug!(session_id = self.state.id, "Binary frame rejected");

        handle.reply(INVALID_EVENT).await?;
        handle.reply(DONE).await?;
        Ok(())
    }

    async fn on_text(&mut self, user_id: UserId, text: &str, handle: &WsHandle) -> Result<FrameOutcome> {
        self.state.on_frame();

        match parse_frame(text, user_id) {
            Ok(event) if !author_matches(&event, user_id) => {
                tracing::warn!(session_id = self.state.id, user_id = user_id, "Author mismatch");
                self.state.on_rejected();
                handle.reply(AUTHOR_MISMATCH).await?;
                return Ok(FrameOutcome::Close);
            }
            Ok(event) => {
                self.ctx.queue.register_event(event).await?;
                self.state.on_enqueued();
            }
            Err(e) => {
                tracing::debug!(session_id = self.state.id, error = %e, "Invalid event");
                self.state.on_rejected();
                handle.reply(INVALID_EVENT).await?;
            }
        }

        handle.reply(DONE).await?;
        Ok(FrameOutcome::Continue)
    }
}

/// Whether a `new_message` names the authenticated user as its author
///
/// Events without an `author` field are attributed to the connection.
fn author_matches(event: &Event, user_id: UserId) -> bool {
    if event.kind() != EventKind::NewMessage {
        return true;
    }
    match event.payload().get("author") {
        None => true,
        Some(Value::Number(n)) => n.as_u64() == Some(user_id),
        Some(Value::String(s)) => s.trim().parse::<UserId>().ok() == Some(user_id),
        Some(_) => false,
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<Outbound>, session_id: u64)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        let message = match outbound {
            Outbound::Frame(frame) => Message::text(frame.as_str()),
            Outbound::Reply(text) => Message::text(text),
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(session_id = session_id, error = %e, "WebSocket write error");
            break;
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Destination;
    use serde_json::json;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    #[test]
    fn test_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(Credentials::from_headers(&headers), None);

        headers.insert(AUTHOR_HEADER, HeaderValue::from_static(" 42 "));
        assert_eq!(Credentials::from_headers(&headers), None);

        headers.insert(AUTHORIZATION_HEADER, HeaderValue::from_static("tok"));
        assert_eq!(
            Credentials::from_headers(&headers),
            Some(Credentials {
                author: "42".into(),
                token: "tok".into()
            })
        );
    }

    fn message(data: Value) -> Event {
        Event::new(EventKind::NewMessage, 1, Destination::Channel(5)).with_data(data)
    }

    #[test]
    fn test_author_matches() {
        assert!(author_matches(&message(json!({"content": "hi"})), 1));
        assert!(author_matches(&message(json!({"author": 1})), 1));
        assert!(author_matches(&message(json!({"author": "1"})), 1));

        assert!(!author_matches(&message(json!({"author": 2})), 1));
        assert!(!author_matches(&message(json!({"author": "someone"})), 1));
        assert!(!author_matches(&message(json!({"author": null})), 1));
    }

    #[test]
    fn test_author_only_checked_on_new_message() {
        let edit = Event::new(EventKind::EditMessage, 1, Destination::Channel(5))
            .with_data(json!({"author": 2}));
        assert!(author_matches(&edit, 1));
    }
}
