//! WebSocket listener
//!
//! Handles the TCP accept loop and spawns a session per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::server::config::NodeConfig;
use crate::session::{Connection, SessionAuthenticator, SessionContext};

/// Accepts WebSocket clients for one node
pub struct SessionListener<A> {
    ctx: SessionContext<A>,
    tcp_nodelay: bool,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<A: SessionAuthenticator> SessionListener<A> {
    pub fn new(config: &NodeConfig, ctx: SessionContext<A>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            ctx,
            tcp_nodelay: config.tcp_nodelay,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Accept connections until cancelled
    ///
    /// Cancellation also reaches every spawned session, which unregisters and
    /// closes its socket.
    pub async fn run(&self, listener: TcpListener, shutdown: CancellationToken) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(addr = %addr, "WebSocket listener started"),
            Err(e) => tracing::warn!(error = %e, "WebSocket listener started on unknown address"),
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, &shutdown);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        tracing::info!("WebSocket listener stopped");
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, shutdown: &CancellationToken) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let mut connection = Connection::new(
            session_id,
            peer_addr,
            self.ctx.clone(),
            shutdown.child_token(),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
