//! A complete chat node
//!
//! Wires the registry, dispatcher, directory, reaper and both listeners
//! together and supervises them until shutdown.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::directory::{DirectoryStore, NodeDirectory, NodeReaper, TcpProbe};
use crate::dispatch::{EventDispatcher, EventQueue};
use crate::error::Result;
use crate::http::{self, NodeApi};
use crate::registry::ConnectionRegistry;
use crate::resolver::{DestinationResolver, MembershipStore};
use crate::server::config::NodeConfig;
use crate::server::listener::SessionListener;
use crate::session::{SessionAuthenticator, SessionContext, WsHandle};
use crate::stats::DispatchStats;

/// One node process
pub struct ChatNode<M, S, A> {
    config: NodeConfig,
    registry: Arc<ConnectionRegistry<WsHandle>>,
    dispatcher: EventDispatcher<WsHandle, M>,
    queue: EventQueue,
    stats: Arc<DispatchStats>,
    directory: Arc<NodeDirectory<S>>,
    authenticator: Arc<A>,
}

impl<M, S, A> ChatNode<M, S, A>
where
    M: MembershipStore,
    S: DirectoryStore,
    A: SessionAuthenticator,
{
    /// Build a node from a validated config
    ///
    /// Fails when [`NodeConfig::validate`] rejects the config.
    pub fn new(config: NodeConfig, membership: M, store: S, authenticator: A) -> Result<Self> {
        config.validate()?;
        let directory = Arc::new(NodeDirectory::open(store, config.internal_secret.clone())?);

        let registry = Arc::new(ConnectionRegistry::new());
        let (dispatcher, queue) = EventDispatcher::new(
            Arc::clone(&registry),
            DestinationResolver::new(membership),
            config.dispatcher_config(),
        );
        let stats = dispatcher.stats();

        Ok(Self {
            config,
            registry,
            dispatcher,
            queue,
            stats,
            directory,
            authenticator: Arc::new(authenticator),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry<WsHandle>> {
        Arc::clone(&self.registry)
    }

    /// Queue handle for request handlers that commit chat rows
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    pub fn directory(&self) -> Arc<NodeDirectory<S>> {
        Arc::clone(&self.directory)
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Bind both listeners from the config and run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ws_listener = TcpListener::bind(self.config.ws_bind_addr).await?;
        let api_listener = TcpListener::bind(self.config.api_bind_addr).await?;
        self.run_with_listeners(ws_listener, api_listener, shutdown)
            .await
    }

    /// Run on already-bound listeners until `shutdown` resolves
    ///
    /// On shutdown the node leaves discovery first, then stops every task.
    /// Deliveries in flight finish; events still queued are discarded.
    pub async fn run_with_listeners<F>(
        self,
        ws_listener: TcpListener,
        api_listener: TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            registry,
            dispatcher,
            queue,
            stats,
            directory,
            authenticator,
        } = self;

        announce(&config, &directory).await?;

        let token = CancellationToken::new();

        let dispatcher_task = dispatcher.spawn(token.clone());
        let reaper_task = NodeReaper::new(
            Arc::clone(&directory),
            TcpProbe::new(config.probe_timeout),
            config.reaper_config(),
        )
        .spawn(token.clone());

        let ctx = SessionContext::new(registry, queue, authenticator)
            .outbound_buffer(config.outbound_buffer)
            .handshake_timeout(config.handshake_timeout);
        let sessions = SessionListener::new(&config, ctx);
        let ws_token = token.clone();
        let ws_task = tokio::spawn(async move { sessions.run(ws_listener, ws_token).await });

        let api = Arc::new(NodeApi::new(Arc::clone(&directory)));
        let api_task = tokio::spawn(http::serve(api_listener, api, token.clone()));

        tracing::info!(node_id = config.node_id, "Chat node running");

        shutdown.await;
        tracing::info!(node_id = config.node_id, "Shutdown signal received");

        withdraw(&config, &directory).await;
        token.cancel();

        if let Err(e) = dispatcher_task.await {
            tracing::error!(error = %e, "Dispatcher task failed");
        }
        if let Err(e) = reaper_task.await {
            tracing::error!(error = %e, "Reaper task failed");
        }
        if let Err(e) = ws_task.await {
            tracing::error!(error = %e, "WebSocket listener task failed");
        }
        match api_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Node API failed"),
            Err(e) => tracing::error!(error = %e, "Node API task failed"),
        }

        directory.close().await;

        let snapshot = stats.snapshot();
        tracing::info!(
            node_id = config.node_id,
            events = snapshot.events_received,
            deliveries = snapshot.deliveries,
            "Chat node stopped"
        );
        Ok(())
    }
}

/// Register this node in the directory when it has an address to advertise
///
/// A previous run of this node id that drained on shutdown left its address
/// behind; that entry is replaced so the node becomes available again.
async fn announce<S: DirectoryStore>(config: &NodeConfig, directory: &NodeDirectory<S>) -> Result<()> {
    let (Some(address), Some(hostname)) = (&config.advertise_addr, config.advertised_hostname()) else {
        tracing::debug!(node_id = config.node_id, "No advertise address; skipping registration");
        return Ok(());
    };

    let drained = directory
        .records()
        .await?
        .iter()
        .any(|r| r.node_id == config.node_id && r.registered && !r.available);
    if drained {
        tracing::info!(node_id = config.node_id, "Replacing drained directory entry");
        directory.unregister(&config.internal_secret, config.node_id).await?;
    }

    let created = directory
        .register(&config.internal_secret, config.node_id, address, hostname)
        .await?;
    if !created {
        tracing::warn!(
            node_id = config.node_id,
            "Node id already registered; directory entry left unchanged"
        );
    }
    Ok(())
}

/// Remove this node from the available set
async fn withdraw<S: DirectoryStore>(config: &NodeConfig, directory: &NodeDirectory<S>) {
    if config.advertise_addr.is_none() {
        return;
    }
    if let Err(e) = directory.update(&config.internal_secret, config.node_id).await {
        tracing::error!(node_id = config.node_id, error = %e, "Failed to leave available nodes");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::directory::MemoryDirectoryStore;
    use crate::resolver::InMemoryMembership;
    use crate::session::InMemorySessions;

    #[tokio::test]
    async fn test_registers_and_drains_on_shutdown() {
        let store = MemoryDirectoryStore::new();
        let config = NodeConfig::default()
            .node_id(4)
            .advertise("127.0.0.1:9004")
            .hostname("node-4")
            .secret("s3cret")
            .reaper_interval(Duration::from_secs(3600));

        let node = ChatNode::new(
            config,
            InMemoryMembership::new(),
            store.clone(),
            InMemorySessions::new(),
        )
        .unwrap();
        let directory = node.directory();

        let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(node.run_with_listeners(ws, api, async {
            let _ = stop_rx.await;
        }));

        // Wait for self-registration
        let mut listed = Vec::new();
        for _ in 0..50 {
            listed = directory.list().await.unwrap();
            if !listed.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(listed, vec!["node-4".to_string()]);

        stop_tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        assert!(directory.list().await.unwrap().is_empty());
        assert_eq!(store.get("nodes:4").await.unwrap().as_deref(), Some("127.0.0.1:9004"));
    }

    #[test]
    fn test_rejects_config_without_secret() {
        let result = ChatNode::new(
            NodeConfig::default(),
            InMemoryMembership::new(),
            MemoryDirectoryStore::new(),
            InMemorySessions::new(),
        );
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    /// Run a node advertising id 4 until it shows up in discovery, then stop it
    async fn run_once(store: MemoryDirectoryStore) -> Vec<String> {
        let config = NodeConfig::default()
            .node_id(4)
            .advertise("127.0.0.1:9004")
            .hostname("node-4")
            .secret("s3cret")
            .reaper_interval(Duration::from_secs(3600));
        let node = ChatNode::new(
            config,
            InMemoryMembership::new(),
            store,
            InMemorySessions::new(),
        )
        .unwrap();
        let directory = node.directory();

        let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(node.run_with_listeners(ws, api, async {
            let _ = stop_rx.await;
        }));

        let mut listed = Vec::new();
        for _ in 0..50 {
            listed = directory.list().await.unwrap();
            if !listed.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        stop_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        listed
    }

    #[tokio::test]
    async fn test_restart_becomes_available_again() {
        let store = MemoryDirectoryStore::new();

        assert_eq!(run_once(store.clone()).await, vec!["node-4".to_string()]);
        assert_eq!(store.get("nodes:4").await.unwrap().as_deref(), Some("127.0.0.1:9004"));
        assert!(store.get("nodes:available:4").await.unwrap().is_none());

        assert_eq!(run_once(store.clone()).await, vec!["node-4".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_closes_after_shutdown() {
        let node = ChatNode::new(
            NodeConfig::default().secret("s"),
            InMemoryMembership::new(),
            MemoryDirectoryStore::new(),
            InMemorySessions::new(),
        )
        .unwrap();
        let queue = node.queue();

        let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
        node.run_with_listeners(ws, api, async {}).await.unwrap();

        assert!(queue.is_closed());
    }
}
