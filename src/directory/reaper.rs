//! Background eviction of unreachable nodes
//!
//! Every `interval` the reaper probes each registered node's address and
//! deletes both directory entries of any node that fails. A flaky probe can
//! evict a healthy node; that node must register again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::{DirectoryError, ProbeError};
use super::node::{NodeDirectory, NodeId};
use super::store::DirectoryStore;

/// Reachability check against a node address
pub trait LivenessProbe: Send + Sync + 'static {
    fn probe(&self, address: &str) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Probe that opens (and immediately drops) a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl LivenessProbe for TcpProbe {
    async fn probe(&self, address: &str) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

/// Shortest interval the reaper will tick at
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Reaper configuration options
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between reaper cycles
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl ReaperConfig {
    /// Set the time between cycles (at least 1ms)
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }
}

/// Outcome of one reaper cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Registered nodes that were probed
    pub probed: usize,
    /// Nodes evicted after a failed probe, or for an orphan availability entry
    pub evicted: Vec<NodeId>,
}

/// Periodic task pruning unreachable nodes from the directory
pub struct NodeReaper<S, P> {
    directory: Arc<NodeDirectory<S>>,
    probe: P,
    config: ReaperConfig,
}

impl<S, P> NodeReaper<S, P>
where
    S: DirectoryStore,
    P: LivenessProbe,
{
    pub fn new(directory: Arc<NodeDirectory<S>>, probe: P, config: ReaperConfig) -> Self {
        Self {
            directory,
            probe,
            config,
        }
    }

    /// Probe every registered node once and evict the unreachable ones
    ///
    /// Availability entries left without an address are removed as well.
    pub async fn run_cycle(&self) -> Result<ReapReport, DirectoryError> {
        let records = self.directory.records().await?;

        let mut report = ReapReport::default();
        for orphan in records.iter().filter(|r| !r.registered && r.hostname.is_some()) {
            match self.directory.evict(orphan.node_id).await {
                Ok(_) => {
                    tracing::info!(node_id = orphan.node_id, "Removed orphan availability entry");
                    report.evicted.push(orphan.node_id);
                }
                Err(e) => {
                    tracing::error!(node_id = orphan.node_id, error = %e, "Failed to evict node");
                }
            }
        }

        let targets: Vec<(NodeId, String)> = records
            .into_iter()
            .filter_map(|r| r.address.map(|address| (r.node_id, address)))
            .collect();

        let probes = targets.iter().map(|(node_id, address)| async move {
            (*node_id, address.as_str(), self.probe.probe(address).await)
        });

        report.probed = targets.len();

        for (node_id, address, result) in join_all(probes).await {
            let Err(e) = result else { continue };

            tracing::warn!(
                node_id = node_id,
                address = address,
                error = %e,
                "Node failed liveness probe, evicting"
            );
            match self.directory.evict(node_id).await {
                Ok(_) => report.evicted.push(node_id),
                Err(e) => {
                    tracing::error!(node_id = node_id, error = %e, "Failed to evict node");
                }
            }
        }

        tracing::debug!(
            probed = report.probed,
            evicted = report.evicted.len(),
            "Reaper cycle complete"
        );

        Ok(report)
    }

    /// Run cycles on the configured interval until cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let interval = self.config.interval.max(MIN_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "Node reaper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Reaper cycle failed");
            }
        }

        tracing::info!("Node reaper stopped");
    }

    /// Spawn the reaper loop on the runtime
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::net::TcpListener;

    use super::*;
    use crate::directory::MemoryDirectoryStore;

    const SECRET: &str = "s3cret";

    /// Probe that fails for a fixed set of addresses
    struct FakeProbe {
        down: HashSet<String>,
    }

    impl LivenessProbe for FakeProbe {
        async fn probe(&self, address: &str) -> Result<(), ProbeError> {
            if self.down.contains(address) {
                Err(ProbeError::Unreachable(address.to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn directory() -> Arc<NodeDirectory<MemoryDirectoryStore>> {
        Arc::new(NodeDirectory::open(MemoryDirectoryStore::new(), SECRET).unwrap())
    }

    #[tokio::test]
    async fn test_cycle_evicts_failed_nodes() {
        let dir = directory();
        dir.register(SECRET, 1, "10.0.0.1:9000", "node-a").await.unwrap();
        dir.register(SECRET, 2, "10.0.0.2:9000", "node-b").await.unwrap();
        dir.register(SECRET, 3, "10.0.0.3:9000", "node-c").await.unwrap();
        // Drained nodes are still probed
        dir.update(SECRET, 3).await.unwrap();

        let probe = FakeProbe {
            down: ["10.0.0.2:9000", "10.0.0.3:9000"]
                .into_iter()
                .map(String::from)
                .collect(),
        };
        let reaper = NodeReaper::new(Arc::clone(&dir), probe, ReaperConfig::default());

        let report = reaper.run_cycle().await.unwrap();
        assert_eq!(report.probed, 3);
        assert_eq!(report.evicted, vec![2, 3]);

        let records = dir.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].node_id, 1);
        assert_eq!(dir.list().await.unwrap(), vec!["node-a".to_string()]);
        assert!(dir.store().get("nodes:available:2").await.unwrap().is_none());
        assert!(dir.store().get("nodes:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cycle_removes_orphan_availability() {
        let dir = directory();
        dir.register(SECRET, 1, "10.0.0.1:9000", "node-a").await.unwrap();
        dir.store().set("nodes:available:7", "ghost").await.unwrap();

        let reaper = NodeReaper::new(
            Arc::clone(&dir),
            FakeProbe { down: HashSet::new() },
            ReaperConfig::default(),
        );

        let report = reaper.run_cycle().await.unwrap();
        assert_eq!(report.probed, 1);
        assert_eq!(report.evicted, vec![7]);
        assert!(dir.store().get("nodes:available:7").await.unwrap().is_none());
        assert_eq!(dir.records().await.unwrap().len(), 1);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ReaperConfig::default().interval(Duration::ZERO);
        assert_eq!(config.interval, MIN_INTERVAL);
    }

    #[tokio::test]
    async fn test_zero_interval_literal_still_runs() {
        let dir = directory();
        dir.register(SECRET, 1, "10.0.0.1:9000", "node-a").await.unwrap();

        let reaper = NodeReaper::new(
            Arc::clone(&dir),
            FakeProbe {
                down: ["10.0.0.1:9000".to_string()].into_iter().collect(),
            },
            ReaperConfig {
                interval: Duration::ZERO,
            },
        );

        let shutdown = CancellationToken::new();
        let task = reaper.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dir.records().await.unwrap().is_empty());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_addr = listener.local_addr().unwrap().to_string();

        // Bind then drop to get a port nobody listens on
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = closed.local_addr().unwrap().to_string();
        drop(closed);

        let probe = TcpProbe::new(Duration::from_secs(1));
        assert!(probe.probe(&live_addr).await.is_ok());
        assert!(probe.probe(&dead_addr).await.is_err());
        assert!(matches!(
            probe.probe("not an address").await,
            Err(ProbeError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let dir = directory();
        dir.register(SECRET, 1, "10.0.0.1:9000", "node-a").await.unwrap();

        let probe = FakeProbe {
            down: ["10.0.0.1:9000".to_string()].into_iter().collect(),
        };
        let reaper = NodeReaper::new(
            Arc::clone(&dir),
            probe,
            ReaperConfig::default().interval(Duration::from_millis(20)),
        );

        let shutdown = CancellationToken::new();
        let task = reaper.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(dir.records().await.unwrap().is_empty());

        shutdown.cancel();
        task.await.unwrap();
    }
}
