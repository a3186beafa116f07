//! Node configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::directory::{NodeId, ReaperConfig};
use crate::dispatch::DispatcherConfig;

/// Configuration could not be loaded or is inconsistent
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Node configuration options
///
/// Every field has a default, so a JSON file only needs the keys it changes.
/// Durations are given in milliseconds under `*_ms` keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier this node registers under
    pub node_id: NodeId,

    /// Address the WebSocket listener binds to
    pub ws_bind_addr: SocketAddr,

    /// Address the node HTTP API binds to
    pub api_bind_addr: SocketAddr,

    /// `addr:port` other processes reach this node at
    ///
    /// The node registers itself in the directory only when this is set.
    pub advertise_addr: Option<String>,

    /// Hostname advertised to clients (defaults to `advertise_addr`)
    pub hostname: Option<String>,

    /// Shared secret for directory mutations
    pub internal_secret: String,

    /// Maximum concurrent WebSocket sessions (0 = unlimited)
    pub max_connections: usize,

    /// Per-session outbound queue capacity
    pub outbound_buffer: usize,

    /// Event queue capacity
    pub queue_capacity: usize,

    /// Upper bound on one delivery
    #[serde(rename = "delivery_timeout_ms", with = "duration_ms")]
    pub delivery_timeout: Duration,

    /// Upper bound on the WebSocket upgrade
    #[serde(rename = "handshake_timeout_ms", with = "duration_ms")]
    pub handshake_timeout: Duration,

    /// Time between reaper sweeps
    #[serde(rename = "reaper_interval_ms", with = "duration_ms")]
    pub reaper_interval: Duration,

    /// Connect timeout of the reaper's liveness probe
    #[serde(rename = "probe_timeout_ms", with = "duration_ms")]
    pub probe_timeout: Duration,

    /// Enable TCP_NODELAY on accepted sockets
    pub tcp_nodelay: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            api_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            advertise_addr: None,
            hostname: None,
            internal_secret: String::new(),
            max_connections: 0, // Unlimited
            outbound_buffer: 64,
            queue_capacity: 1024,
            delivery_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            reaper_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
        }
    }
}

impl NodeConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.internal_secret.is_empty() {
            return Err(ConfigError::Invalid("internal_secret must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid("outbound_buffer must be at least 1".into()));
        }
        if self.reaper_interval.is_zero() {
            return Err(ConfigError::Invalid("reaper_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Set the node id
    pub fn node_id(mut self, id: NodeId) -> Self {
        self.node_id = id;
        self
    }

    /// Set the WebSocket bind address
    pub fn ws_bind(mut self, addr: SocketAddr) -> Self {
        self.ws_bind_addr = addr;
        self
    }

    /// Set the HTTP API bind address
    pub fn api_bind(mut self, addr: SocketAddr) -> Self {
        self.api_bind_addr = addr;
        self
    }

    /// Register in the directory under this address
    pub fn advertise(mut self, addr: impl Into<String>) -> Self {
        self.advertise_addr = Some(addr.into());
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the shared directory secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.internal_secret = secret.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Hostname to advertise, falling back to the advertise address
    pub fn advertised_hostname(&self) -> Option<&str> {
        self.hostname.as_deref().or(self.advertise_addr.as_deref())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .queue_capacity(self.queue_capacity)
            .delivery_timeout(self.delivery_timeout)
    }

    pub fn reaper_config(&self) -> ReaperConfig {
        ReaperConfig::default().interval(self.reaper_interval)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
