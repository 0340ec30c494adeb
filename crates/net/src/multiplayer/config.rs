use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::net::EndpointConfig;

pub const DEFAULT_CACHE_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub max_clients: usize,
    /// Unknown addresses tracked before their handshake completes.
    pub max_pending_clients: usize,
    /// Bytes of sent payloads kept for retransmission.
    pub cache_capacity: usize,
    pub peer_timeout: Duration,
    /// Idle time after which the host restates its acks to a client.
    pub keepalive_interval: Duration,
    /// Forget cache entries once the peer acknowledges them.
    pub prune_acknowledged: bool,
    pub endpoint: EndpointConfig,
    pub session_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_clients: 32,
            max_pending_clients: 16,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            peer_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(1),
            prune_acknowledged: false,
            endpoint: EndpointConfig::default(),
            session_name: String::from("mpnet session"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub cache_capacity: usize,
    pub handshake_retry_interval: Duration,
    /// How long the handshake may take before the client gives up.
    pub connection_timeout: Duration,
    /// Idle time after which the client restates its acks to the host.
    pub keepalive_interval: Duration,
    /// Silence from the host after which a connected client gives up.
    pub host_timeout: Duration,
    pub prune_acknowledged: bool,
    pub endpoint: EndpointConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            handshake_retry_interval: Duration::from_millis(500),
            connection_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(1),
            host_timeout: Duration::from_secs(30),
            prune_acknowledged: false,
            endpoint: EndpointConfig::default(),
        }
    }
}
