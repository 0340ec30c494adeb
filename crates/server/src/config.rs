use std::time::Duration;

use mpnet::{DEFAULT_TICK_RATE, HostConfig, PacketLossSimulation};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub host: HostConfig,
    pub packet_loss: Option<PacketLossSimulation>,
    /// How often transport counters are written to the log.
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            host: HostConfig::default(),
            packet_loss: None,
            stats_interval: Duration::from_secs(30),
        }
    }
}
