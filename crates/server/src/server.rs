use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mpnet::{HostEvent, HostManager, NetError};

use crate::config::ServerConfig;

pub struct HostServer {
    host: HostManager,
    tick_duration: Duration,
    stats_interval: Duration,
    last_stats: Instant,
    running: Arc<AtomicBool>,
}

impl HostServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> Result<Self, NetError> {
        let mut host = HostManager::bind(bind_addr, config.host)?;
        if let Some(loss) = config.packet_loss {
            log::warn!("simulating {:.1}% outgoing packet loss", loss.loss_percent * 100.0);
            host.transport_mut().set_packet_loss(loss);
        }
        let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);

        Ok(Self {
            host,
            tick_duration,
            stats_interval: config.stats_interval,
            last_stats: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.host.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            if let Err(e) = self.tick_once() {
                log::error!("host poll failed: {}", e);
                if e.is_closed() {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
            if let Some(rest) = self.tick_duration.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.shutdown();
    }

    pub fn tick_once(&mut self) -> Result<(), NetError> {
        self.host.poll()?;

        for event in self.host.drain_events() {
            log_event(&event);
        }

        if self.last_stats.elapsed() >= self.stats_interval {
            self.last_stats = Instant::now();
            self.log_stats();
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        log::info!(
            "shutting down with {} client(s) connected",
            self.host.client_count()
        );
        self.host.close();
    }

    fn log_stats(&self) {
        let stats = self.host.transport_stats();
        log::info!(
            "{} client(s), {} pending | sent {} ({} B) | received {} ({} B)",
            self.host.client_count(),
            self.host.pending_count(),
            stats.packets_sent,
            stats.bytes_sent,
            stats.packets_received,
            stats.bytes_received
        );
        for client_id in self.host.client_ids() {
            if let Some(peer) = self.host.peer_stats(client_id) {
                log::debug!(
                    "client {}: rtt {:.1}ms, loss {:.1}%",
                    client_id,
                    peer.rtt_ms,
                    peer.packet_loss_percent
                );
            }
        }
    }
}

fn log_event(event: &HostEvent) {
    match event {
        HostEvent::PeerPending { addr } => log::debug!("handshake pending from {}", addr),
        HostEvent::ClientConnected { client_id, addr } => {
            log::info!("client {} joined from {}", client_id, addr)
        }
        HostEvent::ClientDisconnected { client_id, reason } => {
            log::info!("client {} left ({})", client_id, reason.as_str())
        }
        HostEvent::HandshakeRejected { addr, reason } => {
            log::warn!("rejected {}: {}", addr, reason)
        }
        HostEvent::PacketDropped { client_id, error } => {
            log::warn!("dropped packet from client {}: {}", client_id, error)
        }
    }
}
