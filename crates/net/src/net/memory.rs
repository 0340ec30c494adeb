use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;

use super::stats::{NetworkStats, PacketLossSimulation};
use super::transport::{Transport, TransportError};

#[derive(Debug, Default)]
struct NetworkState {
    queues: HashMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>,
    next_port: u16,
}

/// In-process datagram network. Cloning yields another handle to the same
/// network; transports bound on it deliver to each other instantly.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self) -> MemoryTransport {
        let mut state = self.state.borrow_mut();
        let addr = loop {
            state.next_port = state.next_port.wrapping_add(1).max(1);
            let candidate = SocketAddr::from((Ipv4Addr::LOCALHOST, state.next_port));
            if !state.queues.contains_key(&candidate) {
                break candidate;
            }
        };
        state.queues.insert(addr, VecDeque::new());

        MemoryTransport {
            network: self.clone(),
            addr,
            closed: false,
            loss: PacketLossSimulation::default(),
            stats: NetworkStats::default(),
        }
    }

    /// Number of datagrams waiting for `addr`.
    pub fn pending_for(&self, addr: SocketAddr) -> usize {
        self.state
            .borrow()
            .queues
            .get(&addr)
            .map_or(0, VecDeque::len)
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
    addr: SocketAddr,
    closed: bool,
    loss: PacketLossSimulation,
    stats: NetworkStats,
}

impl MemoryTransport {
    pub fn set_packet_loss(&mut self, loss: PacketLossSimulation) {
        self.loss = loss;
    }

    fn unbind(&mut self) {
        if !self.closed {
            self.closed = true;
            self.network.state.borrow_mut().queues.remove(&self.addr);
        }
    }
}

impl Transport for MemoryTransport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;

        if self.loss.should_drop() {
            log::debug!("simulated loss of {} bytes to {}", bytes.len(), addr);
            return Ok(());
        }

        // Unbound destinations swallow the datagram, as UDP would.
        if let Some(queue) = self.network.state.borrow_mut().queues.get_mut(&addr) {
            queue.push_back((self.addr, bytes.to_vec()));
        }
        Ok(())
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let next = self
            .network
            .state
            .borrow_mut()
            .queues
            .get_mut(&self.addr)
            .and_then(VecDeque::pop_front);
        let Some((from, datagram)) = next else {
            return Err(TransportError::Busy);
        };

        // Oversized datagrams are truncated like a short recv buffer would.
        let size = datagram.len().min(buf.len());
        buf[..size].copy_from_slice(&datagram[..size]);
        self.stats.packets_received += 1;
        self.stats.bytes_received += size as u64;
        Ok((size, from))
    }

    fn available_bytes(&self) -> usize {
        if self.closed {
            return 0;
        }
        self.network
            .state
            .borrow()
            .queues
            .get(&self.addr)
            .and_then(VecDeque::front)
            .map_or(0, |(_, datagram)| datagram.len())
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(self.addr)
    }

    fn close(&mut self) {
        self.unbind();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.unbind();
    }
}
