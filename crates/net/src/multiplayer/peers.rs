use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::net::{AckEndpoint, ClientId, INVALID_CLIENT_ID};

use super::cache::SequenceCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Pending,
    Established,
    Closed,
}

#[derive(Debug)]
pub struct Peer {
    pub addr: SocketAddr,
    /// `INVALID_CLIENT_ID` until the handshake completes.
    pub client_id: ClientId,
    pub state: PeerState,
    pub endpoint: AckEndpoint,
    pub sequences: SequenceCache,
    pub last_receive_time: Instant,
    pub last_send_time: Instant,
}

impl Peer {
    pub fn pending(addr: SocketAddr, endpoint: AckEndpoint) -> Self {
        Self {
            addr,
            client_id: INVALID_CLIENT_ID,
            state: PeerState::Pending,
            endpoint,
            sequences: SequenceCache::new(),
            last_receive_time: Instant::now(),
            last_send_time: Instant::now(),
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == PeerState::Established
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }

    pub fn is_idle(&self, interval: Duration) -> bool {
        self.last_send_time.elapsed() >= interval
    }

    pub fn touch_send(&mut self) {
        self.last_send_time = Instant::now();
    }
}

/// Peers by address, with an id index over the established ones.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<SocketAddr, Peer>,
    ids: HashMap<ClientId, SocketAddr>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_addr(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn insert_pending(&mut self, peer: Peer) {
        self.peers.insert(peer.addr, peer);
    }

    /// Assigns `client_id` to the pending peer at `addr`.
    pub fn promote(&mut self, addr: &SocketAddr, client_id: ClientId) -> Option<&mut Peer> {
        let peer = self.peers.get_mut(addr)?;
        peer.client_id = client_id;
        peer.state = PeerState::Established;
        self.ids.insert(client_id, *addr);
        Some(peer)
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&Peer> {
        self.peers.get(addr)
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut Peer> {
        self.peers.get_mut(addr)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Peer> {
        self.ids.get(&client_id).and_then(|addr| self.peers.get(addr))
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut Peer> {
        if let Some(addr) = self.ids.get(&client_id) {
            self.peers.get_mut(addr)
        } else {
            None
        }
    }

    pub fn remove(&mut self, client_id: ClientId) -> Option<Peer> {
        let addr = self.ids.remove(&client_id)?;
        self.peers.remove(&addr)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<Peer> {
        let peer = self.peers.remove(addr)?;
        if peer.is_established() {
            self.ids.remove(&peer.client_id);
        }
        Some(peer)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    pub fn established(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values().filter(|peer| peer.is_established())
    }

    pub fn established_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut().filter(|peer| peer.is_established())
    }

    /// Established ids in ascending order.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.ids.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn established_count(&self) -> usize {
        self.ids.len()
    }

    pub fn pending_count(&self) -> usize {
        self.peers.len() - self.ids.len()
    }

    pub fn timed_out(&self, timeout: Duration) -> Vec<SocketAddr> {
        self.peers
            .values()
            .filter(|peer| peer.is_timed_out(timeout))
            .map(|peer| peer.addr)
            .collect()
    }

    /// Drops every record, marking each one closed on the way out.
    pub fn clear(&mut self) -> Vec<Peer> {
        self.ids.clear();
        self.peers
            .drain()
            .map(|(_, mut peer)| {
                peer.state = PeerState::Closed;
                peer
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_promote_indexes_by_id() {
        let mut table = PeerTable::new();
        table.insert_pending(Peer::pending(addr(1), AckEndpoint::default()));
        table.insert_pending(Peer::pending(addr(2), AckEndpoint::default()));
        assert_eq!(table.pending_count(), 2);
        assert!(table.get(0).is_none());

        table.promote(&addr(2), 0).unwrap();
        assert_eq!(table.pending_count(), 1);
        assert_eq!(table.established_count(), 1);
        assert_eq!(table.get(0).unwrap().addr, addr(2));
        assert_eq!(table.client_ids(), vec![0]);
    }

    #[test]
    fn test_remove_by_addr_clears_index() {
        let mut table = PeerTable::new();
        table.insert_pending(Peer::pending(addr(1), AckEndpoint::default()));
        table.promote(&addr(1), 4);

        let peer = table.remove_by_addr(&addr(1)).unwrap();
        assert_eq!(peer.client_id, 4);
        assert!(table.get(4).is_none());
        assert_eq!(table.established_count(), 0);
    }

    #[test]
    fn test_timed_out() {
        let mut table = PeerTable::new();
        table.insert_pending(Peer::pending(addr(1), AckEndpoint::default()));
        assert!(table.timed_out(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(table.timed_out(Duration::from_millis(1)), vec![addr(1)]);
    }

    #[test]
    fn test_clear_closes_records() {
        let mut table = PeerTable::new();
        table.insert_pending(Peer::pending(addr(1), AckEndpoint::default()));
        table.promote(&addr(1), 0);
        let closed = table.clear();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].state, PeerState::Closed);
        assert_eq!(table.established_count(), 0);
    }
}
