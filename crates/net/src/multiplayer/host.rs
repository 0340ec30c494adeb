use std::collections::VecDeque;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::net::{
    AckEndpoint, ClientId, EndpointError, HANDSHAKE_BYTE, INVALID_WIRE_CLIENT_ID,
    MAX_DATAGRAM_SIZE, NetworkStats, Received, ReliableEndpoint, Sequence, Transport,
    TransportError, UdpTransport,
};
use crate::packet::{
    PacketArgument, PacketBuilder, PacketError, PacketHandler, PacketKind, Role, catalog,
};
use crate::session::{HostSession, Player};

use super::cache::{
    CacheEntry, CacheError, PacketCache, SendMode, settle_acknowledged, transmit_cached,
};
use super::config::HostConfig;
use super::events::{DisconnectReason, HostEvent};
use super::peers::{Peer, PeerState, PeerTable};
use super::NetError;

/// Serving side: accepts clients on one socket, relays their packets, and
/// owns the authoritative [`HostSession`].
pub struct HostManager<T: Transport = UdpTransport> {
    transport: T,
    config: HostConfig,
    closed: bool,
    cache: PacketCache,
    peers: PeerTable,
    next_client_id: ClientId,
    session: HostSession,
    last_raw_packet: Option<(ClientId, Vec<u8>)>,
    events: VecDeque<HostEvent>,
}

impl HostManager<UdpTransport> {
    pub fn bind<A: ToSocketAddrs>(addr: A, config: HostConfig) -> Result<Self, NetError> {
        let transport = UdpTransport::bind(addr)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> HostManager<T> {
    pub fn with_transport(transport: T, config: HostConfig) -> Self {
        debug_assert!(catalog::is_dense());

        if let Ok(addr) = transport.local_addr() {
            log::info!("hosting '{}' on {}", config.session_name, addr);
        }

        Self {
            transport,
            cache: PacketCache::new(config.cache_capacity),
            peers: PeerTable::new(),
            next_client_id: 0,
            session: HostSession::new(config.session_name.clone()),
            last_raw_packet: None,
            events: VecDeque::new(),
            closed: false,
            config,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn transport_stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    pub fn peer_stats(&self, client_id: ClientId) -> Option<&NetworkStats> {
        self.peers.get(client_id).map(|peer| peer.endpoint.stats())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Established client ids in ascending order.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.peers.client_ids()
    }

    pub fn client_count(&self) -> usize {
        self.peers.established_count()
    }

    pub fn pending_count(&self) -> usize {
        self.peers.pending_count()
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Most recent raw packet and the client that sent it.
    pub fn last_raw_packet(&self) -> Option<(ClientId, &[u8])> {
        self.last_raw_packet
            .as_ref()
            .map(|(client_id, bytes)| (*client_id, bytes.as_slice()))
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = HostEvent> + '_ {
        self.events.drain(..)
    }

    /// Applies `f` to the session and re-broadcasts it if anything changed.
    pub fn update_session(&mut self, f: impl FnOnce(&mut HostSession)) -> Result<(), NetError> {
        self.ensure_open()?;
        f(&mut self.session);
        if self.session.take_dirty() {
            self.broadcast_session()?;
        }
        Ok(())
    }

    /// Caches `bytes` once and sends them to every established client.
    pub fn broadcast_data(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.ensure_open()?;
        let entry = self.cache.add(bytes)?;

        let mut failed = Vec::new();
        let mut transport_closed = false;
        for peer in self.peers.established_mut() {
            if let Err(e) = transmit_to_peer(&mut self.transport, peer, entry, bytes) {
                log::warn!("broadcast to client {} failed: {}", peer.client_id, e);
                transport_closed |= matches!(e, EndpointError::Transport(TransportError::Closed));
                failed.push(peer.client_id);
            }
        }

        if transport_closed {
            self.close();
            return Err(NetError::Closed);
        }
        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort_unstable();
            Err(NetError::PartialBroadcast { failed })
        }
    }

    pub fn broadcast_packet(
        &mut self,
        kind: PacketKind,
        argument: &PacketArgument<'_>,
    ) -> Result<(), NetError> {
        let packet = catalog::encode_packet(kind, argument)?;
        self.broadcast_data(packet.as_slice())
    }

    pub fn send_data(&mut self, client_id: ClientId, bytes: &[u8]) -> Result<Sequence, NetError> {
        self.send_cached(client_id, bytes, SendMode::Packet)
    }

    pub fn send_packet(
        &mut self,
        client_id: ClientId,
        kind: PacketKind,
        argument: &PacketArgument<'_>,
    ) -> Result<Sequence, NetError> {
        let packet = catalog::encode_packet(kind, argument)?;
        self.send_data(client_id, packet.as_slice())
    }

    /// Sequence the next send to `client_id` will carry.
    pub fn next_sequence_for(&self, client_id: ClientId) -> Result<Sequence, CacheError> {
        self.peers
            .get(client_id)
            .map(|peer| peer.endpoint.next_sequence())
            .ok_or(CacheError::UnknownPeer(client_id))
    }

    /// Copy of the bytes sent to `client_id` under `sequence`.
    pub fn get_packet_cache_for(
        &self,
        client_id: ClientId,
        sequence: Sequence,
    ) -> Result<Vec<u8>, CacheError> {
        let peer = self
            .peers
            .get(client_id)
            .ok_or(CacheError::UnknownPeer(client_id))?;
        let entry = peer
            .sequences
            .get(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))?;
        self.cache.get(entry)
    }

    /// Forgets which bytes went out under `sequence`. The bytes stay in the
    /// ring buffer until evicted.
    pub fn remove_from_cache_for(
        &mut self,
        client_id: ClientId,
        sequence: Sequence,
    ) -> Result<CacheEntry, CacheError> {
        let peer = self
            .peers
            .get_mut(client_id)
            .ok_or(CacheError::UnknownPeer(client_id))?;
        peer.sequences
            .remove(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))
    }

    /// Sends the bytes cached under `sequence` again, under a new sequence.
    pub fn retransmit_to(
        &mut self,
        client_id: ClientId,
        sequence: Sequence,
    ) -> Result<Sequence, NetError> {
        self.ensure_open()?;
        let peer = self
            .peers
            .get_mut(client_id)
            .ok_or(CacheError::UnknownPeer(client_id))?;
        let entry = peer
            .sequences
            .get(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))?;
        let bytes = self.cache.get(entry)?;

        log::debug!(
            "retransmitting sequence {} to client {} ({} bytes)",
            sequence,
            client_id,
            bytes.len()
        );
        let result = transmit_to_peer(&mut self.transport, peer, entry, &bytes);
        result.map_err(|e| self.closing(e))
    }

    /// Sequences sent to `client_id` that are still unacknowledged after
    /// `older_than`.
    pub fn stale_sequences_for(
        &self,
        client_id: ClientId,
        older_than: Duration,
    ) -> Result<Vec<Sequence>, CacheError> {
        self.peers
            .get(client_id)
            .map(|peer| peer.endpoint.stale_sequences(older_than))
            .ok_or(CacheError::UnknownPeer(client_id))
    }

    /// Drops an established client. The client itself is told through a
    /// `notify_player_left` naming its own id, which may get lost.
    pub fn kick(&mut self, client_id: ClientId) -> Result<(), NetError> {
        self.ensure_open()?;
        if self.peers.get(client_id).is_none() {
            return Err(CacheError::UnknownPeer(client_id).into());
        }
        let notice = PacketArgument::NotifyPlayerLeft(client_id);
        if let Err(e) = self.send_packet(client_id, PacketKind::NotifyPlayerLeft, &notice) {
            log::debug!("kick notice to client {} failed: {}", client_id, e);
        }
        self.ensure_open()?;
        self.peers.remove(client_id);
        self.player_disconnected(client_id, DisconnectReason::Kicked);
        self.flush_session();
        Ok(())
    }

    /// Drains pending datagrams, completes handshakes, dispatches packets,
    /// settles acknowledgements, and expires silent peers.
    pub fn poll(&mut self) -> Result<(), NetError> {
        self.ensure_open()?;

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut inbox = Vec::new();
        loop {
            match self.transport.receive_from(&mut buf) {
                Ok((size, addr)) => self.receive_datagram(addr, &buf[..size], &mut inbox),
                Err(TransportError::Busy) => break,
                Err(e) => return Err(self.closing(e)),
            }
        }

        for (addr, payload) in inbox {
            self.handle_payload(addr, &payload);
            if self.closed {
                return Err(NetError::Closed);
            }
        }

        let prune = self.config.prune_acknowledged;
        for peer in self.peers.iter_mut() {
            settle_acknowledged(&mut peer.endpoint, &mut peer.sequences, prune);
        }

        self.flush_acks();
        self.expire_peers();
        self.flush_session();

        if self.closed {
            Err(NetError::Closed)
        } else {
            Ok(())
        }
    }

    /// Drops every peer and releases the socket. Later calls fail with
    /// [`NetError::Closed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let dropped = self.peers.clear();
        self.transport.close();
        self.closed = true;
        log::info!("host closed ({} peers dropped)", dropped.len());
    }

    fn ensure_open(&self) -> Result<(), NetError> {
        if self.closed {
            Err(NetError::Closed)
        } else {
            Ok(())
        }
    }

    fn closing(&mut self, error: impl Into<NetError>) -> NetError {
        let error = error.into();
        if error.is_closed() {
            log::warn!("transport closed underneath the host");
            self.close();
        }
        error
    }

    fn send_cached(
        &mut self,
        client_id: ClientId,
        bytes: &[u8],
        mode: SendMode,
    ) -> Result<Sequence, NetError> {
        self.ensure_open()?;
        self.cache.validate(bytes)?;
        let Some(peer) = self.peers.get_mut(client_id) else {
            return Err(CacheError::UnknownPeer(client_id).into());
        };
        let entry = self.cache.add(bytes)?;
        let entry = match mode {
            SendMode::Packet => entry,
            SendMode::HandshakeReply => entry.as_handshake_reply(),
        };
        let result = transmit_to_peer(&mut self.transport, peer, entry, bytes);
        result.map_err(|e| self.closing(e))
    }

    fn receive_datagram(
        &mut self,
        addr: SocketAddr,
        datagram: &[u8],
        inbox: &mut Vec<(SocketAddr, Vec<u8>)>,
    ) {
        if !self.peers.contains_addr(&addr) {
            if self.peers.pending_count() >= self.config.max_pending_clients {
                log::warn!("dropping datagram from {}: too many pending peers", addr);
                return;
            }
            let endpoint = AckEndpoint::new(self.config.endpoint.clone());
            self.peers.insert_pending(Peer::pending(addr, endpoint));
            self.events.push_back(HostEvent::PeerPending { addr });
            log::debug!("new pending peer {}", addr);
        }

        let Some(peer) = self.peers.get_by_addr_mut(&addr) else {
            return;
        };
        peer.touch();

        let mut delivered = None;
        let received = peer
            .endpoint
            .receive_packet(datagram, &mut |_, payload| delivered = Some(payload.to_vec()));
        match received {
            Ok(Received::Delivered(_)) => {
                if let Some(payload) = delivered {
                    inbox.push((addr, payload));
                }
            }
            Ok(Received::Duplicate(sequence)) => {
                log::debug!("duplicate sequence {} from {}", sequence, addr);
            }
            Ok(Received::HandshakeReply(sequence)) => {
                log::warn!("dropping handshake reply {} sent by {}", sequence, addr);
            }
            Ok(Received::AckOnly) => {}
            Err(e) => log::warn!("dropping datagram from {}: {}", addr, e),
        }
    }

    fn handle_payload(&mut self, addr: SocketAddr, payload: &[u8]) {
        // Kicked or rejected earlier in this poll.
        let Some(peer) = self.peers.get_by_addr(&addr) else {
            return;
        };

        match peer.state {
            PeerState::Pending => self.complete_handshake(addr, payload),
            PeerState::Established => {
                let client_id = peer.client_id;
                if payload == [HANDSHAKE_BYTE].as_slice() {
                    // The first reply or session may have been lost.
                    log::debug!("client {} repeated its handshake", client_id);
                    if let Err(e) = self.resend_handshake(client_id) {
                        log::warn!("handshake reply to client {} failed: {}", client_id, e);
                    }
                    return;
                }

                match catalog::dispatch(self, client_id, payload) {
                    Ok(kind) => log::debug!("client {} sent {}", client_id, kind.name()),
                    Err(error) => {
                        log::warn!("dropping packet from client {}: {}", client_id, error);
                        self.events
                            .push_back(HostEvent::PacketDropped { client_id, error });
                    }
                }
            }
            PeerState::Closed => {}
        }
    }

    fn complete_handshake(&mut self, addr: SocketAddr, payload: &[u8]) {
        if payload != [HANDSHAKE_BYTE].as_slice() {
            log::warn!("unexpected first payload from {}", addr);
            self.reject(addr, "unexpected first payload");
            return;
        }
        if self.peers.established_count() >= self.config.max_clients {
            log::warn!("rejecting {}: server full", addr);
            self.reject(addr, "server full");
            return;
        }
        if self.next_client_id >= ClientId::from(INVALID_WIRE_CLIENT_ID) {
            log::warn!("rejecting {}: client ids exhausted", addr);
            self.reject(addr, "client ids exhausted");
            return;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.peers.promote(&addr, client_id);

        log::info!("client {} connected from {}", client_id, addr);
        self.events
            .push_back(HostEvent::ClientConnected { client_id, addr });

        if let Err(e) = self.send_handshake_reply(client_id) {
            log::warn!("handshake reply to client {} failed: {}", client_id, e);
        }
        self.session
            .add_player(Player::new(client_id, format!("Player {}", client_id)));
    }

    fn reject(&mut self, addr: SocketAddr, reason: &str) {
        self.peers.remove_by_addr(&addr);
        self.events.push_back(HostEvent::HandshakeRejected {
            addr,
            reason: reason.to_owned(),
        });
    }

    fn send_handshake_reply(&mut self, client_id: ClientId) -> Result<Sequence, NetError> {
        let mut reply = PacketBuilder::new();
        reply.put_back(&(client_id as u16));
        self.send_cached(client_id, reply.as_slice(), SendMode::HandshakeReply)
    }

    fn resend_handshake(&mut self, client_id: ClientId) -> Result<(), NetError> {
        self.send_handshake_reply(client_id)?;
        let packet = catalog::encode_packet(
            PacketKind::UpdateHostSession,
            &PacketArgument::UpdateHostSession(&self.session),
        )?;
        self.send_data(client_id, packet.as_slice())?;
        Ok(())
    }

    /// Sends pending acks, and keepalives to established peers that heard
    /// nothing from the host for `keepalive_interval`.
    fn flush_acks(&mut self) {
        let keepalive_interval = self.config.keepalive_interval;
        for peer in self.peers.iter_mut() {
            let datagram = match peer.endpoint.take_ack_datagram() {
                Some(ack) => Some(ack),
                None if peer.is_established() && peer.is_idle(keepalive_interval) => {
                    peer.endpoint.keepalive_datagram()
                }
                None => None,
            };
            let Some(datagram) = datagram else {
                continue;
            };
            match self.transport.send_to(&datagram, peer.addr) {
                Ok(()) => peer.touch_send(),
                Err(e) => log::debug!("ack to {} failed: {}", peer.addr, e),
            }
        }
    }

    fn expire_peers(&mut self) {
        for addr in self.peers.timed_out(self.config.peer_timeout) {
            let Some(peer) = self.peers.remove_by_addr(&addr) else {
                continue;
            };
            if peer.is_established() {
                self.player_disconnected(peer.client_id, DisconnectReason::Timeout);
            } else {
                log::debug!("pending peer {} timed out", addr);
            }
        }
    }

    fn player_disconnected(&mut self, client_id: ClientId, reason: DisconnectReason) {
        log::info!("client {} {}", client_id, reason.as_str());
        self.events
            .push_back(HostEvent::ClientDisconnected { client_id, reason });
        self.session.remove_player(client_id);

        let notify = PacketArgument::NotifyPlayerLeft(client_id);
        if let Err(e) = self.broadcast_packet(PacketKind::NotifyPlayerLeft, &notify) {
            log::warn!("notify_player_left for client {} failed: {}", client_id, e);
        }
    }

    fn broadcast_session(&mut self) -> Result<(), NetError> {
        let packet = catalog::encode_packet(
            PacketKind::UpdateHostSession,
            &PacketArgument::UpdateHostSession(&self.session),
        )?;
        self.broadcast_data(packet.as_slice())
    }

    fn flush_session(&mut self) {
        if self.closed || !self.session.take_dirty() {
            return;
        }
        if let Err(e) = self.broadcast_session() {
            log::warn!("session broadcast failed: {}", e);
        }
    }
}

impl<T: Transport> Drop for HostManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn transmit_to_peer<T: Transport>(
    transport: &mut T,
    peer: &mut Peer,
    entry: CacheEntry,
    payload: &[u8],
) -> Result<Sequence, EndpointError> {
    let addr = peer.addr;
    let sequence = transmit_cached(
        &mut peer.endpoint,
        &mut peer.sequences,
        entry,
        payload,
        &mut |datagram| transport.send_to(datagram, addr),
    )?;
    peer.touch_send();
    Ok(sequence)
}

impl<T: Transport> PacketHandler for HostManager<T> {
    fn role(&self) -> Role {
        Role::Host
    }

    fn relay_to(
        &mut self,
        sender: ClientId,
        target: ClientId,
        packet: &[u8],
    ) -> Result<(), PacketError> {
        log::debug!(
            "relaying {} bytes from client {} to client {}",
            packet.len(),
            sender,
            target
        );
        self.send_data(target, packet)
            .map(|_| ())
            .map_err(|e| PacketError::Rejected(e.to_string()))
    }

    fn relay_broadcast(&mut self, sender: ClientId, packet: &[u8]) -> Result<(), PacketError> {
        log::debug!("relaying {} bytes from client {} to all", packet.len(), sender);
        match self.broadcast_data(packet) {
            Ok(()) => Ok(()),
            Err(NetError::PartialBroadcast { failed }) => {
                log::warn!("relay from client {} missed clients {:?}", sender, failed);
                Ok(())
            }
            Err(e) => Err(PacketError::Rejected(e.to_string())),
        }
    }

    fn raw_packet(&mut self, sender: ClientId, bytes: Vec<u8>) -> Result<(), PacketError> {
        log::debug!("raw packet of {} bytes from client {}", bytes.len(), sender);
        self.last_raw_packet = Some((sender, bytes));
        Ok(())
    }

    fn ready_status(&mut self, sender: ClientId, ready: bool) -> Result<(), PacketError> {
        if !self.session.set_ready(sender, ready) {
            return Err(PacketError::Rejected(format!("client {} has no player", sender)));
        }
        log::info!(
            "client {} is {}",
            sender,
            if ready { "ready" } else { "not ready" }
        );
        Ok(())
    }
}
