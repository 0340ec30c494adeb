use std::collections::{BTreeMap, VecDeque};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use crate::chat::{ChatLog, ChatMessageLog, GroupIndex, MessageData};
use crate::net::{
    AckEndpoint, ClientId, HANDSHAKE_BYTE, HOST_ID, INVALID_CLIENT_ID, INVALID_WIRE_CLIENT_ID,
    MAX_DATAGRAM_SIZE, NetworkStats, Received, ReliableEndpoint, Sequence, Transport,
    TransportError, UdpTransport,
};
use crate::packet::{
    PacketArgument, PacketError, PacketHandler, PacketKind, PacketReader, Role, catalog,
};
use crate::session::{Battleplan, GameAction, HostSession};

use super::cache::{
    CacheEntry, CacheError, PacketCache, SequenceCache, settle_acknowledged, transmit_cached,
};
use super::config::ClientConfig;
use super::events::{ClientEvent, DisconnectReason};
use super::NetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Connected,
    Closed,
}

/// Connecting side: talks to one host, which relays everything it sends to
/// other clients.
pub struct ClientManager<T: Transport = UdpTransport> {
    transport: T,
    config: ClientConfig,
    state: ClientState,
    host_addr: SocketAddr,
    client_id: ClientId,
    endpoint: AckEndpoint,
    cache: PacketCache,
    sequences: SequenceCache,
    session: HostSession,
    chat: ChatLog,
    battleplans: BTreeMap<u32, Battleplan>,
    game_actions: VecDeque<GameAction>,
    last_raw_packet: Option<Vec<u8>>,
    /// Packets that overtook the handshake reply.
    early_packets: Vec<Vec<u8>>,
    connect_started: Instant,
    last_handshake: Instant,
    last_send: Instant,
    last_receive: Instant,
    events: VecDeque<ClientEvent>,
}

impl ClientManager<UdpTransport> {
    /// Binds an ephemeral socket of the host's address family and starts the
    /// handshake.
    pub fn connect(host_addr: SocketAddr, config: ClientConfig) -> Result<Self, NetError> {
        let bind_addr = if host_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let transport = UdpTransport::bind(bind_addr)?;
        Self::with_transport(transport, host_addr, config)
    }
}

impl<T: Transport> ClientManager<T> {
    pub fn with_transport(
        transport: T,
        host_addr: SocketAddr,
        config: ClientConfig,
    ) -> Result<Self, NetError> {
        debug_assert!(catalog::is_dense());

        let now = Instant::now();
        let mut client = Self {
            transport,
            state: ClientState::Connecting,
            host_addr,
            client_id: INVALID_CLIENT_ID,
            endpoint: AckEndpoint::new(config.endpoint.clone()),
            cache: PacketCache::new(config.cache_capacity),
            sequences: SequenceCache::new(),
            session: HostSession::default(),
            chat: ChatLog::new(),
            battleplans: BTreeMap::new(),
            game_actions: VecDeque::new(),
            last_raw_packet: None,
            early_packets: Vec::new(),
            connect_started: now,
            last_handshake: now,
            last_send: now,
            last_receive: now,
            events: VecDeque::new(),
            config,
        };

        log::info!("connecting to {}", host_addr);
        client.send_handshake()?;
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// `INVALID_CLIENT_ID` until the host has answered the handshake.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn host_addr(&self) -> SocketAddr {
        self.host_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn config(&self) -> &ClientConfig {
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

    pub fn endpoint_stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn battleplans(&self) -> &BTreeMap<u32, Battleplan> {
        &self.battleplans
    }

    pub fn battleplan(&self, tag: u32) -> Option<&Battleplan> {
        self.battleplans.get(&tag)
    }

    pub fn last_raw_packet(&self) -> Option<&[u8]> {
        self.last_raw_packet.as_deref()
    }

    /// Game actions received since the last call, oldest first.
    pub fn take_game_actions(&mut self) -> Vec<GameAction> {
        self.game_actions.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.events.drain(..)
    }

    /// Sends a packet to every client through the host. Kinds clients may
    /// not originate are refused before anything is sent.
    pub fn broadcast_packet(
        &mut self,
        kind: PacketKind,
        argument: &PacketArgument<'_>,
    ) -> Result<Sequence, NetError> {
        check_client_sendable(kind)?;
        self.ensure_connected()?;
        let relay = PacketArgument::Broadcast {
            kind,
            argument: Box::new(argument.clone()),
        };
        let packet = catalog::encode_packet(PacketKind::Broadcast, &relay)?;
        self.send_cached(packet.as_slice())
    }

    /// Sends a packet to one client through the host.
    pub fn send_packet(
        &mut self,
        client_id: ClientId,
        kind: PacketKind,
        argument: &PacketArgument<'_>,
    ) -> Result<Sequence, NetError> {
        check_client_sendable(kind)?;
        self.ensure_connected()?;
        let relay = PacketArgument::Retransmit {
            client_id,
            kind,
            argument: Box::new(argument.clone()),
        };
        let packet = catalog::encode_packet(PacketKind::Retransmit, &relay)?;
        self.send_cached(packet.as_slice())
    }

    /// Sends a packet for the host itself to handle.
    pub fn send_to_host(
        &mut self,
        kind: PacketKind,
        argument: &PacketArgument<'_>,
    ) -> Result<Sequence, NetError> {
        check_client_sendable(kind)?;
        self.ensure_connected()?;
        let packet = catalog::encode_packet(kind, argument)?;
        self.send_cached(packet.as_slice())
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<Sequence, NetError> {
        self.send_to_host(PacketKind::SetReadyStatus, &PacketArgument::SetReadyStatus(ready))
    }

    pub fn send_public_message(&mut self, message: &str) -> Result<(), NetError> {
        self.send_chat(MessageData::public(message))
    }

    pub fn send_private_message(&mut self, to: ClientId, message: &str) -> Result<(), NetError> {
        self.send_chat(MessageData::private(to, message))
    }

    pub fn send_group_message(&mut self, group: GroupIndex, message: &str) -> Result<(), NetError> {
        self.chat.check_group(group)?;
        self.send_chat(MessageData::group(group, message))
    }

    /// Asks every client, this one included, to create a group. The index is
    /// assigned on receipt and reported through
    /// [`ClientEvent::ChatGroupCreated`].
    pub fn create_chat_group(&mut self, clients: &[ClientId]) -> Result<(), NetError> {
        self.broadcast_packet(PacketKind::AddChatGroup, &PacketArgument::AddChatGroup(clients))?;
        Ok(())
    }

    pub fn set_chat_group(&mut self, group: GroupIndex, clients: &[ClientId]) -> Result<(), NetError> {
        self.chat.check_group(group)?;
        self.broadcast_packet(
            PacketKind::ModifyChatGroup,
            &PacketArgument::ModifyChatGroup { group, clients },
        )?;
        Ok(())
    }

    pub fn delete_chat_group(&mut self, group: GroupIndex) -> Result<(), NetError> {
        self.chat.check_group(group)?;
        self.broadcast_packet(
            PacketKind::DeleteChatGroup,
            &PacketArgument::DeleteChatGroup(group),
        )?;
        Ok(())
    }

    pub fn send_battleplan(&mut self, plan: &Battleplan) -> Result<Sequence, NetError> {
        self.broadcast_packet(PacketKind::SendBattleplan, &PacketArgument::SendBattleplan(plan))
    }

    /// Copy of the bytes sent to the host under `sequence`.
    pub fn get_packet_cache(&self, sequence: Sequence) -> Result<Vec<u8>, CacheError> {
        let entry = self
            .sequences
            .get(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))?;
        self.cache.get(entry)
    }

    pub fn remove_from_cache(&mut self, sequence: Sequence) -> Result<CacheEntry, CacheError> {
        self.sequences
            .remove(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))
    }

    /// Sends the bytes cached under `sequence` again, under a new sequence.
    pub fn retransmit(&mut self, sequence: Sequence) -> Result<Sequence, NetError> {
        self.ensure_open()?;
        let entry = self
            .sequences
            .get(sequence)
            .ok_or(CacheError::UnknownSequence(sequence))?;
        let bytes = self.cache.get(entry)?;
        log::debug!("retransmitting sequence {} ({} bytes)", sequence, bytes.len());
        self.transmit(entry, &bytes)
    }

    pub fn stale_sequences(&self, older_than: Duration) -> Vec<Sequence> {
        self.endpoint.stale_sequences(older_than)
    }

    /// Retries the handshake if due, drains pending datagrams, dispatches
    /// packets, and settles acknowledgements. Losing the host closes the
    /// client and queues [`ClientEvent::Disconnected`].
    pub fn poll(&mut self) -> Result<(), NetError> {
        self.ensure_open()?;

        if self.state == ClientState::Connecting {
            if self.connect_started.elapsed() > self.config.connection_timeout {
                log::warn!("handshake with {} timed out", self.host_addr);
                self.close();
                return Err(NetError::HandshakeTimeout);
            }
            if self.last_handshake.elapsed() >= self.config.handshake_retry_interval {
                log::debug!("resending handshake to {}", self.host_addr);
                self.send_handshake()?;
            }
        }

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut inbox = Vec::new();
        loop {
            match self.transport.receive_from(&mut buf) {
                Ok((size, addr)) => {
                    if addr != self.host_addr {
                        log::debug!("ignoring datagram from {}", addr);
                        continue;
                    }
                    let mut delivered = None;
                    let received = self
                        .endpoint
                        .receive_packet(&buf[..size], &mut |_, p| delivered = Some(p.to_vec()));
                    match received {
                        Ok(received) => {
                            self.last_receive = Instant::now();
                            if let Some(payload) = delivered {
                                inbox.push((received, payload));
                            }
                        }
                        Err(e) => log::warn!("dropping datagram from host: {}", e),
                    }
                }
                Err(TransportError::Busy) => break,
                Err(e) => return Err(self.closing(e)),
            }
        }

        for (received, payload) in inbox {
            match received {
                Received::HandshakeReply(sequence) => self.receive_handshake(sequence, &payload)?,
                _ if self.state == ClientState::Connecting => {
                    log::debug!("holding {} byte packet until connected", payload.len());
                    self.early_packets.push(payload);
                }
                _ => self.dispatch(&payload),
            }
            if self.state == ClientState::Closed {
                return Ok(());
            }
        }

        if self.state == ClientState::Connected
            && self.last_receive.elapsed() > self.config.host_timeout
        {
            log::warn!("host {} went silent", self.host_addr);
            self.disconnect(DisconnectReason::Timeout);
            return Ok(());
        }

        settle_acknowledged(
            &mut self.endpoint,
            &mut self.sequences,
            self.config.prune_acknowledged,
        );
        self.flush_acks()
    }

    /// Drops the endpoint state and releases the socket. Later calls fail
    /// with [`NetError::Closed`].
    pub fn close(&mut self) {
        if self.state == ClientState::Closed {
            return;
        }
        self.transport.close();
        self.sequences.clear();
        self.endpoint = AckEndpoint::new(self.config.endpoint.clone());
        self.state = ClientState::Closed;
        log::info!("disconnected from {}", self.host_addr);
    }

    fn disconnect(&mut self, reason: DisconnectReason) {
        self.close();
        self.events.push_back(ClientEvent::Disconnected { reason });
    }

    fn ensure_open(&self) -> Result<(), NetError> {
        match self.state {
            ClientState::Closed => Err(NetError::Closed),
            _ => Ok(()),
        }
    }

    fn ensure_connected(&self) -> Result<(), NetError> {
        match self.state {
            ClientState::Connected => Ok(()),
            ClientState::Connecting => Err(NetError::NotConnected),
            ClientState::Closed => Err(NetError::Closed),
        }
    }

    fn closing(&mut self, error: impl Into<NetError>) -> NetError {
        let error = error.into();
        if error.is_closed() {
            log::warn!("transport closed underneath the client");
            self.close();
        }
        error
    }

    fn send_handshake(&mut self) -> Result<Sequence, NetError> {
        self.last_handshake = Instant::now();
        self.send_cached(&[HANDSHAKE_BYTE])
    }

    fn send_cached(&mut self, bytes: &[u8]) -> Result<Sequence, NetError> {
        self.cache.validate(bytes)?;
        let entry = self.cache.add(bytes)?;
        self.transmit(entry, bytes)
    }

    fn transmit(&mut self, entry: CacheEntry, bytes: &[u8]) -> Result<Sequence, NetError> {
        let host_addr = self.host_addr;
        let transport = &mut self.transport;
        let result = transmit_cached(
            &mut self.endpoint,
            &mut self.sequences,
            entry,
            bytes,
            &mut |datagram| transport.send_to(datagram, host_addr),
        );
        match result {
            Ok(sequence) => {
                self.last_send = Instant::now();
                Ok(sequence)
            }
            Err(e) => Err(self.closing(e)),
        }
    }

    fn receive_handshake(&mut self, sequence: Sequence, payload: &[u8]) -> Result<(), NetError> {
        if self.state == ClientState::Connected {
            // Answer to a handshake retry that crossed the first reply.
            log::debug!("ignoring repeated handshake reply (sequence {})", sequence);
            return Ok(());
        }

        let mut reader = PacketReader::new(payload);
        let wire_id = match reader.try_read::<u16>() {
            Some(wire_id) if reader.remaining().is_empty() => wire_id,
            _ => {
                log::warn!("malformed handshake reply of {} bytes", payload.len());
                return Ok(());
            }
        };
        if sequence != 0 {
            log::debug!("handshake reply was resent as sequence {}", sequence);
        }
        if wire_id == INVALID_WIRE_CLIENT_ID {
            log::error!("host {} assigned an invalid client id", self.host_addr);
            self.close();
            return Err(NetError::InvalidClientId);
        }

        self.client_id = ClientId::from(wire_id);
        self.state = ClientState::Connected;
        self.last_receive = Instant::now();
        log::info!("connected to {} as client {}", self.host_addr, self.client_id);
        self.events.push_back(ClientEvent::Connected {
            client_id: self.client_id,
        });

        for packet in std::mem::take(&mut self.early_packets) {
            if self.state == ClientState::Closed {
                break;
            }
            self.dispatch(&packet);
        }
        Ok(())
    }

    fn dispatch(&mut self, packet: &[u8]) {
        match catalog::dispatch(self, HOST_ID, packet) {
            Ok(kind) => log::debug!("received {}", kind.name()),
            Err(error) => {
                log::warn!("dropping packet from host: {}", error);
                self.events.push_back(ClientEvent::PacketDropped { error });
            }
        }
    }

    fn send_chat(&mut self, data: MessageData) -> Result<(), NetError> {
        self.ensure_connected()?;
        let log = self.chat.log_message(self.client_id, data).clone();
        self.broadcast_packet(
            PacketKind::SendChatMessage,
            &PacketArgument::SendChatMessage(&log),
        )?;
        Ok(())
    }

    fn flush_acks(&mut self) -> Result<(), NetError> {
        let datagram = match self.endpoint.take_ack_datagram() {
            Some(ack) => Some(ack),
            None if self.state == ClientState::Connected
                && self.last_send.elapsed() >= self.config.keepalive_interval =>
            {
                self.endpoint.keepalive_datagram()
            }
            None => None,
        };
        let Some(datagram) = datagram else {
            return Ok(());
        };

        match self.transport.send_to(&datagram, self.host_addr) {
            Ok(()) => {
                self.last_send = Instant::now();
                Ok(())
            }
            Err(TransportError::Busy) => Ok(()),
            Err(e) => Err(self.closing(e)),
        }
    }
}

impl<T: Transport> Drop for ClientManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_client_sendable(kind: PacketKind) -> Result<(), PacketError> {
    if kind.client_sendable() {
        Ok(())
    } else {
        Err(PacketError::NotClientSendable(kind))
    }
}

impl<T: Transport> PacketHandler for ClientManager<T> {
    fn role(&self) -> Role {
        Role::Client
    }

    fn raw_packet(&mut self, _sender: ClientId, bytes: Vec<u8>) -> Result<(), PacketError> {
        self.last_raw_packet = Some(bytes.clone());
        self.events.push_back(ClientEvent::RawPacket { bytes });
        Ok(())
    }

    fn host_session(&mut self, _sender: ClientId, session: HostSession) -> Result<(), PacketError> {
        log::debug!(
            "session '{}' with {} players",
            session.name(),
            session.players().len()
        );
        self.session = session;
        self.events.push_back(ClientEvent::SessionUpdated);
        Ok(())
    }

    fn game_action(&mut self, _sender: ClientId, action: GameAction) -> Result<(), PacketError> {
        self.game_actions.push_back(action.clone());
        self.events.push_back(ClientEvent::GameAction(action));
        Ok(())
    }

    fn chat_message(&mut self, _sender: ClientId, log: ChatMessageLog) -> Result<(), PacketError> {
        match self.chat.receive_message(self.client_id, log) {
            Ok(Some(logged)) => {
                let logged = logged.clone();
                self.events.push_back(ClientEvent::ChatMessage(logged));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(PacketError::Rejected(e.to_string())),
        }
    }

    fn chat_group_added(
        &mut self,
        _sender: ClientId,
        clients: Vec<ClientId>,
    ) -> Result<(), PacketError> {
        let group = self.chat.create_group(clients);
        self.events.push_back(ClientEvent::ChatGroupCreated { group });
        Ok(())
    }

    fn chat_group_modified(
        &mut self,
        _sender: ClientId,
        group: GroupIndex,
        clients: Vec<ClientId>,
    ) -> Result<(), PacketError> {
        let previous = self
            .chat
            .set_group(group, clients)
            .map_err(|e| PacketError::Rejected(e.to_string()))?;
        self.events
            .push_back(ClientEvent::ChatGroupModified { group, previous });
        Ok(())
    }

    fn chat_group_deleted(&mut self, _sender: ClientId, group: GroupIndex) -> Result<(), PacketError> {
        self.chat
            .delete_group(group)
            .map_err(|e| PacketError::Rejected(e.to_string()))?;
        self.events.push_back(ClientEvent::ChatGroupDeleted { group });
        Ok(())
    }

    fn battleplan(&mut self, _sender: ClientId, plan: Battleplan) -> Result<(), PacketError> {
        self.battleplans.insert(plan.tag, plan.clone());
        self.events.push_back(ClientEvent::Battleplan(plan));
        Ok(())
    }

    fn player_left(&mut self, _sender: ClientId, client_id: ClientId) -> Result<(), PacketError> {
        if client_id == self.client_id {
            log::warn!("kicked by host {}", self.host_addr);
            self.disconnect(DisconnectReason::Kicked);
            return Ok(());
        }
        self.session.remove_player(client_id);
        self.events.push_back(ClientEvent::PlayerLeft { client_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplayer::{HostConfig, HostManager};
    use crate::net::{MemoryNetwork, MemoryTransport};
    use crate::session::{GameActionArgument, Player};

    struct Lan {
        host: HostManager<MemoryTransport>,
        clients: Vec<ClientManager<MemoryTransport>>,
    }

    impl Lan {
        fn new(count: usize) -> Self {
            let network = MemoryNetwork::new();
            let host = HostManager::with_transport(network.bind(), HostConfig::default());
            let host_addr = host.local_addr().unwrap();
            let clients = (0..count)
                .map(|_| {
                    ClientManager::with_transport(network.bind(), host_addr, ClientConfig::default())
                        .unwrap()
                })
                .collect();
            let mut lan = Self { host, clients };
            lan.pump();
            lan
        }

        fn pump(&mut self) {
            for _ in 0..4 {
                self.host.poll().unwrap();
                for client in &mut self.clients {
                    if client.state() != ClientState::Closed {
                        client.poll().unwrap();
                    }
                }
            }
        }
    }

    /// Host stand-in that frames datagrams by hand, so tests control their
    /// marking and arrival order.
    struct FakeHost {
        transport: MemoryTransport,
        endpoint: AckEndpoint,
    }

    impl FakeHost {
        fn new(network: &MemoryNetwork) -> Self {
            Self {
                transport: network.bind(),
                endpoint: AckEndpoint::default(),
            }
        }

        fn addr(&self) -> SocketAddr {
            self.transport.local_addr().unwrap()
        }

        fn frame(&mut self, payload: &[u8], reply: bool) -> Vec<u8> {
            let mut datagram = Vec::new();
            let sent = if reply {
                self.endpoint.send_handshake_reply(payload, &mut |d| {
                    datagram = d.to_vec();
                    Ok(())
                })
            } else {
                self.endpoint.send_packet(payload, &mut |d| {
                    datagram = d.to_vec();
                    Ok(())
                })
            };
            sent.unwrap();
            datagram
        }

        fn deliver(&mut self, datagram: &[u8], to: SocketAddr) {
            self.transport.send_to(datagram, to).unwrap();
        }
    }

    fn connect_to(network: &MemoryNetwork, host: &FakeHost) -> ClientManager<MemoryTransport> {
        connect_with(network, host, ClientConfig::default())
    }

    fn connect_with(
        network: &MemoryNetwork,
        host: &FakeHost,
        config: ClientConfig,
    ) -> ClientManager<MemoryTransport> {
        ClientManager::with_transport(network.bind(), host.addr(), config).unwrap()
    }

    #[test]
    fn test_connects_in_order() {
        let mut lan = Lan::new(3);
        let ids: Vec<ClientId> = lan.clients.iter().map(|c| c.client_id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        for client in &mut lan.clients {
            assert!(client.is_connected());
            assert_eq!(client.session().players().len(), 3);
            assert!(matches!(
                client.drain_events().next(),
                Some(ClientEvent::Connected { .. })
            ));
        }
    }

    #[test]
    fn test_host_only_kind_refused_before_io() {
        let mut lan = Lan::new(1);
        let sent = lan.clients[0].transport_stats().packets_sent;

        let session = HostSession::new("forged");
        let result = lan.clients[0].broadcast_packet(
            PacketKind::UpdateHostSession,
            &PacketArgument::UpdateHostSession(&session),
        );
        assert!(matches!(
            result,
            Err(NetError::Packet(PacketError::NotClientSendable(
                PacketKind::UpdateHostSession
            )))
        ));
        assert_eq!(lan.clients[0].transport_stats().packets_sent, sent);
    }

    #[test]
    fn test_send_before_connect() {
        let network = MemoryNetwork::new();
        let silent_host = network.bind();
        let host_addr = silent_host.local_addr().unwrap();
        let mut client =
            ClientManager::with_transport(network.bind(), host_addr, ClientConfig::default())
                .unwrap();
        assert_eq!(client.state(), ClientState::Connecting);
        assert!(matches!(
            client.send_public_message("hi"),
            Err(NetError::NotConnected)
        ));
        // The handshake went through the cache.
        assert_eq!(client.get_packet_cache(0).unwrap(), vec![HANDSHAKE_BYTE]);
    }

    #[test]
    fn test_handshake_times_out() {
        let network = MemoryNetwork::new();
        let silent_host = network.bind();
        let host_addr = silent_host.local_addr().unwrap();
        let config = ClientConfig {
            connection_timeout: Duration::ZERO,
            ..Default::default()
        };
        let mut client = ClientManager::with_transport(network.bind(), host_addr, config).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(client.poll(), Err(NetError::HandshakeTimeout)));
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[test]
    fn test_handshake_retries() {
        let network = MemoryNetwork::new();
        let silent_host = network.bind();
        let host_addr = silent_host.local_addr().unwrap();
        let config = ClientConfig {
            handshake_retry_interval: Duration::ZERO,
            ..Default::default()
        };
        let mut client = ClientManager::with_transport(network.bind(), host_addr, config).unwrap();
        client.poll().unwrap();
        client.poll().unwrap();
        assert_eq!(client.get_packet_cache(2).unwrap(), vec![HANDSHAKE_BYTE]);
        assert_eq!(network.pending_for(host_addr), 3);
    }

    #[test]
    fn test_unmarked_payload_is_not_a_reply() {
        let network = MemoryNetwork::new();
        let mut host = FakeHost::new(&network);
        let mut client = connect_to(&network, &host);
        let client_addr = client.local_addr().unwrap();

        for payload in [[2u8, 0, 0].as_slice(), &[9, 0]] {
            let datagram = host.frame(payload, false);
            host.deliver(&datagram, client_addr);
        }
        client.poll().unwrap();
        assert_eq!(client.state(), ClientState::Connecting);
        assert_eq!(client.client_id(), INVALID_CLIENT_ID);

        let reply = host.frame(&1u16.to_ne_bytes(), true);
        host.deliver(&reply, client_addr);
        client.poll().unwrap();
        assert!(client.is_connected());
        assert_eq!(client.client_id(), 1);
    }

    #[test]
    fn test_packet_overtaking_reply_is_held() {
        let network = MemoryNetwork::new();
        let mut host = FakeHost::new(&network);
        let mut client = connect_to(&network, &host);
        let client_addr = client.local_addr().unwrap();

        let reply = host.frame(&5u16.to_ne_bytes(), true);
        let raw = catalog::encode_packet(PacketKind::SendRaw, &PacketArgument::SendRaw(b"early"))
            .unwrap()
            .into_vec();
        let raw = host.frame(&raw, false);
        host.deliver(&raw, client_addr);
        host.deliver(&reply, client_addr);

        client.poll().unwrap();
        assert_eq!(client.client_id(), 5);
        assert_eq!(client.last_raw_packet(), Some(&b"early"[..]));
        let events: Vec<ClientEvent> = client.drain_events().collect();
        assert!(matches!(events[0], ClientEvent::Connected { client_id: 5 }));
        assert!(matches!(events[1], ClientEvent::RawPacket { .. }));
    }

    #[test]
    fn test_repeated_reply_is_ignored() {
        let network = MemoryNetwork::new();
        let mut host = FakeHost::new(&network);
        let mut client = connect_to(&network, &host);
        let client_addr = client.local_addr().unwrap();

        // Id 3 would read as a packet kind if it were dispatched.
        for _ in 0..2 {
            let reply = host.frame(&3u16.to_ne_bytes(), true);
            host.deliver(&reply, client_addr);
            client.poll().unwrap();
        }
        assert_eq!(client.client_id(), 3);
        let events: Vec<ClientEvent> = client.drain_events().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ClientEvent::Connected { client_id: 3 }));
    }

    #[test]
    fn test_silent_host_disconnects() {
        let network = MemoryNetwork::new();
        let mut host = FakeHost::new(&network);
        let config = ClientConfig {
            host_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let mut client = connect_with(&network, &host, config);
        let client_addr = client.local_addr().unwrap();

        let reply = host.frame(&0u16.to_ne_bytes(), true);
        host.deliver(&reply, client_addr);
        client.poll().unwrap();
        assert!(client.is_connected());

        std::thread::sleep(Duration::from_millis(40));
        client.poll().unwrap();
        assert_eq!(client.state(), ClientState::Closed);
        assert!(client.drain_events().any(|event| matches!(
            event,
            ClientEvent::Disconnected {
                reason: DisconnectReason::Timeout
            }
        )));
        assert!(matches!(client.poll(), Err(NetError::Closed)));
    }

    #[test]
    fn test_kick_closes_client() {
        let mut lan = Lan::new(2);
        for client in &mut lan.clients {
            client.drain_events().for_each(drop);
        }

        lan.host.kick(1).unwrap();
        lan.pump();

        assert_eq!(lan.clients[1].state(), ClientState::Closed);
        assert!(lan.clients[1].drain_events().any(|event| matches!(
            event,
            ClientEvent::Disconnected {
                reason: DisconnectReason::Kicked
            }
        )));
        assert!(lan.clients[0].is_connected());
        assert!(lan.clients[0].session().player(1).is_none());
        assert!(lan.clients[0]
            .drain_events()
            .any(|event| matches!(event, ClientEvent::PlayerLeft { client_id: 1 })));
    }

    #[test]
    fn test_public_chat_reaches_others() {
        let mut lan = Lan::new(2);
        lan.clients[0].send_public_message("hello all").unwrap();
        lan.pump();

        assert_eq!(lan.clients[0].chat().messages().len(), 1);
        let received = lan.clients[1].chat().messages();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from_id, 0);
        assert_eq!(received[0].data.message, "hello all");
    }

    #[test]
    fn test_group_lifecycle() {
        let mut lan = Lan::new(3);
        lan.clients[0].create_chat_group(&[0, 1]).unwrap();
        lan.pump();
        for client in &lan.clients {
            assert_eq!(client.chat().group(0).unwrap().clients, vec![0, 1]);
        }

        lan.clients[1].send_group_message(0, "members only").unwrap();
        lan.pump();
        assert_eq!(lan.clients[0].chat().messages().len(), 1);
        assert!(lan.clients[2].chat().messages().is_empty());

        lan.clients[2].set_chat_group(0, &[1, 2]).unwrap();
        lan.pump();
        assert_eq!(lan.clients[0].chat().group(0).unwrap().clients, vec![1, 2]);

        lan.clients[0].delete_chat_group(0).unwrap();
        lan.pump();
        for client in &lan.clients {
            assert!(client.chat().group(0).is_none());
            assert_eq!(client.chat().next_group_index(), 1);
        }
        assert!(matches!(
            lan.clients[0].send_group_message(0, "gone"),
            Err(NetError::Chat(crate::chat::ChatError::UnknownGroup(0)))
        ));
    }

    #[test]
    fn test_battleplan_stored_by_tag() {
        let mut lan = Lan::new(2);
        let plan = Battleplan {
            tag: 7,
            waypoints: Vec::new(),
        };
        lan.clients[0].send_battleplan(&plan).unwrap();
        lan.pump();
        assert_eq!(lan.clients[1].battleplan(7), Some(&plan));
        assert_eq!(lan.clients[0].battleplan(7), Some(&plan));
    }

    #[test]
    fn test_game_action_from_host() {
        let mut lan = Lan::new(1);
        let action = GameAction::new(3, GameActionArgument::IdBool(9, true));
        lan.host
            .broadcast_packet(
                PacketKind::ExecuteGameAction,
                &PacketArgument::ExecuteGameAction(&action),
            )
            .unwrap();
        lan.pump();
        assert_eq!(lan.clients[0].take_game_actions(), vec![action]);
        assert!(lan.clients[0].take_game_actions().is_empty());
    }

    #[test]
    fn test_ready_status_round_trip() {
        let mut lan = Lan::new(2);
        lan.clients[1].set_ready(true).unwrap();
        lan.pump();

        assert!(lan.host.session().player(1).unwrap().ready);
        let mirrored: &Player = lan.clients[0].session().player(1).unwrap();
        assert!(mirrored.ready);
        assert!(!lan.clients[0].session().all_ready());
    }

    #[test]
    fn test_close_fails_later_calls() {
        let mut lan = Lan::new(1);
        lan.clients[0].close();
        assert!(matches!(lan.clients[0].poll(), Err(NetError::Closed)));
        assert!(matches!(
            lan.clients[0].send_public_message("x"),
            Err(NetError::Closed)
        ));
        assert!(matches!(lan.clients[0].retransmit(0), Err(NetError::Closed)));
    }
}
