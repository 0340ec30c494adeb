use std::thread;
use std::time::{Duration, Instant};

use mpnet::packet::catalog;
use mpnet::{
    ClientConfig, ClientEvent, ClientId, ClientManager, ClientState, DisconnectReason, HostConfig,
    HostEvent, HostManager, NetError, PacketArgument, PacketError, PacketKind,
};

const TIMEOUT: Duration = Duration::from_secs(3);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Lan {
    host: HostManager,
    clients: Vec<ClientManager>,
    client_events: Vec<Vec<ClientEvent>>,
    host_events: Vec<HostEvent>,
}

impl Lan {
    fn start(count: usize) -> Self {
        Self::with_configs(count, HostConfig::default(), ClientConfig::default())
    }

    fn with_configs(count: usize, host_config: HostConfig, client_config: ClientConfig) -> Self {
        init_logging();
        let host = HostManager::bind("127.0.0.1:0", host_config).unwrap();
        let host_addr = host.local_addr().unwrap();

        let mut lan = Self {
            host,
            clients: Vec::new(),
            client_events: Vec::new(),
            host_events: Vec::new(),
        };
        // Connect one at a time so ids follow connection order.
        for index in 0..count {
            let client = ClientManager::connect(host_addr, client_config.clone()).unwrap();
            lan.clients.push(client);
            lan.client_events.push(Vec::new());
            assert!(
                wait_for(&mut lan, |lan| lan.clients[index].is_connected()),
                "client {} never connected",
                index
            );
        }
        assert!(wait_for(&mut lan, |lan| {
            lan.clients
                .iter()
                .all(|client| client.session().players().len() == count)
        }));
        lan
    }

    fn poll(&mut self) {
        self.host.poll().unwrap();
        self.host_events.extend(self.host.drain_events());
        for (client, events) in self.clients.iter_mut().zip(&mut self.client_events) {
            if client.state() != ClientState::Closed {
                client.poll().unwrap();
            }
            events.extend(client.drain_events());
        }
    }

    /// Keeps polling for a while so stray deliveries have a chance to arrive.
    fn settle(&mut self) {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(100) {
            self.poll();
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn wait_for(lan: &mut Lan, mut done: impl FnMut(&Lan) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        lan.poll();
        if done(lan) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn player_left(events: &[ClientEvent], id: ClientId) -> bool {
    events
        .iter()
        .any(|event| matches!(event, ClientEvent::PlayerLeft { client_id } if *client_id == id))
}

#[test]
fn test_handshake_assigns_sequential_ids() {
    let lan = Lan::start(3);

    let ids: Vec<ClientId> = lan.clients.iter().map(|c| c.client_id()).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(lan.host.client_ids(), vec![0, 1, 2]);
    assert_eq!(lan.host.pending_count(), 0);

    let connected = lan
        .host_events
        .iter()
        .filter(|event| matches!(event, HostEvent::ClientConnected { .. }))
        .count();
    assert_eq!(connected, 3);

    for client in &lan.clients {
        let names: Vec<&str> = client
            .session()
            .players()
            .values()
            .map(|player| player.name.as_str())
            .collect();
        assert_eq!(names, vec!["Player 0", "Player 1", "Player 2"]);
    }
}

#[test]
fn test_broadcast_reaches_all_and_is_cached() {
    let mut lan = Lan::start(3);

    let message = catalog::encode_packet(PacketKind::SendRaw, &PacketArgument::SendRaw(b"state"))
        .unwrap()
        .into_vec();
    let sequences: Vec<_> = (0..3)
        .map(|id| lan.host.next_sequence_for(id).unwrap())
        .collect();

    lan.host.broadcast_data(&message).unwrap();

    assert!(wait_for(&mut lan, |lan| {
        lan.clients
            .iter()
            .all(|client| client.last_raw_packet() == Some(&b"state"[..]))
    }));
    for (id, sequence) in sequences.into_iter().enumerate() {
        assert_eq!(
            lan.host.get_packet_cache_for(id as ClientId, sequence).unwrap(),
            message
        );
    }
}

#[test]
fn test_targeted_relay_skips_others() {
    let mut lan = Lan::start(3);

    lan.clients[0]
        .send_packet(1, PacketKind::SendRaw, &PacketArgument::SendRaw(b"for you"))
        .unwrap();

    assert!(wait_for(&mut lan, |lan| {
        lan.clients[1].last_raw_packet() == Some(&b"for you"[..])
    }));
    lan.settle();
    assert!(lan.clients[0].last_raw_packet().is_none());
    assert!(lan.clients[2].last_raw_packet().is_none());
}

#[test]
fn test_raw_packet_to_host() {
    let mut lan = Lan::start(2);

    lan.clients[1]
        .send_to_host(PacketKind::SendRaw, &PacketArgument::SendRaw(&[1, 2, 3]))
        .unwrap();

    assert!(wait_for(&mut lan, |lan| lan.host.last_raw_packet().is_some()));
    assert_eq!(lan.host.last_raw_packet(), Some((1, &[1u8, 2, 3][..])));
}

#[test]
fn test_session_rename_replicates() {
    let mut lan = Lan::start(2);

    lan.host
        .update_session(|session| session.set_name("Spring Campaign"))
        .unwrap();

    assert!(wait_for(&mut lan, |lan| {
        lan.clients
            .iter()
            .all(|client| client.session().name() == "Spring Campaign")
    }));
}

#[test]
fn test_private_message_only_logged_by_target() {
    let mut lan = Lan::start(3);

    lan.clients[0].send_private_message(2, "psst").unwrap();

    assert!(wait_for(&mut lan, |lan| !lan.clients[2].chat().messages().is_empty()));
    lan.settle();

    let received = &lan.clients[2].chat().messages()[0];
    assert_eq!(received.from_id, 0);
    assert_eq!(received.data.message, "psst");
    assert!(lan.clients[1].chat().messages().is_empty());
    assert_eq!(lan.clients[0].chat().messages().len(), 1);
}

#[test]
fn test_chat_group_lifecycle() {
    let mut lan = Lan::start(3);

    lan.clients[0].create_chat_group(&[0, 2]).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        lan.clients.iter().all(|client| client.chat().group(0).is_some())
    }));

    lan.clients[2].send_group_message(0, "members only").unwrap();
    assert!(wait_for(&mut lan, |lan| !lan.clients[0].chat().messages().is_empty()));
    lan.settle();
    assert!(lan.clients[1].chat().messages().is_empty());

    lan.clients[1].set_chat_group(0, &[0, 1, 2]).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        lan.clients
            .iter()
            .all(|client| client.chat().group(0).is_some_and(|g| g.clients.len() == 3))
    }));

    lan.clients[0].delete_chat_group(0).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        lan.clients.iter().all(|client| client.chat().group(0).is_none())
    }));

    lan.clients[0].create_chat_group(&[1]).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        lan.clients.iter().all(|client| client.chat().group(1).is_some())
    }));
    assert!(lan.client_events[2]
        .iter()
        .any(|event| matches!(event, ClientEvent::ChatGroupDeleted { group: 0 })));
}

#[test]
fn test_ready_status_round_trip() {
    let mut lan = Lan::start(2);

    lan.clients[0].set_ready(true).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        lan.clients[1]
            .session()
            .player(0)
            .is_some_and(|player| player.ready)
    }));
    assert!(lan.host.session().player(0).unwrap().ready);

    lan.clients[1].set_ready(true).unwrap();
    assert!(wait_for(&mut lan, |lan| lan.clients[0].session().all_ready()));

    lan.clients[0].set_ready(false).unwrap();
    assert!(wait_for(&mut lan, |lan| !lan.clients[1].session().all_ready()));
}

#[test]
fn test_kick_notifies_remaining_clients() {
    let mut lan = Lan::start(3);

    lan.host.kick(1).unwrap();
    assert!(wait_for(&mut lan, |lan| {
        player_left(&lan.client_events[0], 1) && player_left(&lan.client_events[2], 1)
    }));
    assert!(lan.clients[0].session().player(1).is_none());
    assert_eq!(lan.host.client_ids(), vec![0, 2]);
    assert!(wait_for(&mut lan, |lan| lan.clients[1].state() == ClientState::Closed));
    assert!(lan.client_events[1].iter().any(|event| matches!(
        event,
        ClientEvent::Disconnected {
            reason: DisconnectReason::Kicked
        }
    )));
    assert!(lan.host_events.iter().any(|event| matches!(
        event,
        HostEvent::ClientDisconnected {
            client_id: 1,
            reason: DisconnectReason::Kicked
        }
    )));
}

#[test]
fn test_silent_client_times_out() {
    let host_config = HostConfig {
        peer_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let client_config = ClientConfig {
        keepalive_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let mut lan = Lan::with_configs(2, host_config, client_config);

    lan.clients[1].close();
    assert!(wait_for(&mut lan, |lan| player_left(&lan.client_events[0], 1)));
    assert_eq!(lan.host.client_ids(), vec![0]);
    assert!(lan.host_events.iter().any(|event| matches!(
        event,
        HostEvent::ClientDisconnected {
            client_id: 1,
            reason: DisconnectReason::Timeout
        }
    )));
}

#[test]
fn test_client_notices_unresponsive_host() {
    let host_config = HostConfig {
        keepalive_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let client_config = ClientConfig {
        host_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let mut lan = Lan::with_configs(1, host_config, client_config);

    // Host keepalives hold the connection open past the timeout.
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(500) {
        lan.poll();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(lan.clients[0].is_connected());

    // Stop polling the host.
    let start = Instant::now();
    while lan.clients[0].state() != ClientState::Closed && start.elapsed() < TIMEOUT {
        lan.clients[0].poll().unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(lan.clients[0].state(), ClientState::Closed);
    assert!(lan.clients[0].drain_events().any(|event| matches!(
        event,
        ClientEvent::Disconnected {
            reason: DisconnectReason::Timeout
        }
    )));
}

#[test]
fn test_client_cannot_originate_host_only_kinds() {
    let mut lan = Lan::start(1);
    let sent = lan.clients[0].transport_stats().packets_sent;

    let result = lan.clients[0].broadcast_packet(
        PacketKind::NotifyPlayerLeft,
        &PacketArgument::NotifyPlayerLeft(0),
    );
    assert!(matches!(
        result,
        Err(NetError::Packet(PacketError::NotClientSendable(
            PacketKind::NotifyPlayerLeft
        )))
    ));

    let result = lan.clients[0].send_packet(
        0,
        PacketKind::UpdateHostSession,
        &PacketArgument::UpdateHostSession(lan.host.session()),
    );
    assert!(matches!(
        result,
        Err(NetError::Packet(PacketError::NotClientSendable(_)))
    ));
    assert_eq!(lan.clients[0].transport_stats().packets_sent, sent);
}

#[test]
fn test_close_fails_subsequent_sends() {
    let mut lan = Lan::start(1);

    lan.clients[0].close();
    assert!(matches!(
        lan.clients[0].send_public_message("anyone?"),
        Err(NetError::Closed)
    ));

    lan.host.close();
    assert!(lan.host.is_closed());
    assert!(matches!(lan.host.broadcast_data(b"late"), Err(NetError::Closed)));
    assert!(matches!(lan.host.poll(), Err(NetError::Closed)));
}
