//! Fixed table of packet kinds.
//!
//! A packet on the wire is `[u16 kind id][payload]`. Ids are dense and follow
//! declaration order; the table below is indexed by id.

use std::collections::HashSet;

use bitflags::bitflags;

use crate::codec::Decode;
use crate::net::ClientId;

use super::{PacketArgument, PacketBuilder, PacketError, PacketHandler, PacketReader, Role};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u8 {
        /// Clients may originate this kind.
        const CLIENT_SEND = 1 << 0;
        /// Payload wraps another packet that the host forwards.
        const RELAY = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    Retransmit = 0,
    Broadcast = 1,
    SendRaw = 2,
    UpdateHostSession = 3,
    ExecuteGameAction = 4,
    SendChatMessage = 5,
    AddChatGroup = 6,
    ModifyChatGroup = 7,
    DeleteChatGroup = 8,
    SendBattleplan = 9,
    NotifyPlayerLeft = 10,
    SetReadyStatus = 11,
}

impl PacketKind {
    pub const COUNT: usize = 12;

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        is_valid_id(id).then(|| get_by_id(id).kind)
    }

    pub fn descriptor(self) -> &'static PacketDescriptor {
        &CATALOG[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn client_sendable(self) -> bool {
        self.descriptor().flags.contains(PacketFlags::CLIENT_SEND)
    }
}

pub type EncodeFn = fn(&PacketArgument<'_>, &mut PacketBuilder) -> Result<(), PacketError>;
pub type DispatchFn =
    fn(&mut dyn PacketHandler, ClientId, &mut PacketReader<'_>) -> Result<(), PacketError>;

pub struct PacketDescriptor {
    pub kind: PacketKind,
    pub name: &'static str,
    pub flags: PacketFlags,
    pub encode: EncodeFn,
    pub dispatch: DispatchFn,
}

impl std::fmt::Debug for PacketDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish()
    }
}

const CLIENT: PacketFlags = PacketFlags::CLIENT_SEND;
const HOST_ONLY: PacketFlags = PacketFlags::empty();
const RELAY: PacketFlags = PacketFlags::CLIENT_SEND.union(PacketFlags::RELAY);

pub static CATALOG: [PacketDescriptor; PacketKind::COUNT] = [
    PacketDescriptor {
        kind: PacketKind::Retransmit,
        name: "retransmit_packet",
        flags: RELAY,
        encode: encode_retransmit,
        dispatch: dispatch_retransmit,
    },
    PacketDescriptor {
        kind: PacketKind::Broadcast,
        name: "broadcast_packet",
        flags: RELAY,
        encode: encode_broadcast,
        dispatch: dispatch_broadcast,
    },
    PacketDescriptor {
        kind: PacketKind::SendRaw,
        name: "send_raw_packet",
        flags: CLIENT,
        encode: encode_raw,
        dispatch: dispatch_raw,
    },
    PacketDescriptor {
        kind: PacketKind::UpdateHostSession,
        name: "update_host_session",
        flags: HOST_ONLY,
        encode: encode_host_session,
        dispatch: dispatch_host_session,
    },
    PacketDescriptor {
        kind: PacketKind::ExecuteGameAction,
        name: "execute_game_action",
        flags: HOST_ONLY,
        encode: encode_game_action,
        dispatch: dispatch_game_action,
    },
    PacketDescriptor {
        kind: PacketKind::SendChatMessage,
        name: "send_chat_message",
        flags: CLIENT,
        encode: encode_chat_message,
        dispatch: dispatch_chat_message,
    },
    PacketDescriptor {
        kind: PacketKind::AddChatGroup,
        name: "add_chat_group",
        flags: CLIENT,
        encode: encode_add_chat_group,
        dispatch: dispatch_add_chat_group,
    },
    PacketDescriptor {
        kind: PacketKind::ModifyChatGroup,
        name: "modify_chat_group",
        flags: CLIENT,
        encode: encode_modify_chat_group,
        dispatch: dispatch_modify_chat_group,
    },
    PacketDescriptor {
        kind: PacketKind::DeleteChatGroup,
        name: "delete_chat_group",
        flags: CLIENT,
        encode: encode_delete_chat_group,
        dispatch: dispatch_delete_chat_group,
    },
    PacketDescriptor {
        kind: PacketKind::SendBattleplan,
        name: "send_battleplan",
        flags: CLIENT,
        encode: encode_battleplan,
        dispatch: dispatch_battleplan,
    },
    PacketDescriptor {
        kind: PacketKind::NotifyPlayerLeft,
        name: "notify_player_left",
        flags: HOST_ONLY,
        encode: encode_player_left,
        dispatch: dispatch_player_left,
    },
    PacketDescriptor {
        kind: PacketKind::SetReadyStatus,
        name: "set_ready_status",
        flags: CLIENT,
        encode: encode_ready_status,
        dispatch: dispatch_ready_status,
    },
];

pub fn is_valid_id(id: u16) -> bool {
    (id as usize) < CATALOG.len()
}

/// Direct table lookup. Callers validate with [`is_valid_id`] first.
pub fn get_by_id(id: u16) -> &'static PacketDescriptor {
    &CATALOG[id as usize]
}

/// Ids are `0..N` in table order and names are unique.
pub fn is_dense() -> bool {
    let mut names = HashSet::new();
    CATALOG
        .iter()
        .enumerate()
        .all(|(index, descriptor)| descriptor.kind as usize == index && names.insert(descriptor.name))
}

/// Builds `[u16 id][payload]` for `kind`.
pub fn encode_packet(
    kind: PacketKind,
    argument: &PacketArgument<'_>,
) -> Result<PacketBuilder, PacketError> {
    let mut builder = PacketBuilder::new();
    builder.put_back(&kind.id());
    (kind.descriptor().encode)(argument, &mut builder)?;
    Ok(builder)
}

/// Decodes the kind id of `packet` and runs its dispatch function.
///
/// A host only accepts kinds clients may originate.
pub fn dispatch(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    packet: &[u8],
) -> Result<PacketKind, PacketError> {
    let mut reader = PacketReader::new(packet);
    let id = reader
        .try_read::<u16>()
        .ok_or(PacketError::Malformed("packet id"))?;
    if !is_valid_id(id) {
        return Err(PacketError::UnknownKind(id));
    }

    let descriptor = get_by_id(id);
    if handler.role() == Role::Host && !descriptor.flags.contains(PacketFlags::CLIENT_SEND) {
        return Err(PacketError::NotClientSendable(descriptor.kind));
    }

    (descriptor.dispatch)(handler, sender, &mut reader)?;
    Ok(descriptor.kind)
}

fn read<T: Decode>(reader: &mut PacketReader<'_>, kind: PacketKind) -> Result<T, PacketError> {
    reader
        .try_read::<T>()
        .ok_or_else(|| PacketError::Malformed(kind.name()))
}

/// Reads an inner kind id and checks that clients may send it unwrapped.
fn read_relayed_kind(reader: &mut PacketReader<'_>, relay: PacketKind) -> Result<(), PacketError> {
    let id = read::<u16>(reader, relay)?;
    if !is_valid_id(id) {
        return Err(PacketError::UnknownKind(id));
    }
    check_relayable(get_by_id(id).kind)
}

fn check_relayable(inner: PacketKind) -> Result<(), PacketError> {
    let flags = inner.descriptor().flags;
    if !flags.contains(PacketFlags::CLIENT_SEND) {
        return Err(PacketError::NotClientSendable(inner));
    }
    if flags.contains(PacketFlags::RELAY) {
        return Err(PacketError::NestedRelay(inner));
    }
    Ok(())
}

fn encode_relayed(
    kind: PacketKind,
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    check_relayable(kind)?;
    if argument.kind() != kind {
        return Err(PacketError::ArgumentMismatch(kind));
    }
    builder.put_back(&kind.id());
    (kind.descriptor().encode)(argument, builder)
}

fn encode_retransmit(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::Retransmit {
        client_id,
        kind,
        argument,
    } = argument
    else {
        return Err(PacketError::ArgumentMismatch(PacketKind::Retransmit));
    };
    builder.put_back(client_id);
    encode_relayed(*kind, argument, builder)
}

fn dispatch_retransmit(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let target = read::<u64>(reader, PacketKind::Retransmit)?;
    let start = reader.index();
    read_relayed_kind(reader, PacketKind::Retransmit)?;
    handler.relay_to(sender, target, reader.subspan(start))
}

fn encode_broadcast(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::Broadcast { kind, argument } = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::Broadcast));
    };
    encode_relayed(*kind, argument, builder)
}

fn dispatch_broadcast(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let start = reader.index();
    read_relayed_kind(reader, PacketKind::Broadcast)?;
    handler.relay_broadcast(sender, reader.subspan(start))
}

fn encode_raw(argument: &PacketArgument<'_>, builder: &mut PacketBuilder) -> Result<(), PacketError> {
    let PacketArgument::SendRaw(bytes) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::SendRaw));
    };
    builder.put_back(*bytes);
    Ok(())
}

fn dispatch_raw(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let bytes = read::<Vec<u8>>(reader, PacketKind::SendRaw)?;
    handler.raw_packet(sender, bytes)
}

fn encode_host_session(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::UpdateHostSession(session) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::UpdateHostSession));
    };
    builder.put_back(*session);
    Ok(())
}

fn dispatch_host_session(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let session = read(reader, PacketKind::UpdateHostSession)?;
    handler.host_session(sender, session)
}

fn encode_game_action(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::ExecuteGameAction(action) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::ExecuteGameAction));
    };
    builder.put_back(*action);
    Ok(())
}

fn dispatch_game_action(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let action = read(reader, PacketKind::ExecuteGameAction)?;
    handler.game_action(sender, action)
}

fn encode_chat_message(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::SendChatMessage(log) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::SendChatMessage));
    };
    builder.put_back(*log);
    Ok(())
}

fn dispatch_chat_message(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let log = read(reader, PacketKind::SendChatMessage)?;
    handler.chat_message(sender, log)
}

fn encode_add_chat_group(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::AddChatGroup(clients) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::AddChatGroup));
    };
    builder.put_back(*clients);
    Ok(())
}

fn dispatch_add_chat_group(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let clients = read(reader, PacketKind::AddChatGroup)?;
    handler.chat_group_added(sender, clients)
}

fn encode_modify_chat_group(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::ModifyChatGroup { group, clients } = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::ModifyChatGroup));
    };
    builder.put_back(group);
    builder.put_back(*clients);
    Ok(())
}

fn dispatch_modify_chat_group(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let group = read(reader, PacketKind::ModifyChatGroup)?;
    let clients = read(reader, PacketKind::ModifyChatGroup)?;
    handler.chat_group_modified(sender, group, clients)
}

fn encode_delete_chat_group(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::DeleteChatGroup(group) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::DeleteChatGroup));
    };
    builder.put_back(group);
    Ok(())
}

fn dispatch_delete_chat_group(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let group = read(reader, PacketKind::DeleteChatGroup)?;
    handler.chat_group_deleted(sender, group)
}

fn encode_battleplan(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::SendBattleplan(plan) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::SendBattleplan));
    };
    builder.put_back(*plan);
    Ok(())
}

fn dispatch_battleplan(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let plan = read(reader, PacketKind::SendBattleplan)?;
    handler.battleplan(sender, plan)
}

fn encode_player_left(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::NotifyPlayerLeft(client_id) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::NotifyPlayerLeft));
    };
    builder.put_back(client_id);
    Ok(())
}

fn dispatch_player_left(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let client_id = read(reader, PacketKind::NotifyPlayerLeft)?;
    handler.player_left(sender, client_id)
}

fn encode_ready_status(
    argument: &PacketArgument<'_>,
    builder: &mut PacketBuilder,
) -> Result<(), PacketError> {
    let PacketArgument::SetReadyStatus(ready) = argument else {
        return Err(PacketError::ArgumentMismatch(PacketKind::SetReadyStatus));
    };
    builder.put_back(ready);
    Ok(())
}

fn dispatch_ready_status(
    handler: &mut dyn PacketHandler,
    sender: ClientId,
    reader: &mut PacketReader<'_>,
) -> Result<(), PacketError> {
    let ready = read(reader, PacketKind::SetReadyStatus)?;
    handler.ready_status(sender, ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HostSession;

    #[derive(Default)]
    struct Recorder {
        role: Option<Role>,
        relayed: Vec<(ClientId, Option<ClientId>, Vec<u8>)>,
        raw: Vec<Vec<u8>>,
        ready: Vec<(ClientId, bool)>,
    }

    impl PacketHandler for Recorder {
        fn role(&self) -> Role {
            self.role.unwrap_or(Role::Host)
        }

        fn relay_to(
            &mut self,
            sender: ClientId,
            target: ClientId,
            packet: &[u8],
        ) -> Result<(), PacketError> {
            self.relayed.push((sender, Some(target), packet.to_vec()));
            Ok(())
        }

        fn relay_broadcast(&mut self, sender: ClientId, packet: &[u8]) -> Result<(), PacketError> {
            self.relayed.push((sender, None, packet.to_vec()));
            Ok(())
        }

        fn raw_packet(&mut self, _sender: ClientId, bytes: Vec<u8>) -> Result<(), PacketError> {
            self.raw.push(bytes);
            Ok(())
        }

        fn ready_status(&mut self, sender: ClientId, ready: bool) -> Result<(), PacketError> {
            self.ready.push((sender, ready));
            Ok(())
        }
    }

    #[test]
    fn test_catalog_is_dense() {
        assert!(is_dense());
        assert_eq!(CATALOG.len(), PacketKind::COUNT);
        assert_eq!(PacketKind::from_id(11), Some(PacketKind::SetReadyStatus));
        assert_eq!(PacketKind::from_id(12), None);
        assert!(!is_valid_id(PacketKind::COUNT as u16));
    }

    #[test]
    fn test_client_send_permissions() {
        let host_only = [
            PacketKind::UpdateHostSession,
            PacketKind::ExecuteGameAction,
            PacketKind::NotifyPlayerLeft,
        ];
        for descriptor in &CATALOG {
            assert_eq!(
                descriptor.kind.client_sendable(),
                !host_only.contains(&descriptor.kind),
                "{}",
                descriptor.name
            );
        }
        assert!(PacketKind::Retransmit.descriptor().flags.contains(PacketFlags::RELAY));
    }

    #[test]
    fn test_targeted_relay_forwards_inner_packet() {
        let inner = PacketArgument::SendRaw(b"abc").retransmit_to(4);
        let packet = encode_packet(PacketKind::Retransmit, &inner).unwrap();

        let mut recorder = Recorder::default();
        assert_eq!(
            dispatch(&mut recorder, 2, packet.as_slice()).unwrap(),
            PacketKind::Retransmit
        );

        let expected = encode_packet(PacketKind::SendRaw, &PacketArgument::SendRaw(b"abc")).unwrap();
        assert_eq!(recorder.relayed, vec![(2, Some(4), expected.into_vec())]);
    }

    #[test]
    fn test_relay_may_not_wrap_relay() {
        let nested = PacketArgument::SendRaw(b"abc").retransmit_to(4).broadcast();
        assert_eq!(
            encode_packet(PacketKind::Broadcast, &nested).unwrap_err(),
            PacketError::NestedRelay(PacketKind::Retransmit)
        );

        for (outer, inner) in [
            (PacketKind::Broadcast, PacketKind::Retransmit),
            (PacketKind::Broadcast, PacketKind::Broadcast),
            (PacketKind::Retransmit, PacketKind::Broadcast),
        ] {
            let mut builder = PacketBuilder::new();
            builder.put_back(&outer.id());
            if outer == PacketKind::Retransmit {
                builder.put_back(&3u64);
            }
            builder.put_back(&inner.id());
            builder.put_back(&PacketKind::SendRaw.id());
            let mut recorder = Recorder::default();
            assert_eq!(
                dispatch(&mut recorder, 1, builder.as_slice()).unwrap_err(),
                PacketError::NestedRelay(inner)
            );
            assert!(recorder.relayed.is_empty());
        }
    }

    #[test]
    fn test_broadcast_relay_rejects_host_only_kind() {
        let session = HostSession::new("x");
        let argument = PacketArgument::UpdateHostSession(&session).broadcast();
        assert_eq!(
            encode_packet(PacketKind::Broadcast, &argument).unwrap_err(),
            PacketError::NotClientSendable(PacketKind::UpdateHostSession)
        );

        // Forged on the wire: broadcast wrapping a host-only id.
        let mut builder = PacketBuilder::new();
        builder.put_back(&PacketKind::Broadcast.id());
        builder.put_back(&PacketKind::UpdateHostSession.id());
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatch(&mut recorder, 1, builder.as_slice()).unwrap_err(),
            PacketError::NotClientSendable(PacketKind::UpdateHostSession)
        );
        assert!(recorder.relayed.is_empty());
    }

    #[test]
    fn test_host_drops_host_only_kinds() {
        let packet = encode_packet(PacketKind::NotifyPlayerLeft, &PacketArgument::NotifyPlayerLeft(3))
            .unwrap();
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatch(&mut recorder, 1, packet.as_slice()).unwrap_err(),
            PacketError::NotClientSendable(PacketKind::NotifyPlayerLeft)
        );
    }

    #[test]
    fn test_unhandled_kind_is_wrong_role() {
        let mut recorder = Recorder {
            role: Some(Role::Client),
            ..Default::default()
        };
        let packet = encode_packet(PacketKind::NotifyPlayerLeft, &PacketArgument::NotifyPlayerLeft(3))
            .unwrap();
        assert_eq!(
            dispatch(&mut recorder, 0, packet.as_slice()).unwrap_err(),
            PacketError::WrongRole(PacketKind::NotifyPlayerLeft)
        );
    }

    #[test]
    fn test_unknown_and_malformed() {
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatch(&mut recorder, 0, &[]).unwrap_err(),
            PacketError::Malformed("packet id")
        );

        let mut builder = PacketBuilder::new();
        builder.put_back(&99u16);
        assert_eq!(
            dispatch(&mut recorder, 0, builder.as_slice()).unwrap_err(),
            PacketError::UnknownKind(99)
        );

        let mut builder = PacketBuilder::new();
        builder.put_back(&PacketKind::SetReadyStatus.id());
        assert_eq!(
            dispatch(&mut recorder, 0, builder.as_slice()).unwrap_err(),
            PacketError::Malformed("set_ready_status")
        );
    }

    #[test]
    fn test_argument_mismatch() {
        assert_eq!(
            encode_packet(PacketKind::SendRaw, &PacketArgument::SetReadyStatus(true)).unwrap_err(),
            PacketError::ArgumentMismatch(PacketKind::SendRaw)
        );
    }

    #[test]
    fn test_ready_status_dispatch() {
        let packet =
            encode_packet(PacketKind::SetReadyStatus, &PacketArgument::SetReadyStatus(true)).unwrap();
        let mut recorder = Recorder::default();
        dispatch(&mut recorder, 5, packet.as_slice()).unwrap();
        assert_eq!(recorder.ready, vec![(5, true)]);
    }
}
