use std::net::SocketAddr;

use crate::chat::{ChatMessageLog, GroupIndex};
use crate::net::ClientId;
use crate::packet::PacketError;
use crate::session::{Battleplan, GameAction};

#[derive(Debug, Clone)]
pub enum HostEvent {
    PeerPending {
        addr: SocketAddr,
    },
    ClientConnected {
        client_id: ClientId,
        addr: SocketAddr,
    },
    ClientDisconnected {
        client_id: ClientId,
        reason: DisconnectReason,
    },
    HandshakeRejected {
        addr: SocketAddr,
        reason: String,
    },
    PacketDropped {
        client_id: ClientId,
        error: PacketError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected {
        client_id: ClientId,
    },
    /// The host kicked this client or stopped answering. The client is
    /// closed by the time this is drained.
    Disconnected {
        reason: DisconnectReason,
    },
    SessionUpdated,
    RawPacket {
        bytes: Vec<u8>,
    },
    ChatMessage(ChatMessageLog),
    ChatGroupCreated {
        group: GroupIndex,
    },
    ChatGroupModified {
        group: GroupIndex,
        previous: Vec<ClientId>,
    },
    ChatGroupDeleted {
        group: GroupIndex,
    },
    GameAction(GameAction),
    Battleplan(Battleplan),
    PlayerLeft {
        client_id: ClientId,
    },
    PacketDropped {
        error: PacketError,
    },
}
