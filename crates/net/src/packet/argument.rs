use crate::chat::{ChatMessageLog, GroupIndex};
use crate::net::ClientId;
use crate::session::{Battleplan, GameAction, HostSession};

use super::PacketKind;

/// Borrowed payload for one packet kind. Relay variants nest the argument of
/// the packet they carry.
#[derive(Debug, Clone)]
pub enum PacketArgument<'a> {
    Retransmit {
        client_id: ClientId,
        kind: PacketKind,
        argument: Box<PacketArgument<'a>>,
    },
    Broadcast {
        kind: PacketKind,
        argument: Box<PacketArgument<'a>>,
    },
    SendRaw(&'a [u8]),
    UpdateHostSession(&'a HostSession),
    ExecuteGameAction(&'a GameAction),
    SendChatMessage(&'a ChatMessageLog),
    AddChatGroup(&'a [ClientId]),
    ModifyChatGroup {
        group: GroupIndex,
        clients: &'a [ClientId],
    },
    DeleteChatGroup(GroupIndex),
    SendBattleplan(&'a Battleplan),
    NotifyPlayerLeft(ClientId),
    SetReadyStatus(bool),
}

impl<'a> PacketArgument<'a> {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Retransmit { .. } => PacketKind::Retransmit,
            Self::Broadcast { .. } => PacketKind::Broadcast,
            Self::SendRaw(_) => PacketKind::SendRaw,
            Self::UpdateHostSession(_) => PacketKind::UpdateHostSession,
            Self::ExecuteGameAction(_) => PacketKind::ExecuteGameAction,
            Self::SendChatMessage(_) => PacketKind::SendChatMessage,
            Self::AddChatGroup(_) => PacketKind::AddChatGroup,
            Self::ModifyChatGroup { .. } => PacketKind::ModifyChatGroup,
            Self::DeleteChatGroup(_) => PacketKind::DeleteChatGroup,
            Self::SendBattleplan(_) => PacketKind::SendBattleplan,
            Self::NotifyPlayerLeft(_) => PacketKind::NotifyPlayerLeft,
            Self::SetReadyStatus(_) => PacketKind::SetReadyStatus,
        }
    }

    /// Wraps `self` in a targeted relay addressed to `client_id`.
    pub fn retransmit_to(self, client_id: ClientId) -> Self {
        Self::Retransmit {
            client_id,
            kind: self.kind(),
            argument: Box::new(self),
        }
    }

    /// Wraps `self` in a broadcast relay.
    pub fn broadcast(self) -> Self {
        Self::Broadcast {
            kind: self.kind(),
            argument: Box::new(self),
        }
    }
}
