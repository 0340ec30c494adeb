use crate::chat::{ChatMessageLog, GroupIndex};
use crate::net::ClientId;
use crate::session::{Battleplan, GameAction, HostSession};

use super::{PacketError, PacketKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

/// Receiving side of the catalog. Each method handles one packet kind after
/// its payload has been decoded; kinds a role does not handle keep the
/// default, which rejects the packet.
pub trait PacketHandler {
    fn role(&self) -> Role;

    /// Targeted relay; `packet` starts at the inner kind id.
    fn relay_to(
        &mut self,
        _sender: ClientId,
        _target: ClientId,
        _packet: &[u8],
    ) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::Retransmit))
    }

    /// Broadcast relay; `packet` starts at the inner kind id.
    fn relay_broadcast(&mut self, _sender: ClientId, _packet: &[u8]) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::Broadcast))
    }

    fn raw_packet(&mut self, _sender: ClientId, _bytes: Vec<u8>) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::SendRaw))
    }

    fn host_session(&mut self, _sender: ClientId, _session: HostSession) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::UpdateHostSession))
    }

    fn game_action(&mut self, _sender: ClientId, _action: GameAction) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::ExecuteGameAction))
    }

    fn chat_message(&mut self, _sender: ClientId, _log: ChatMessageLog) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::SendChatMessage))
    }

    fn chat_group_added(
        &mut self,
        _sender: ClientId,
        _clients: Vec<ClientId>,
    ) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::AddChatGroup))
    }

    fn chat_group_modified(
        &mut self,
        _sender: ClientId,
        _group: GroupIndex,
        _clients: Vec<ClientId>,
    ) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::ModifyChatGroup))
    }

    fn chat_group_deleted(&mut self, _sender: ClientId, _group: GroupIndex) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::DeleteChatGroup))
    }

    fn battleplan(&mut self, _sender: ClientId, _plan: Battleplan) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::SendBattleplan))
    }

    fn player_left(&mut self, _sender: ClientId, _client_id: ClientId) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::NotifyPlayerLeft))
    }

    fn ready_status(&mut self, _sender: ClientId, _ready: bool) -> Result<(), PacketError> {
        Err(PacketError::WrongRole(PacketKind::SetReadyStatus))
    }
}
