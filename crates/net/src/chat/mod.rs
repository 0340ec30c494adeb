//! Chat messages and chat groups.
//!
//! Messages and group changes travel as broadcast relays; every client keeps
//! its own [`ChatLog`] and applies group changes as they arrive, including
//! its own, so group indices agree everywhere.

mod message;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::net::ClientId;

pub use message::{ChatMessageLog, MessageData, MessageType};

pub type GroupIndex = u64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("unknown chat group {0}")]
    UnknownGroup(GroupIndex),
    #[error("message timestamp {timestamp} lies in the future")]
    FutureTimestamp { timestamp: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatGroup {
    pub index: GroupIndex,
    pub clients: Vec<ClientId>,
}

impl ChatGroup {
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains(&client_id)
    }
}

#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessageLog>,
    groups: Vec<Option<ChatGroup>>,
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessageLog] {
        &self.messages
    }

    /// Records a locally authored message stamped with the current time.
    pub fn log_message(&mut self, from_id: ClientId, data: MessageData) -> &ChatMessageLog {
        let index = self.messages.len();
        self.messages.push(ChatMessageLog {
            from_id,
            data,
            timestamp: now_millis(),
        });
        &self.messages[index]
    }

    /// Applies the receipt rules to a message that arrived from the network.
    /// Returns `None` for the sender's own echo and for messages addressed to
    /// someone else.
    pub fn receive_message(
        &mut self,
        own_id: ClientId,
        log: ChatMessageLog,
    ) -> Result<Option<&ChatMessageLog>, ChatError> {
        if log.from_id == own_id {
            return Ok(None);
        }
        if log.timestamp > now_millis() {
            return Err(ChatError::FutureTimestamp {
                timestamp: log.timestamp,
            });
        }

        let addressed = match log.data.kind {
            MessageType::Public => true,
            MessageType::Private => log.data.target == own_id,
            MessageType::Group => self
                .group(log.data.target)
                .is_some_and(|group| group.contains(own_id)),
            MessageType::None => false,
        };
        if !addressed {
            return Ok(None);
        }

        let index = self.messages.len();
        self.messages.push(log);
        Ok(Some(&self.messages[index]))
    }

    pub fn group(&self, index: GroupIndex) -> Option<&ChatGroup> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.groups.get(index))
            .and_then(Option::as_ref)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ChatGroup> {
        self.groups.iter().flatten()
    }

    /// Index the next created group will receive.
    pub fn next_group_index(&self) -> GroupIndex {
        self.groups.len() as GroupIndex
    }

    pub fn check_group(&self, index: GroupIndex) -> Result<&ChatGroup, ChatError> {
        self.group(index).ok_or(ChatError::UnknownGroup(index))
    }

    pub fn create_group(&mut self, clients: Vec<ClientId>) -> GroupIndex {
        let index = self.next_group_index();
        self.groups.push(Some(ChatGroup { index, clients }));
        index
    }

    /// Replaces the members of a group, returning the previous members.
    pub fn set_group(
        &mut self,
        index: GroupIndex,
        clients: Vec<ClientId>,
    ) -> Result<Vec<ClientId>, ChatError> {
        let group = usize::try_from(index)
            .ok()
            .and_then(|slot| self.groups.get_mut(slot))
            .and_then(Option::as_mut)
            .ok_or(ChatError::UnknownGroup(index))?;
        Ok(std::mem::replace(&mut group.clients, clients))
    }

    /// Deletes a group. Its slot stays reserved so later indices do not move.
    pub fn delete_group(&mut self, index: GroupIndex) -> Result<ChatGroup, ChatError> {
        usize::try_from(index)
            .ok()
            .and_then(|slot| self.groups.get_mut(slot))
            .and_then(Option::take)
            .ok_or(ChatError::UnknownGroup(index))
    }
}
