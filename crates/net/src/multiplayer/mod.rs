//! Host and client managers.
//!
//! Both sides keep every payload they send in a [`PacketCache`] and remember,
//! per peer, which cached bytes went out under which sequence, so any
//! sequence can be looked up or resent later.

mod cache;
mod client;
mod config;
mod events;
mod host;
mod peers;

pub use cache::{
    CacheEntry, CacheError, PacketCache, SendMode, SequenceCache, settle_acknowledged,
    transmit_cached,
};
pub use client::{ClientManager, ClientState};
pub use config::{ClientConfig, DEFAULT_CACHE_CAPACITY, EndpointConfig, HostConfig};
pub use events::{ClientEvent, DisconnectReason, HostEvent};
pub use host::HostManager;
pub use peers::{Peer, PeerState, PeerTable};

use crate::chat::ChatError;
use crate::net::{ClientId, EndpointError, TransportError};
use crate::packet::PacketError;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("manager is closed")]
    Closed,
    #[error("not connected to a host")]
    NotConnected,
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("host assigned an invalid client id")]
    InvalidClientId,
    #[error("send failed for clients {failed:?}")]
    PartialBroadcast { failed: Vec<ClientId> },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NetError {
    /// The underlying transport is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            NetError::Closed
                | NetError::Transport(TransportError::Closed)
                | NetError::Endpoint(EndpointError::Transport(TransportError::Closed))
        )
    }
}
