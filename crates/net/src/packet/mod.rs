mod argument;
mod builder;
pub mod catalog;
mod handler;
mod reader;

pub use argument::PacketArgument;
pub use builder::PacketBuilder;
pub use catalog::{PacketDescriptor, PacketFlags, PacketKind, dispatch, encode_packet};
pub use handler::{PacketHandler, Role};
pub use reader::PacketReader;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("unknown packet kind {0}")]
    UnknownKind(u16),
    #[error("{0:?} may not be sent by clients")]
    NotClientSendable(PacketKind),
    #[error("{0:?} may not be wrapped in another relay")]
    NestedRelay(PacketKind),
    #[error("argument does not match {0:?}")]
    ArgumentMismatch(PacketKind),
    #[error("malformed {0}")]
    Malformed(&'static str),
    #[error("{0:?} is not handled by this role")]
    WrongRole(PacketKind),
    #[error("packet rejected: {0}")]
    Rejected(String),
}
