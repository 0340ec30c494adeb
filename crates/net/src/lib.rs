pub mod chat;
pub mod codec;
pub mod container;
pub mod multiplayer;
pub mod net;
pub mod packet;
pub mod session;

pub use chat::{ChatError, ChatGroup, ChatLog, ChatMessageLog, GroupIndex, MessageData, MessageType};
pub use codec::{Decode, Encode, Endian, FixedPoint, Timespan};
pub use container::{Cursor, RingBuffer};
pub use multiplayer::{
    CacheError, ClientConfig, ClientEvent, ClientManager, ClientState, DisconnectReason,
    HostConfig, HostEvent, HostManager, NetError, PacketCache,
};
pub use net::{
    AckEndpoint, AddressFamily, ClientId, DEFAULT_PORT, DEFAULT_TICK_RATE, EndpointConfig,
    HOST_ID, INVALID_CLIENT_ID, MAX_PACKET_SIZE, MemoryNetwork, MemoryTransport, NetworkStats,
    PacketLossSimulation, ReliableEndpoint, ResolveError, ResolveStatus, Resolver, Sequence,
    Transport, TransportError, UdpTransport,
};
pub use packet::{
    PacketArgument, PacketBuilder, PacketError, PacketHandler, PacketKind, PacketReader, Role,
};
pub use session::{Battleplan, GameAction, GameActionArgument, HostSession, Player};
