mod endpoint;
mod memory;
mod protocol;
mod resolver;
mod stats;
mod tracking;
mod transport;

pub use endpoint::{
    AckEndpoint, DeliverFn, EndpointConfig, EndpointError, Received, ReliableEndpoint, TransmitFn,
};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use protocol::{
    ClientId, DEFAULT_PORT, DEFAULT_TICK_RATE, DatagramHeader, DatagramKind, HANDSHAKE_BYTE,
    HOST_ID, INVALID_CLIENT_ID, INVALID_WIRE_CLIENT_ID, MAX_PACKET_SIZE, Sequence,
    sequence_greater_than,
};
pub use resolver::{AddressFamily, MAX_QUERIES, RequestId, ResolveError, ResolveStatus, Resolver};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use tracking::{AckTracker, DEFAULT_ACK_WINDOW, DEFAULT_RECEIVED_WINDOW, ReceiveTracker};
pub use transport::{MAX_DATAGRAM_SIZE, Transport, TransportError, UdpTransport};
