pub const MAX_PACKET_SIZE: usize = 1536;
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// First payload a client sends; the host answers with the assigned id.
pub const HANDSHAKE_BYTE: u8 = 1;

pub type ClientId = u64;
pub type Sequence = u16;

pub const HOST_ID: ClientId = 0;
pub const INVALID_CLIENT_ID: ClientId = u64::MAX - 1;
/// Client ids travel as u16; this wire value stands for `INVALID_CLIENT_ID`.
pub const INVALID_WIRE_CLIENT_ID: u16 = u16::MAX - 1;

const SEQUENCE_WRAP_THRESHOLD: Sequence = Sequence::MAX / 2;
const ACK_VALID_FLAG: u8 = 0x80;

#[inline]
pub fn sequence_greater_than(s1: Sequence, s2: Sequence) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatagramKind {
    Payload = 1,
    Ack = 2,
    /// Payload carrying the host's answer to a handshake.
    HandshakeReply = 3,
}

/// Framing prepended by the reliable endpoint to every datagram:
/// `[u8 kind][u16 sequence][u16 ack][u32 ack_bits]`, always little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub kind: DatagramKind,
    pub sequence: Sequence,
    /// Latest received sequence and bitfield; `None` until anything arrived.
    pub ack: Option<(Sequence, u32)>,
}

impl DatagramHeader {
    pub const SIZE: usize = 9;

    pub fn payload(sequence: Sequence, ack: Option<(Sequence, u32)>) -> Self {
        Self {
            kind: DatagramKind::Payload,
            sequence,
            ack,
        }
    }

    pub fn handshake_reply(sequence: Sequence, ack: Option<(Sequence, u32)>) -> Self {
        Self {
            kind: DatagramKind::HandshakeReply,
            sequence,
            ack,
        }
    }

    pub fn ack_only(ack: Sequence, ack_bitfield: u32) -> Self {
        Self {
            kind: DatagramKind::Ack,
            sequence: 0,
            ack: Some((ack, ack_bitfield)),
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let (ack, ack_bitfield, flag) = match self.ack {
            Some((ack, bits)) => (ack, bits, ACK_VALID_FLAG),
            None => (0, 0, 0),
        };
        out.push(self.kind as u8 | flag);
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&ack.to_le_bytes());
        out.extend_from_slice(&ack_bitfield.to_le_bytes());
    }

    pub fn read(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return None;
        }
        let kind = match data[0] & !ACK_VALID_FLAG {
            1 => DatagramKind::Payload,
            2 => DatagramKind::Ack,
            3 => DatagramKind::HandshakeReply,
            _ => return None,
        };
        let ack = (data[0] & ACK_VALID_FLAG != 0).then(|| {
            (
                u16::from_le_bytes([data[3], data[4]]),
                u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            )
        });
        if kind == DatagramKind::Ack && ack.is_none() {
            return None;
        }
        let header = Self {
            kind,
            sequence: u16::from_le_bytes([data[1], data[2]]),
            ack,
        };
        Some((header, &data[Self::SIZE..]))
    }
}
