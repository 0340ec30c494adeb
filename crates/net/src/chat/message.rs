use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Decoder, Encode, Encoder, Endian};
use crate::net::{ClientId, HOST_ID};

use super::GroupIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    #[default]
    None = 0,
    Private = 1,
    Group = 2,
    Public = 3,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Private),
            2 => Some(Self::Group),
            3 => Some(Self::Public),
            _ => None,
        }
    }
}

/// Message body. `target` is the recipient for private messages and the
/// group index for group messages; public messages carry no target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    pub kind: MessageType,
    pub message: String,
    pub target: u64,
}

impl MessageData {
    pub fn public(message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Public,
            message: message.into(),
            target: HOST_ID,
        }
    }

    pub fn private(to: ClientId, message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Private,
            message: message.into(),
            target: to,
        }
    }

    pub fn group(group: GroupIndex, message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Group,
            message: message.into(),
            target: group,
        }
    }
}

impl Encode for MessageData {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&(self.kind as u8));
        if self.kind != MessageType::Public {
            // Targets travel as 16 bits.
            encoder.put(&(self.target as u16));
        }
        encoder.put(&self.message);
        encoder.finish()
    }
}

impl Decode for MessageData {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let kind = MessageType::from_u8(decoder.take()?)?;
        let target = if kind == MessageType::Public {
            HOST_ID
        } else {
            u64::from(decoder.take::<u16>()?)
        };
        let message = decoder.take()?;
        decoder.finish(MessageData {
            kind,
            message,
            target,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageLog {
    pub from_id: ClientId,
    pub data: MessageData,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Encode for ChatMessageLog {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder
            .put(&(self.from_id as u16))
            .put(&self.data)
            .put(&self.timestamp);
        encoder.finish()
    }
}

impl Decode for ChatMessageLog {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let log = ChatMessageLog {
            from_id: u64::from(decoder.take::<u16>()?),
            data: decoder.take()?,
            timestamp: decoder.take()?,
        };
        decoder.finish(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_bytes;

    #[test]
    fn test_public_message_has_no_target() {
        let bytes = to_bytes(&MessageData::public("yo"), Endian::Little);
        assert_eq!(bytes, vec![3, 2, 0, 0, 0, b'y', b'o']);
    }

    #[test]
    fn test_private_message_layout() {
        let bytes = to_bytes(&MessageData::private(5, "x"), Endian::Little);
        assert_eq!(bytes, vec![1, 5, 0, 1, 0, 0, 0, b'x']);
    }

    #[test]
    fn test_log_round_trip() {
        let log = ChatMessageLog {
            from_id: 7,
            data: MessageData::group(2, "plan"),
            timestamp: 1_700_000_000_000,
        };
        let bytes = to_bytes(&log, Endian::Big);
        assert_eq!(bytes.len(), 2 + (1 + 2 + 4 + 4) + 8);
        assert_eq!(ChatMessageLog::decode(&bytes, Endian::Big), Some((log, bytes.len())));
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        assert_eq!(MessageData::decode(&[9, 0, 0, 0, 0, 0], Endian::Little), None);
    }
}
