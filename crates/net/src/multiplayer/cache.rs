use std::collections::HashMap;
use std::fmt;

use crate::container::{Cursor, RingBuffer};
use crate::net::{
    ClientId, EndpointError, MAX_PACKET_SIZE, ReliableEndpoint, Sequence, TransmitFn,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("unknown peer {0}")]
    UnknownPeer(ClientId),
    #[error("no cache entry for sequence {0}")]
    UnknownSequence(Sequence),
    #[error("cached bytes were evicted")]
    Evicted,
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("empty payload")]
    Empty,
}

/// How a cached payload is marked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Packet,
    HandshakeReply,
}

/// Byte range of one cached payload. Goes stale once the ring buffer evicts
/// the bytes it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub begin: Cursor,
    pub end: Cursor,
    /// Kept so a retransmission is marked like the original send.
    pub mode: SendMode,
}

impl CacheEntry {
    pub fn as_handshake_reply(self) -> Self {
        Self {
            mode: SendMode::HandshakeReply,
            ..self
        }
    }
}

/// Every payload a manager sent, newest last, overwriting the oldest bytes
/// once full.
pub struct PacketCache {
    buffer: RingBuffer<u8>,
}

impl fmt::Debug for PacketCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl PacketCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RingBuffer::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Checks a payload against the send limits without caching it.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), CacheError> {
        if bytes.is_empty() {
            return Err(CacheError::Empty);
        }
        let max = MAX_PACKET_SIZE.min(self.capacity());
        if bytes.len() > max {
            return Err(CacheError::TooLarge {
                size: bytes.len(),
                max,
            });
        }
        Ok(())
    }

    pub fn add(&mut self, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        self.validate(bytes)?;
        let begin = self.buffer.append(bytes);
        Ok(CacheEntry {
            begin,
            end: self.buffer.end(),
            mode: SendMode::Packet,
        })
    }

    pub fn get(&self, entry: CacheEntry) -> Result<Vec<u8>, CacheError> {
        self.buffer
            .copy_range(entry.begin, entry.end)
            .ok_or(CacheError::Evicted)
    }

    pub fn contains(&self, entry: CacheEntry) -> bool {
        self.buffer.contains_range(entry.begin, entry.end)
    }
}

/// Cache entries of one peer, keyed by the sequence they were sent under.
#[derive(Debug, Default)]
pub struct SequenceCache {
    entries: HashMap<Sequence, CacheEntry>,
}

impl SequenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry previously stored under `sequence`, which after a
    /// wrap is 65536 sends old.
    pub fn insert(&mut self, sequence: Sequence, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(sequence, entry)
    }

    pub fn get(&self, sequence: Sequence) -> Option<CacheEntry> {
        self.entries.get(&sequence).copied()
    }

    pub fn remove(&mut self, sequence: Sequence) -> Option<CacheEntry> {
        self.entries.remove(&sequence)
    }

    pub fn contains(&self, sequence: Sequence) -> bool {
        self.entries.contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Records `entry` under the endpoint's next sequence, then sends `payload`.
///
/// The entry exists before the datagram leaves. If the send fails the entry
/// is withdrawn (restoring whatever it replaced) and the sequence stays
/// unused.
pub fn transmit_cached<E: ReliableEndpoint>(
    endpoint: &mut E,
    entries: &mut SequenceCache,
    entry: CacheEntry,
    payload: &[u8],
    transmit: &mut TransmitFn<'_>,
) -> Result<Sequence, EndpointError> {
    let sequence = endpoint.next_sequence();
    let previous = entries.insert(sequence, entry);
    if previous.is_some() {
        log::debug!("sequence {} wrapped onto an old cache entry", sequence);
    }

    let sent = match entry.mode {
        SendMode::Packet => endpoint.send_packet(payload, transmit),
        SendMode::HandshakeReply => endpoint.send_handshake_reply(payload, transmit),
    };
    match sent {
        Ok(sent) => {
            debug_assert_eq!(sent, sequence);
            Ok(sent)
        }
        Err(e) => {
            entries.remove(sequence);
            if let Some(previous) = previous {
                entries.insert(sequence, previous);
            }
            Err(e)
        }
    }
}

/// Drains the endpoint's acknowledged sequences, optionally forgetting their
/// cache entries. Returns how many acks named a sequence with no entry.
pub fn settle_acknowledged<E: ReliableEndpoint>(
    endpoint: &mut E,
    entries: &mut SequenceCache,
    prune: bool,
) -> usize {
    let mut unknown = 0;
    for &sequence in endpoint.acknowledged_sequences() {
        if !entries.contains(sequence) {
            log::error!("acknowledged sequence {} has no cache entry", sequence);
            unknown += 1;
        } else if prune {
            entries.remove(sequence);
        }
    }
    endpoint.clear_acknowledged_sequences();
    unknown
}
