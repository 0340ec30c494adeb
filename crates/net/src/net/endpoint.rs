use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::protocol::{DatagramHeader, DatagramKind, MAX_PACKET_SIZE, Sequence};
use super::stats::NetworkStats;
use super::tracking::{AckTracker, DEFAULT_ACK_WINDOW, DEFAULT_RECEIVED_WINDOW, ReceiveTracker};
use super::transport::TransportError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub max_packet_size: usize,
    /// Sent packets tracked for acknowledgement.
    pub ack_window: usize,
    /// Received sequences remembered for duplicate filtering.
    pub received_window: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            ack_window: DEFAULT_ACK_WINDOW,
            received_window: DEFAULT_RECEIVED_WINDOW,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("malformed datagram")]
    Malformed,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Delivered(Sequence),
    /// Delivered, and marked by the sender as a handshake reply.
    HandshakeReply(Sequence),
    Duplicate(Sequence),
    AckOnly,
}

pub type TransmitFn<'a> = dyn FnMut(&[u8]) -> Result<(), TransportError> + 'a;
pub type DeliverFn<'a> = dyn FnMut(Sequence, &[u8]) + 'a;

/// Per-peer sequencing and acknowledgement state. The endpoint never owns a
/// socket; datagrams leave through the `transmit` callback so one socket can
/// serve every peer.
pub trait ReliableEndpoint {
    /// Sequence the next successful `send_packet` will use.
    fn next_sequence(&self) -> Sequence;

    /// Frames `payload` and hands the datagram to `transmit`. The sequence is
    /// consumed only if `transmit` succeeds.
    fn send_packet(
        &mut self,
        payload: &[u8],
        transmit: &mut TransmitFn<'_>,
    ) -> Result<Sequence, EndpointError>;

    /// `send_packet` for the host's answer to a handshake. The receiver sees
    /// [`Received::HandshakeReply`] instead of [`Received::Delivered`].
    fn send_handshake_reply(
        &mut self,
        payload: &[u8],
        transmit: &mut TransmitFn<'_>,
    ) -> Result<Sequence, EndpointError>;

    /// Unframes `datagram`, records acknowledgements, and passes a new payload
    /// to `deliver`. Duplicates are acknowledged again but not delivered.
    fn receive_packet(
        &mut self,
        datagram: &[u8],
        deliver: &mut DeliverFn<'_>,
    ) -> Result<Received, EndpointError>;

    /// Own sequences the peer acknowledged since the last clear.
    fn acknowledged_sequences(&self) -> &[Sequence];

    fn clear_acknowledged_sequences(&mut self);

    /// Ack-only datagram, if something was received that has not been
    /// acknowledged by an outgoing payload yet.
    fn take_ack_datagram(&mut self) -> Option<Vec<u8>>;

    /// Ack-only datagram restating the current receive state, for keeping an
    /// idle link alive. `None` until something was received.
    fn keepalive_datagram(&self) -> Option<Vec<u8>>;

    fn stale_sequences(&self, older_than: Duration) -> Vec<Sequence>;

    fn stats(&self) -> &NetworkStats;
}

#[derive(Debug)]
pub struct AckEndpoint {
    config: EndpointConfig,
    next_sequence: Sequence,
    ack_tracker: AckTracker,
    receive_tracker: ReceiveTracker,
    acknowledged: Vec<Sequence>,
    ack_pending: bool,
    stats: NetworkStats,
}

impl Default for AckEndpoint {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl AckEndpoint {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            ack_tracker: AckTracker::new(config.ack_window),
            receive_tracker: ReceiveTracker::new(config.received_window),
            config,
            next_sequence: 0,
            acknowledged: Vec::new(),
            ack_pending: false,
            stats: NetworkStats::default(),
        }
    }

    pub fn has_received(&self) -> bool {
        self.receive_tracker.has_received()
    }

    fn ack_data(&self) -> Option<(Sequence, u32)> {
        self.receive_tracker
            .has_received()
            .then(|| self.receive_tracker.ack_data())
    }

    fn send_framed(
        &mut self,
        kind: DatagramKind,
        payload: &[u8],
        transmit: &mut TransmitFn<'_>,
    ) -> Result<Sequence, EndpointError> {
        if payload.len() > self.config.max_packet_size {
            self.stats.packets_too_large += 1;
            return Err(EndpointError::TooLarge {
                size: payload.len(),
                max: self.config.max_packet_size,
            });
        }

        let sequence = self.next_sequence;
        let mut datagram = Vec::with_capacity(DatagramHeader::SIZE + payload.len());
        let header = DatagramHeader {
            kind,
            sequence,
            ack: self.ack_data(),
        };
        header.write(&mut datagram);
        datagram.extend_from_slice(payload);

        transmit(&datagram)?;

        self.next_sequence = sequence.wrapping_add(1);
        self.ack_pending = false;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += datagram.len() as u64;

        let dropped = self.ack_tracker.track_packet(sequence);
        if dropped > 0 {
            self.stats.packets_stale += dropped as u64;
            self.stats.update_loss();
        }

        log::debug!("sent sequence {} ({} bytes)", sequence, payload.len());
        Ok(sequence)
    }
}

impl ReliableEndpoint for AckEndpoint {
    fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    fn send_packet(
        &mut self,
        payload: &[u8],
        transmit: &mut TransmitFn<'_>,
    ) -> Result<Sequence, EndpointError> {
        self.send_framed(DatagramKind::Payload, payload, transmit)
    }

    fn send_handshake_reply(
        &mut self,
        payload: &[u8],
        transmit: &mut TransmitFn<'_>,
    ) -> Result<Sequence, EndpointError> {
        self.send_framed(DatagramKind::HandshakeReply, payload, transmit)
    }

    fn receive_packet(
        &mut self,
        datagram: &[u8],
        deliver: &mut DeliverFn<'_>,
    ) -> Result<Received, EndpointError> {
        let Some((header, payload)) = DatagramHeader::read(datagram) else {
            self.stats.packets_invalid += 1;
            return Err(EndpointError::Malformed);
        };

        if let Some((ack, ack_bitfield)) = header.ack {
            let acked = self.ack_tracker.process_ack(ack, ack_bitfield);
            if !acked.is_empty() {
                self.stats.packets_acked += acked.len() as u64;
                self.stats.rtt_ms = self.ack_tracker.srtt();
                self.stats.rtt_variance = self.ack_tracker.rtt_var();
                self.stats.update_loss();
                self.acknowledged.extend(acked);
            }
        }

        if header.kind == DatagramKind::Ack {
            return Ok(Received::AckOnly);
        }

        if payload.len() > self.config.max_packet_size {
            self.stats.packets_too_large += 1;
            return Err(EndpointError::TooLarge {
                size: payload.len(),
                max: self.config.max_packet_size,
            });
        }

        self.stats.packets_received += 1;
        self.stats.bytes_received += datagram.len() as u64;
        self.ack_pending = true;

        if !self.receive_tracker.record_received(header.sequence) {
            self.stats.packets_duplicate += 1;
            log::debug!("duplicate sequence {}", header.sequence);
            return Ok(Received::Duplicate(header.sequence));
        }

        deliver(header.sequence, payload);
        if header.kind == DatagramKind::HandshakeReply {
            Ok(Received::HandshakeReply(header.sequence))
        } else {
            Ok(Received::Delivered(header.sequence))
        }
    }

    fn acknowledged_sequences(&self) -> &[Sequence] {
        &self.acknowledged
    }

    fn clear_acknowledged_sequences(&mut self) {
        self.acknowledged.clear();
    }

    fn take_ack_datagram(&mut self) -> Option<Vec<u8>> {
        if !self.ack_pending {
            return None;
        }
        let (ack, ack_bitfield) = self.ack_data()?;
        self.ack_pending = false;

        let mut datagram = Vec::with_capacity(DatagramHeader::SIZE);
        DatagramHeader::ack_only(ack, ack_bitfield).write(&mut datagram);
        Some(datagram)
    }

    fn keepalive_datagram(&self) -> Option<Vec<u8>> {
        let (ack, ack_bitfield) = self.ack_data()?;
        let mut datagram = Vec::with_capacity(DatagramHeader::SIZE);
        DatagramHeader::ack_only(ack, ack_bitfield).write(&mut datagram);
        Some(datagram)
    }

    fn stale_sequences(&self, older_than: Duration) -> Vec<Sequence> {
        self.ack_tracker.stale(older_than)
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}
