use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::protocol::{Sequence, sequence_greater_than};

pub const DEFAULT_ACK_WINDOW: usize = 256;
pub const DEFAULT_RECEIVED_WINDOW: usize = 128;

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub sequence: Sequence,
    pub send_time: Instant,
    pub acked: bool,
}

#[derive(Debug)]
pub struct AckTracker {
    pending: VecDeque<PendingPacket>,
    max_pending: usize,
    srtt: f32,
    rtt_var: f32,
}

impl AckTracker {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            srtt: 100.0,
            rtt_var: 50.0,
        }
    }

    /// Starts tracking `sequence`. Returns how many of the oldest entries were
    /// dropped from the window without ever being acknowledged.
    pub fn track_packet(&mut self, sequence: Sequence) -> usize {
        let mut dropped = 0;
        while self.pending.len() >= self.max_pending.max(1) {
            if self.pending.pop_front().is_some_and(|p| !p.acked) {
                dropped += 1;
            }
        }

        self.pending.push_back(PendingPacket {
            sequence,
            send_time: Instant::now(),
            acked: false,
        });
        dropped
    }

    pub fn process_ack(&mut self, ack: Sequence, ack_bitfield: u32) -> Vec<Sequence> {
        let mut acked_sequences = Vec::new();
        let mut rtt_samples = Vec::new();
        let now = Instant::now();

        for pending in &mut self.pending {
            if pending.acked {
                continue;
            }

            let is_acked = if pending.sequence == ack {
                true
            } else if sequence_greater_than(ack, pending.sequence) {
                let diff = ack.wrapping_sub(pending.sequence);
                if diff <= 32 {
                    (ack_bitfield & (1 << (diff - 1))) != 0
                } else {
                    false
                }
            } else {
                false
            };

            if is_acked {
                pending.acked = true;
                acked_sequences.push(pending.sequence);

                let rtt = now.duration_since(pending.send_time).as_secs_f32() * 1000.0;
                rtt_samples.push(rtt);
            }
        }

        for rtt in rtt_samples {
            self.update_rtt(rtt);
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }

        acked_sequences
    }

    fn update_rtt(&mut self, rtt: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt - self.srtt).abs();
        self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
        self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
    }

    /// Unacknowledged sequences sent more than `older_than` ago, oldest first.
    pub fn stale(&self, older_than: Duration) -> Vec<Sequence> {
        let now = Instant::now();
        self.pending
            .iter()
            .filter(|p| !p.acked && now.duration_since(p.send_time) >= older_than)
            .map(|p| p.sequence)
            .collect()
    }

    pub fn srtt(&self) -> f32 {
        self.srtt
    }

    pub fn rtt_var(&self) -> f32 {
        self.rtt_var
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.acked).count()
    }
}

#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: Sequence,
    received_bitfield: u32,
    recent_sequences: VecDeque<Sequence>,
    max_recent: usize,
    received_any: bool,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVED_WINDOW)
    }
}

impl ReceiveTracker {
    pub fn new(max_recent: usize) -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            recent_sequences: VecDeque::with_capacity(max_recent),
            max_recent: max_recent.max(1),
            received_any: false,
        }
    }

    /// Records `sequence`; returns false for a duplicate.
    pub fn record_received(&mut self, sequence: Sequence) -> bool {
        if self.recent_sequences.contains(&sequence) {
            return false;
        }

        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        if !self.received_any {
            self.received_any = true;
            self.last_received = sequence;
            self.received_bitfield = 0;
        } else if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received) as u32;
            if diff < 32 {
                self.received_bitfield = (self.received_bitfield << diff) | (1 << (diff - 1));
            } else if diff == 32 {
                self.received_bitfield = 1 << 31;
            } else {
                self.received_bitfield = 0;
            }
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }

        true
    }

    pub fn has_received(&self) -> bool {
        self.received_any
    }

    /// Latest sequence plus a bitfield where bit `n` covers `ack - n - 1`.
    pub fn ack_data(&self) -> (Sequence, u32) {
        (self.last_received, self.received_bitfield)
    }
}
