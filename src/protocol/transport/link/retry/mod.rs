//! Sequence numbers and the single queued packet awaiting its ACK.
//!
//! Every attempt, the first one included, goes out with a freshly allocated
//! sequence number. A receiver only suppresses duplicates of a sequence
//! number it has already answered, so if a command was executed but its ACK
//! got lost, the retransmission looks like a new command and runs again. The
//! whole bus relies on that behaviour, so it stays.
use crate::core::Payload;
use crate::error::FrameError;
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::{self, PacketType};
use crate::protocol::transport::link::Inbound;
use crate::protocol::transport::traits::bus_timer::deadline_reached;

//==================================================================================QUEUED_PACKET
/// The one request a node may have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueuedPacket {
    pub dest: NodeAddress,
    pub packet_type: PacketType,
    pub payload: Payload,
}

impl QueuedPacket {
    /// Packet without payload.
    pub const fn new(dest: NodeAddress, packet_type: PacketType) -> Self {
        Self {
            dest,
            packet_type,
            payload: Payload::new(),
        }
    }

    /// Packet carrying `payload`.
    pub fn with_payload(
        dest: NodeAddress,
        packet_type: PacketType,
        payload: &[u8],
    ) -> Result<Self, FrameError> {
        let payload =
            Payload::from_slice(payload).ok_or(FrameError::PayloadTooLong { len: payload.len() })?;
        Ok(Self {
            dest,
            packet_type,
            payload,
        })
    }
}

/// How the last queued packet left the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotOutcome {
    /// A matching response arrived; its payload is the reply.
    Acknowledged(Payload),
    /// A STOP discarded the packet.
    Cancelled,
    /// The retry ceiling was hit.
    Exhausted,
}

/// One transmission the caller must put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub packet: QueuedPacket,
    pub seq: u8,
}

//==================================================================================LINK_SESSION
/// Per-node sequence and retry bookkeeping. Lives as long as the node.
#[derive(Debug, Clone, Default)]
pub struct LinkSession {
    last_seq_seen: u8,
    awaiting_ack_of_seq: Option<u8>,
    next_retry: Option<u64>,
    queued: Option<QueuedPacket>,
    retries: u32,
    outcome: Option<SlotOutcome>,
}

impl LinkSession {
    pub const fn new() -> Self {
        Self {
            last_seq_seen: 0,
            awaiting_ack_of_seq: None,
            next_retry: None,
            queued: None,
            retries: 0,
            outcome: None,
        }
    }

    /// Last sequence number seen on the bus or generated here.
    pub fn last_seq_seen(&self) -> u8 {
        self.last_seq_seen
    }

    /// Sequence number the queued packet is waiting on.
    pub fn awaiting_ack_of_seq(&self) -> Option<u8> {
        self.awaiting_ack_of_seq
    }

    /// When the queued packet goes out again.
    pub fn next_retry(&self) -> Option<u64> {
        self.next_retry
    }

    /// The packet waiting for its ACK.
    pub fn queued(&self) -> Option<&QueuedPacket> {
        self.queued.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.queued.is_some()
    }

    /// Retransmissions of the current packet so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Allocate the next sequence number.
    pub fn next_seq(&mut self) -> u8 {
        self.last_seq_seen = self.last_seq_seen.wrapping_add(1);
        self.last_seq_seen
    }

    /// Sequence number for a fire-and-forget frame: responses answer the last
    /// command seen, everything else starts a new exchange.
    pub fn seq_for_unqueued(&mut self, packet_type: u8) -> u8 {
        if messages::is_response(packet_type) {
            self.last_seq_seen
        } else {
            self.next_seq()
        }
    }

    /// Record the sequence number of any valid frame on the bus, addressed to
    /// us or not. Responses do not count as commands and are skipped.
    pub fn observe(&mut self, inbound: &Inbound) {
        if !inbound.is_response() {
            self.last_seq_seen = inbound.seq;
        }
    }

    /// Take ownership of `packet` and return its first attempt, or give the
    /// packet back when the slot is busy.
    pub fn install(&mut self, packet: QueuedPacket) -> Result<Attempt, QueuedPacket> {
        if self.queued.is_some() {
            return Err(packet);
        }
        self.queued = Some(packet);
        self.retries = 0;
        self.outcome = None;
        self.attempt().ok_or(packet)
    }

    /// Prepare the next attempt of the queued packet with a new seq.
    fn attempt(&mut self) -> Option<Attempt> {
        let packet = self.queued?;
        let seq = self.next_seq();
        self.awaiting_ack_of_seq = Some(seq);
        self.next_retry = None;
        Some(Attempt { packet, seq })
    }

    /// Start the retry clock once an attempt is on the wire.
    pub fn arm_retry(&mut self, now: u64, window: u64) {
        if self.queued.is_some() {
            self.next_retry = Some(now.wrapping_add(window));
        }
    }

    /// Whether the retry deadline has passed.
    pub fn retry_due(&self, now: u64) -> bool {
        matches!(self.next_retry, Some(deadline) if deadline_reached(now, deadline))
    }

    /// Next retransmission, or `None` when nothing is due. Drops the packet
    /// once `max_retries` retransmissions went unanswered.
    pub fn retry(&mut self, now: u64, max_retries: Option<u32>) -> Option<Attempt> {
        if !self.retry_due(now) {
            return None;
        }
        if max_retries.is_some_and(|max| self.retries >= max) {
            #[cfg(feature = "defmt")]
            defmt::warn!("giving up after {} retries", self.retries);
            self.clear(SlotOutcome::Exhausted);
            return None;
        }
        self.retries += 1;
        #[cfg(feature = "defmt")]
        defmt::debug!("retry #{}", self.retries);
        self.attempt()
    }

    /// Clear the slot when `inbound` answers the queued packet.
    pub fn try_acknowledge(&mut self, inbound: &Inbound) -> bool {
        let matched = match (&self.queued, self.awaiting_ack_of_seq) {
            (Some(packet), Some(seq)) => {
                inbound.is_response() && inbound.source == packet.dest && inbound.seq == seq
            }
            _ => false,
        };
        if matched {
            #[cfg(feature = "defmt")]
            defmt::debug!("reply {}", inbound.payload);
            self.clear(SlotOutcome::Acknowledged(inbound.payload));
        }
        matched
    }

    /// Discard the queued packet (mode reset).
    pub fn cancel(&mut self) -> Option<QueuedPacket> {
        let packet = self.queued;
        if packet.is_some() {
            self.clear(SlotOutcome::Cancelled);
        }
        packet
    }

    /// How the last packet left the slot; consumed by the caller.
    pub fn take_outcome(&mut self) -> Option<SlotOutcome> {
        self.outcome.take()
    }

    fn clear(&mut self, outcome: SlotOutcome) {
        self.queued = None;
        self.awaiting_ack_of_seq = None;
        self.next_retry = None;
        self.outcome = Some(outcome);
    }
}
