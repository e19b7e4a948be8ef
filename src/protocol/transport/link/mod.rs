//! Link layer: byte-stream reassembly on the receive side and the single
//! retried outbound slot on the send side.
use crate::core::Payload;
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::{self, PacketType};
use crate::protocol::transport::frame::Frame;

pub mod assembler;
pub mod retry;

/// Owned copy of a validated frame, detached from the receive buffer so the
/// link can keep reading while it waits for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Inbound {
    pub source: NodeAddress,
    pub dest: NodeAddress,
    pub packet_type: u8,
    pub seq: u8,
    pub payload: Payload,
}

impl Inbound {
    /// Known packet type, or the raw code.
    pub fn kind(&self) -> Result<PacketType, u8> {
        PacketType::try_from(self.packet_type)
    }

    /// Response bit set.
    pub fn is_response(&self) -> bool {
        messages::is_response(self.packet_type)
    }
}

impl From<Frame<'_>> for Inbound {
    fn from(frame: Frame<'_>) -> Self {
        let mut payload = Payload::new();
        payload.copy_from_slice(frame.payload);
        Self {
            source: frame.source,
            dest: frame.dest,
            packet_type: frame.packet_type,
            seq: frame.seq,
            payload,
        }
    }
}

impl core::fmt::Display for Inbound {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "<Packet source={} dest={} packet_type=",
            self.source, self.dest
        )?;
        match self.kind() {
            Ok(kind) => write!(f, "{kind:?}")?,
            Err(code) => write!(f, "0x{code:02x}")?,
        }
        write!(f, " seq_num=0x{:02x} payload={:?}>", self.seq, self.payload)
    }
}
