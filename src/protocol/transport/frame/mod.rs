//! Wire frame codec.
//!
//! ```text
//! Field     Size  Notes
//! --------  ----  ---------------------------------------------------------
//! Length    1     bytes that follow, excluding the checksum
//! Source    2     little-endian sender address
//! Dest      2     little-endian recipient address
//! Type      1     packet type, 0x80 set on responses
//! SeqNum    1     sequence number
//! Payload   0..   type specific
//! Checksum  2     little-endian, 0xFFFF - sum(Length..Payload)
//! ```
use crate::core::{EncodedFrame, HEADER_LEN, MAX_PAYLOAD_LEN};
use crate::error::FrameError;
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::{self, PacketType};

/// Smallest well-formed frame: Length, header and checksum with no payload.
pub const MIN_FRAME_LEN: usize = 1 + HEADER_LEN + 2;

/// Value `checksum + sum(Length..Payload)` must reach.
const CHECKSUM_TARGET: u32 = 0xFFFF;

//==================================================================================FRAME
/// A decoded frame borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame<'a> {
    pub source: NodeAddress,
    pub dest: NodeAddress,
    /// Raw type byte; may be a code this firmware does not know.
    pub packet_type: u8,
    pub seq: u8,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Known packet type, or the raw code.
    pub fn kind(&self) -> Result<PacketType, u8> {
        PacketType::try_from(self.packet_type)
    }

    /// Response bit set.
    pub fn is_response(&self) -> bool {
        messages::is_response(self.packet_type)
    }
}

/// Sum of the bytes covered by the checksum, in the 32-bit domain.
///
/// At most 256 covered bytes, so the sum never exceeds `0xFF00`.
fn byte_sum(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| b as u32).sum()
}

/// Checksum for the Length..Payload bytes.
pub fn checksum(covered: &[u8]) -> u16 {
    (CHECKSUM_TARGET - byte_sum(covered)) as u16
}

/// Total on-wire size announced by a Length byte.
#[inline]
pub const fn total_len(length_byte: u8) -> usize {
    1 + length_byte as usize + 2
}

//==================================================================================ENCODE
/// Serialize a frame.
pub fn encode(
    source: NodeAddress,
    dest: NodeAddress,
    packet_type: u8,
    seq: u8,
    payload: &[u8],
) -> Result<EncodedFrame, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong { len: payload.len() });
    }

    let mut frame = EncodedFrame::empty();
    frame.push((HEADER_LEN + payload.len()) as u8);
    frame.extend(&source.to_le_bytes());
    frame.extend(&dest.to_le_bytes());
    frame.push(packet_type);
    frame.push(seq);
    frame.extend(payload);

    let sum = checksum(frame.as_bytes());
    frame.extend(&sum.to_le_bytes());
    Ok(frame)
}

//==================================================================================DECODE
/// Parse and validate one complete frame.
///
/// `bytes` must hold exactly one frame, Length through Checksum.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, FrameError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort { len: bytes.len() });
    }

    let declared = total_len(bytes[0]);
    if declared != bytes.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let (covered, trailer) = bytes.split_at(bytes.len() - 2);
    let found = u16::from_le_bytes([trailer[0], trailer[1]]);
    if found as u32 + byte_sum(covered) != CHECKSUM_TARGET {
        return Err(FrameError::ChecksumMismatch {
            expected: checksum(covered),
            found,
        });
    }

    Ok(Frame {
        source: NodeAddress::from_le_bytes([covered[1], covered[2]]),
        dest: NodeAddress::from_le_bytes([covered[3], covered[4]]),
        packet_type: covered[5],
        seq: covered[6],
        payload: &covered[1 + HEADER_LEN..],
    })
}
