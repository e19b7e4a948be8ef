//! Receive reassembly: turns the UART byte stream back into frames.
//!
//! The first byte of every frame is its Length, so the assembler knows how
//! many bytes to wait for. A frame that stops arriving for longer than the
//! rx timeout is treated as a collision or a scrambled transmission and
//! dropped; the next byte is then taken as a fresh Length.
use crate::core::MAX_FRAME_LEN;
use crate::error::FrameError;
use crate::protocol::transport::frame::{decode, total_len, MIN_FRAME_LEN};
use crate::protocol::transport::link::Inbound;
use crate::protocol::transport::traits::{bus_timer::deadline_reached, byte_transport::ByteTransport};

//==================================================================================Enums and Structs
/// What one call to [`FrameAssembler::pump`] achieved.
#[derive(Debug, PartialEq, Eq)]
pub enum RxEvent {
    /// Nothing buffered and nothing arrived.
    Idle,
    /// Bytes are buffered but the frame is not complete yet.
    InProgress,
    /// A partial frame was abandoned after the line went quiet.
    Aborted,
    /// A Length byte announced a frame below the protocol minimum.
    Discarded,
    /// A complete frame failed validation.
    Rejected(FrameError),
    /// A complete, valid frame.
    Complete(Inbound),
}

/// Receive states; COMPLETE is transient and never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RxState {
    Idle,
    ReadingBody,
}

/// Accumulator for one frame at a time.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    state: RxState,
    buffer: [u8; MAX_FRAME_LEN],
    buffered: usize,
    rx_timeout: Option<u64>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            state: RxState::Idle,
            buffer: [0; MAX_FRAME_LEN],
            buffered: 0,
            rx_timeout: None,
        }
    }

    /// Bytes of the current partial frame.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Deadline after which the partial frame is dropped.
    pub fn rx_timeout(&self) -> Option<u64> {
        self.rx_timeout
    }

    fn reset(&mut self) {
        self.state = RxState::Idle;
        self.buffered = 0;
        self.rx_timeout = None;
    }

    //==================================================================================Process Functions
    /// Move whatever the transport has into the accumulator.
    ///
    /// * `now` – current time in microseconds
    /// * `timeout` – allowed silence inside a frame, in microseconds
    ///
    /// Never blocks. Reads at most up to the end of the current frame, so
    /// bytes of the next frame stay in the transport for the next call.
    pub fn pump<T: ByteTransport>(
        &mut self,
        transport: &mut T,
        now: u64,
        timeout: u64,
    ) -> Result<RxEvent, T::Error> {
        let mut available = transport.bytes_available();

        if available == 0 {
            return Ok(match (self.state, self.rx_timeout) {
                (RxState::Idle, _) => RxEvent::Idle,
                (RxState::ReadingBody, Some(deadline)) if deadline_reached(now, deadline) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("packet aborted after {} bytes", self.buffered);
                    self.reset();
                    RxEvent::Aborted
                }
                (RxState::ReadingBody, _) => RxEvent::InProgress,
            });
        }

        if self.state == RxState::Idle {
            // First byte: the Length field.
            if transport.read(&mut self.buffer[..1])? == 0 {
                return Ok(RxEvent::Idle);
            }
            available -= 1;
            self.buffered = 1;
            self.state = RxState::ReadingBody;
            self.rx_timeout = Some(now.wrapping_add(timeout));

            if total_len(self.buffer[0]) < MIN_FRAME_LEN {
                #[cfg(feature = "defmt")]
                defmt::debug!("discarding length byte {=u8}", self.buffer[0]);
                self.reset();
                return Ok(RxEvent::Discarded);
            }
        }

        let total = total_len(self.buffer[0]);
        if available == 0 {
            return Ok(RxEvent::InProgress);
        }

        let wanted = (total - self.buffered).min(available);
        let read = transport.read(&mut self.buffer[self.buffered..self.buffered + wanted])?;
        self.buffered += read;

        if self.buffered < total {
            self.rx_timeout = Some(now.wrapping_add(timeout));
            return Ok(RxEvent::InProgress);
        }

        let event = match decode(&self.buffer[..total]) {
            Ok(frame) => RxEvent::Complete(Inbound::from(frame)),
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("dropping frame: {}", err);
                RxEvent::Rejected(err)
            }
        };
        self.reset();
        Ok(event)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
