//! Error definitions shared across library modules.
//! Transport noise never shows up here: it is absorbed by the link layer.
//! What remains are codec rejections, configuration mistakes and the few
//! engine calls that can genuinely fail.
use thiserror_no_std::Error;

//==================================================================================FRAME_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reasons a byte sequence is not a valid frame.
pub enum FrameError {
    /// Fewer bytes than the smallest legal frame.
    #[error("Frame too short: {len} bytes")]
    TooShort { len: usize },
    /// The Length byte does not describe the buffer that was handed in.
    #[error("Length byte announces {declared} bytes, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    /// `checksum + sum(Length..Payload)` is not `0xFFFF`.
    #[error("Checksum mismatch: expected {expected:#06x}, found {found:#06x}")]
    ChecksumMismatch { expected: u16, found: u16 },
    /// Payload cannot be described by a one-byte Length field.
    #[error("Payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
}

//==================================================================================BUS_ERROR
#[derive(Error, Debug)]
/// Failures reported by the bus engine to its caller.
pub enum BusError<E: core::fmt::Debug> {
    /// The byte transport refused a read or a write.
    #[error("Transport error: {0:?}")]
    Transport(E),

    /// A packet is already waiting for its ACK.
    #[error("Queued packet slot already occupied")]
    SlotOccupied,

    /// A blocking request was discarded by a STOP before any reply arrived.
    #[error("Queued packet cancelled")]
    Cancelled,

    /// The configured retry ceiling was reached without an ACK.
    #[error("Retries exhausted")]
    RetriesExhausted,

    /// Outgoing frame could not be encoded.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Invalid [`BusConfig`](crate::config::BusConfig) values.
pub enum ConfigError {
    /// Baud rate of zero makes every byte infinitely long.
    #[error("Baud rate must be non-zero")]
    ZeroBaudRate,
    /// A random window whose upper bound is not above its lower bound.
    #[error("Empty random window: {name}")]
    EmptyWindow { name: &'static str },
    /// The steady retry window must be positive or retries would spin.
    #[error("Retry window must be non-zero")]
    ZeroRetryWindow,
}
