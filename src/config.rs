//! Link timing and identity parameters for one node.
//!
//! Defaults reproduce the values every module on the bus was built with; a
//! node only needs to override them when the physical layer differs (another
//! baud rate, a longer cable run needing wider backoff, ...).
use embassy_time::Duration;

use crate::error::ConfigError;
use crate::protocol::messages::ModuleFlags;

/// Default UART speed of the bus.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bits on the wire per byte: start + 8 data + stop.
pub const BITS_PER_BYTE: u64 = 10;

/// Half-open random window `[min, max)` used for backoff and reply spreading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    pub min: Duration,
    pub max: Duration,
}

impl Window {
    pub const fn from_micros(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_micros(min),
            max: Duration::from_micros(max),
        }
    }

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Pick a duration in the window, in microseconds, from a raw random word.
    pub fn pick_micros(&self, random: u32) -> u64 {
        let min = self.min.as_micros();
        let span = self.max.as_micros().saturating_sub(min);
        if span == 0 {
            return min;
        }
        min + (random as u64) % span
    }
}

//==================================================================================BUS_CONFIG
/// Per-node protocol configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// UART speed, used to derive the byte time.
    pub baud_rate: u32,
    /// Time to wait for the first ACK after a packet is queued.
    pub initial_retry: Duration,
    /// Time between later retransmissions.
    pub retry: Duration,
    /// Backoff while the bus is busy, for ordinary frames.
    pub backoff: Window,
    /// Backoff for RESPONSE_ID, where many nodes answer the same broadcast.
    pub bcast_reply_backoff: Window,
    /// Delay before answering a REQUEST_ID.
    pub id_spread: Window,
    /// Optional ceiling on retransmissions of one queued packet.
    pub max_retries: Option<u32>,
    /// Capability flags advertised in RESPONSE_ID.
    pub module_flags: ModuleFlags,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConfig {
    pub const fn new() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            initial_retry: Duration::from_micros(2_000_000),
            retry: Duration::from_micros(1_000_000),
            backoff: Window::from_micros(1, 5_000),
            bcast_reply_backoff: Window::from_micros(1, 50_000),
            id_spread: Window::from_millis(1, 1_000),
            max_retries: None,
            module_flags: ModuleFlags::empty(),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_retry(mut self, initial: Duration, steady: Duration) -> Self {
        self.initial_retry = initial;
        self.retry = steady;
        self
    }

    pub fn with_backoff(mut self, backoff: Window, bcast_reply_backoff: Window) -> Self {
        self.backoff = backoff;
        self.bcast_reply_backoff = bcast_reply_backoff;
        self
    }

    pub fn with_id_spread(mut self, id_spread: Window) -> Self {
        self.id_spread = id_spread;
        self
    }

    /// Give up on a queued packet after `max_retries` retransmissions.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_module_flags(mut self, flags: ModuleFlags) -> Self {
        self.module_flags = flags;
        self
    }

    /// Serialization time of one byte, rounded up to a whole microsecond.
    pub fn byte_time_micros(&self) -> u64 {
        let baud = self.baud_rate.max(1) as u64;
        (BITS_PER_BYTE * 1_000_000).div_ceil(baud)
    }

    /// Silence after which a partial frame is abandoned (two byte times).
    pub fn rx_timeout_micros(&self) -> u64 {
        let baud = self.baud_rate.max(1) as u64;
        (2 * BITS_PER_BYTE * 1_000_000).div_ceil(baud)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.retry.as_micros() == 0 {
            return Err(ConfigError::ZeroRetryWindow);
        }
        for (name, window) in [
            ("backoff", self.backoff),
            ("bcast_reply_backoff", self.bcast_reply_backoff),
            ("id_spread", self.id_spread),
        ] {
            if window.max <= window.min {
                return Err(ConfigError::EmptyWindow { name });
            }
        }
        Ok(())
    }
}
