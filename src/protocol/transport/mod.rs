//! Transport layer of the half-duplex module bus: wire framing, link-level
//! reassembly and retries, bus arbitration, and the traits the platform
//! implements to plug a UART, a clock and an RS-485 direction pin in.
//!
//! ## Timing
//!
//! All deadlines are expressed in microseconds of the [`BusTimer`] clock and
//! derived from [`BusConfig`](crate::config::BusConfig):
//!
//! - **byte time**: serialization time of one byte, 87 µs at 115200 baud.
//!   The arbiter holds the line for `frame_len × byte time` after a write.
//! - **rx timeout**: two byte times of silence inside a frame abort it.
//! - **retry**: 2 s before the first retransmission of a queued packet, 1 s
//!   between later ones.
//!
//! [`BusTimer`]: traits::bus_timer::BusTimer

pub mod arbiter;
pub mod frame;
pub mod link;
pub mod traits;
