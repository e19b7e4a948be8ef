//! Bus access for a half-duplex, multi-drop line with no carrier sense other
//! than "are bytes arriving".
//!
//! Before driving the line the arbiter waits out any traffic in progress with
//! a random backoff, letting the receive path keep draining the UART in the
//! meantime. Once the line is quiet it raises the RS-485 driver enable, writes
//! the frame, holds the line for the frame's serialization time and releases
//! it again.
use rand_core::RngCore;

use crate::config::{BusConfig, Window};
use crate::core::EncodedFrame;
use crate::protocol::transport::traits::{
    bus_timer::{deadline_reached, BusTimer},
    byte_transport::ByteTransport,
    direction::DirectionControl,
};

//==================================================================================BUS_ARBITER
/// Owner of the physical collaborators: UART, clock, direction pin and the
/// random source used for backoff.
pub struct BusArbiter<T, D, K, R> {
    transport: T,
    direction: D,
    timer: K,
    rng: R,
    byte_time: u64,
}

impl<T, D, K, R> BusArbiter<T, D, K, R>
where
    T: ByteTransport,
    D: DirectionControl,
    K: BusTimer,
    R: RngCore,
{
    /// Build an arbiter. The line is released straight away so a node that
    /// booted with the driver enabled does not jam the bus.
    pub fn new(transport: T, mut direction: D, timer: K, rng: R, config: &BusConfig) -> Self {
        direction.deassert_transmit();
        Self {
            transport,
            direction,
            timer,
            rng,
            byte_time: config.byte_time_micros(),
        }
    }

    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn timer(&mut self) -> &mut K {
        &mut self.timer
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Current time from the bus clock.
    pub fn now(&self) -> u64 {
        self.timer.now_micros()
    }

    /// Serialization time of one byte, in microseconds.
    pub fn byte_time(&self) -> u64 {
        self.byte_time
    }

    /// Give the platform a chance to sleep.
    pub fn idle(&mut self) {
        self.timer.idle();
    }

    /// Random delay in `window`, in microseconds.
    pub fn pick(&mut self, window: &Window) -> u64 {
        window.pick_micros(self.rng.next_u32())
    }

    /// Take back the collaborators.
    pub fn release(self) -> (T, D, K, R) {
        (self.transport, self.direction, self.timer, self.rng)
    }

    /// Wait for a quiet line, then put `frame` on it.
    ///
    /// * `backoff` – random window drawn from each time traffic is detected
    /// * `on_busy` – called with the transport and the current time at least
    ///   once per backoff step, so received bytes keep being consumed
    pub fn transmit<F>(
        &mut self,
        frame: &EncodedFrame,
        backoff: &Window,
        mut on_busy: F,
    ) -> Result<(), T::Error>
    where
        F: FnMut(&mut T, u64) -> Result<(), T::Error>,
    {
        while self.transport.bytes_available() > 0 {
            let wait = self.pick(backoff);
            let until = self.timer.now_micros().wrapping_add(wait);
            #[cfg(feature = "defmt")]
            defmt::debug!("bus busy, backing off {} us", wait);
            // The receive path runs at least once per step, even when the
            // draw is shorter than one clock tick.
            loop {
                let now = self.timer.now_micros();
                on_busy(&mut self.transport, now)?;
                if deadline_reached(self.timer.now_micros(), until) {
                    break;
                }
            }
        }

        let hold = frame.len() as u64 * self.byte_time;
        self.direction.assert_transmit();
        let written = self.transport.write(frame.as_bytes());
        if written.is_ok() {
            let done = self.timer.now_micros().wrapping_add(hold);
            while !deadline_reached(self.timer.now_micros(), done) {
                self.timer.idle();
            }
        }
        self.direction.deassert_transmit();
        written
    }
}
