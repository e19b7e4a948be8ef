//! Clock and idle hook abstraction providing the timing primitives required by
//! receive timeouts, retries, backoff and transmit turn-around.

/// Microsecond time source plus the platform's "nothing to do" hook.
pub trait BusTimer {
    /// Monotonic microsecond counter. May wrap; deadlines are compared with
    /// [`deadline_reached`].
    fn now_micros(&self) -> u64;

    /// Yield or sleep until something may have happened. Must return.
    fn idle(&mut self);
}

/// Wrap-tolerant `now >= deadline`.
///
/// Valid as long as the two instants are less than half the counter range
/// apart.
#[inline]
pub fn deadline_reached(now: u64, deadline: u64) -> bool {
    (now.wrapping_sub(deadline) as i64) >= 0
}
