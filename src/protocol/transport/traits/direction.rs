//! Half-duplex direction control (RS-485 driver enable).

/// GPIO that switches the transceiver between listening and driving the bus.
pub trait DirectionControl {
    /// Start driving the bus.
    fn assert_transmit(&mut self);
    /// Release the bus and go back to listening.
    fn deassert_transmit(&mut self);
}
