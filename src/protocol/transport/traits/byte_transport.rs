//! Minimal abstraction for a byte-oriented serial port. Allows the engine to
//! plug into a HAL UART, a desktop serial driver or an in-memory test double.

/// Non-blocking access to the shared bus UART.
pub trait ByteTransport {
    type Error: core::fmt::Debug;

    /// Bytes received and not yet read.
    fn bytes_available(&mut self) -> usize;

    /// Copy up to `buf.len()` available bytes into `buf` without waiting.
    /// Returns how many bytes were copied.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue `data` for transmission. The engine keeps the line driven for
    /// the serialization time of `data` afterwards.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}
