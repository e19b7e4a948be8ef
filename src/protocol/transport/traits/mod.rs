//! Abstraction traits for the collaborators the engine runs on: the UART,
//! the microsecond clock with its idle hook, and the RS-485 direction pin.
pub mod bus_timer;
pub mod byte_transport;
pub mod direction;
