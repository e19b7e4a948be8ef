//! `ktane-bus` library: the protocol engine that lets the modules of a
//! bomb-defusal game prop talk over one shared half-duplex serial bus
//! (RS-485 style) in a `no_std` environment. The crate exposes the wire
//! codec, the link layer with its retried request slot, bus arbitration,
//! and the per-node engine that dispatches frames to node handlers.
#![cfg_attr(not(test), no_std)]
//==================================================================================
/// Node timing and identity configuration.
pub mod config;
/// Fixed-size payload and frame buffers.
pub mod core;
/// Codec, configuration and engine errors.
pub mod error;
/// Addressing, packet vocabulary, transport and node engine.
pub mod protocol;
//==================================================================================
