//! Bus protocol: node addressing, the packet vocabulary, the transport
//! (framing, link, arbitration) and the per-node engine built on top.
pub mod address;
pub mod messages;
pub mod node;
pub mod transport;
