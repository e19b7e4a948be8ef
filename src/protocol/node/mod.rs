//! Node layer: what a module does with the frames the transport delivers.
//! Handler routing, work deferred from interrupt context, and the engine
//! that owns one node's bus session.
pub mod deferred;
pub mod dispatch;
pub mod engine;
