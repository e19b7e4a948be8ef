//! Packet-type routing for inbound frames.
//!
//! A node registers one plain function per packet type it understands. The
//! handler gets the node state, the frame, and an [`Outbox`] in which it
//! records what the engine should do next (send a frame, queue a request,
//! change mode, ...). Handlers never touch the bus directly, so dispatch is
//! never re-entered while a handler runs.
//!
//! ### ACK contract
//! A handler returns `true` when it answered the frame itself (for example
//! with a STATUS reply). Otherwise the engine sends one ACK echoing the seq,
//! unless the frame was broadcast.
use heapless::Vec;

use crate::core::Payload;
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::{Mode, PacketType};
use crate::protocol::node::deferred::Task;
use crate::protocol::transport::link::{retry::QueuedPacket, Inbound};

/// Actions one handler call may record.
pub const OUTBOX_CAPACITY: usize = 4;

/// Inbound frame handler. Returns `true` when it sent its own ACK.
pub type Handler<S> = fn(&mut S, &Inbound, &mut Outbox) -> bool;

/// Node hook for the deferred tasks the engine has no generic action for
/// ([`Task::ReadStatus`], [`Task::SendTime`]).
pub type TaskHook<S> = fn(&mut S, Task, &mut Outbox);

//==================================================================================ACTIONS
/// Deferred side effect requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Fire-and-forget frame.
    Send {
        dest: NodeAddress,
        packet_type: PacketType,
        payload: Payload,
    },
    /// Retried request through the queued-packet slot.
    Queue(QueuedPacket),
    SetMode(Mode),
    /// Back to [`Mode::Sleep`], dropping the queued packet.
    Reset,
    /// Answer a REQUEST_ID from `to` after a random spread.
    ScheduleIdReply { to: NodeAddress },
}

/// Actions collected during one handler call, plus read-only node context.
#[derive(Debug)]
pub struct Outbox {
    address: NodeAddress,
    mode: Mode,
    actions: Vec<Action, OUTBOX_CAPACITY>,
    dropped: usize,
}

impl Outbox {
    pub fn new(address: NodeAddress, mode: Mode) -> Self {
        Self {
            address,
            mode,
            actions: Vec::new(),
            dropped: 0,
        }
    }

    /// Address of the node running the handler.
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    /// Node mode when the handler was called.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn push(&mut self, action: Action) {
        if self.actions.push(action).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("outbox full, dropping {}", action);
            self.dropped += 1;
        }
    }

    /// Send a frame without waiting for an ACK. Payloads longer than a frame
    /// can carry are dropped.
    pub fn send(&mut self, dest: NodeAddress, packet_type: PacketType, payload: &[u8]) {
        match Payload::from_slice(payload) {
            Some(payload) => self.push(Action::Send {
                dest,
                packet_type,
                payload,
            }),
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("payload of {} bytes does not fit a frame", payload.len());
                self.dropped += 1;
            }
        }
    }

    /// Queue a request retried until its ACK arrives.
    pub fn queue(&mut self, packet: QueuedPacket) {
        self.push(Action::Queue(packet));
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.push(Action::SetMode(mode));
    }

    /// Return to sleep and forget the queued packet.
    pub fn reset(&mut self) {
        self.push(Action::Reset);
    }

    pub fn schedule_id_reply(&mut self, to: NodeAddress) {
        self.push(Action::ScheduleIdReply { to });
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Actions lost to a full outbox or an oversized payload.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Hand the recorded actions over, leaving the outbox empty.
    pub(crate) fn take_actions(&mut self) -> Vec<Action, OUTBOX_CAPACITY> {
        self.dropped = 0;
        core::mem::take(&mut self.actions)
    }
}

//==================================================================================STOCK_HANDLERS
/// STOP: every node goes back to sleep and drops its queued packet.
///
/// Registered by [`DispatchTable::new`]. A node that overrides STOP should
/// call this from its own handler.
pub fn base_stop<S>(_state: &mut S, _inbound: &Inbound, outbox: &mut Outbox) -> bool {
    outbox.reset();
    false
}

/// REQUEST_ID: answer after a random delay so the replies of all modules
/// spread out instead of colliding. The RESPONSE_ID doubles as the ACK.
pub fn request_id<S>(_state: &mut S, inbound: &Inbound, outbox: &mut Outbox) -> bool {
    outbox.schedule_id_reply(inbound.source);
    true
}

/// ERROR: stop the whole game.
pub fn stop_on_error<S>(_state: &mut S, _inbound: &Inbound, outbox: &mut Outbox) -> bool {
    outbox.send(NodeAddress::BROADCAST_ALL, PacketType::Stop, &[]);
    false
}

/// Whether a handled frame still needs an ACK from the engine.
#[inline]
pub fn needs_auto_ack(acked_itself: bool, dest: NodeAddress) -> bool {
    !acked_itself && !dest.is_broadcast()
}

//==================================================================================DISPATCH_TABLE
/// Result of routing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// No handler for this type; the frame is dropped without an ACK.
    Unhandled,
    /// A handler ran; `auto_ack` tells the engine to ACK on its behalf.
    Handled { auto_ack: bool },
}

/// Fixed table of handlers indexed by packet type.
pub struct DispatchTable<S> {
    handlers: [Option<Handler<S>>; PacketType::COUNT],
    task_hook: Option<TaskHook<S>>,
}

impl<S> Clone for DispatchTable<S> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers,
            task_hook: self.task_hook,
        }
    }
}

impl<S> Default for DispatchTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> DispatchTable<S> {
    /// Table with only the base STOP handler.
    pub fn new() -> Self {
        Self::empty().with(PacketType::Stop, base_stop)
    }

    /// Table without any handler.
    pub fn empty() -> Self {
        Self {
            handlers: [None; PacketType::COUNT],
            task_hook: None,
        }
    }

    /// Builder form of [`Self::register`].
    pub fn with(mut self, packet_type: PacketType, handler: Handler<S>) -> Self {
        self.register(packet_type, handler);
        self
    }

    /// Builder form of [`Self::set_task_hook`].
    pub fn with_task_hook(mut self, hook: TaskHook<S>) -> Self {
        self.set_task_hook(hook);
        self
    }

    /// Install `handler`, returning the one it replaces.
    pub fn register(&mut self, packet_type: PacketType, handler: Handler<S>) -> Option<Handler<S>> {
        self.handlers[packet_type.index()].replace(handler)
    }

    pub fn unregister(&mut self, packet_type: PacketType) -> Option<Handler<S>> {
        self.handlers[packet_type.index()].take()
    }

    pub fn set_task_hook(&mut self, hook: TaskHook<S>) {
        self.task_hook = Some(hook);
    }

    pub fn task_hook(&self) -> Option<TaskHook<S>> {
        self.task_hook
    }

    /// Handler for a raw wire code. Unknown codes have none.
    pub fn handler(&self, code: u8) -> Option<Handler<S>> {
        let packet_type = PacketType::try_from(code).ok()?;
        self.handlers[packet_type.index()]
    }

    /// Run the handler for `inbound`, if any.
    pub fn dispatch(&self, state: &mut S, inbound: &Inbound, outbox: &mut Outbox) -> Disposition {
        match self.handler(inbound.packet_type) {
            Some(handler) => {
                let acked_itself = handler(state, inbound, outbox);
                Disposition::Handled {
                    auto_ack: needs_auto_ack(acked_itself, inbound.dest),
                }
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::debug!("no handler for type {=u8:#x}", inbound.packet_type);
                Disposition::Unhandled
            }
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
