//! The per-node protocol engine.
//!
//! [`BusEngine`] owns everything one node needs to talk on the bus: its
//! address and mode, the link bookkeeping, the dispatch table, the
//! platform peripherals and the node's own state. The main loop calls
//! [`BusEngine::poll`] forever; everything else happens from there.
//!
//! ```text
//! poll ─┬─ core_poll ─┬─ pump receive assembler ─ link bookkeeping ─ inbox
//!       │             ├─ dispatch inbox ─ apply handler actions ─ auto-ACK
//!       │             └─ retransmit queued packet when due
//!       ├─ ID reply timer ─ raise SEND_ID
//!       ├─ drain deferred tasks
//!       └─ idle hook when nothing happened
//! ```
use core::convert::Infallible;

use heapless::{Deque, Vec};
use rand_core::RngCore;

use crate::config::BusConfig;
use crate::core::Payload;
use crate::error::{BusError, ConfigError};
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::{Mode, PacketType};
use crate::protocol::node::deferred::{DeferredTasks, Task};
use crate::protocol::node::dispatch::{
    Action, DispatchTable, Disposition, Outbox, OUTBOX_CAPACITY,
};
use crate::protocol::transport::{
    arbiter::BusArbiter,
    frame,
    link::{
        assembler::{FrameAssembler, RxEvent},
        retry::{Attempt, LinkSession, QueuedPacket, SlotOutcome},
        Inbound,
    },
    traits::{
        bus_timer::{deadline_reached, BusTimer},
        byte_transport::ByteTransport,
        direction::DirectionControl,
    },
};

/// Frames addressed to this node that may wait for dispatch.
pub const INBOX_CAPACITY: usize = 4;

/// Platform collaborators handed to [`BusEngine::new`].
pub struct Peripherals<T, D, K, R> {
    pub transport: T,
    pub direction: D,
    pub timer: K,
    pub rng: R,
}

//==================================================================================BUS_ENGINE
/// One node on the bus.
///
/// * `S` – node state handed to every handler
/// * `T`, `D`, `K`, `R` – UART, direction pin, clock and random source
pub struct BusEngine<'t, S, T, D, K, R> {
    state: S,
    table: DispatchTable<S>,
    config: BusConfig,
    address: NodeAddress,
    mode: Mode,
    session: LinkSession,
    assembler: FrameAssembler,
    arbiter: BusArbiter<T, D, K, R>,
    tasks: &'t DeferredTasks,
    inbox: Deque<Inbound, INBOX_CAPACITY>,
    id_reply_at: Option<u64>,
    id_requester: NodeAddress,
}

impl<'t, S, T, D, K, R> BusEngine<'t, S, T, D, K, R>
where
    T: ByteTransport,
    D: DirectionControl,
    K: BusTimer,
    R: RngCore,
{
    /// Build the engine for `address`. Rejects an unusable `config`.
    pub fn new(
        address: NodeAddress,
        config: BusConfig,
        peripherals: Peripherals<T, D, K, R>,
        tasks: &'t DeferredTasks,
        state: S,
        table: DispatchTable<S>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let Peripherals {
            transport,
            direction,
            timer,
            rng,
        } = peripherals;
        #[cfg(feature = "defmt")]
        defmt::info!("node {} on the bus", address);
        Ok(Self {
            state,
            table,
            arbiter: BusArbiter::new(transport, direction, timer, rng, &config),
            config,
            address,
            mode: Mode::Sleep,
            session: LinkSession::new(),
            assembler: FrameAssembler::new(),
            tasks,
            inbox: Deque::new(),
            id_reply_at: None,
            id_requester: NodeAddress::MASTER,
        })
    }

    //==================================================================================Accessors
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        #[cfg(feature = "defmt")]
        defmt::info!("mode {} -> {}", self.mode, mode);
        self.mode = mode;
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn table_mut(&mut self) -> &mut DispatchTable<S> {
        &mut self.table
    }

    /// Sequence and retry bookkeeping.
    pub fn session(&self) -> &LinkSession {
        &self.session
    }

    /// Whether a queued packet still waits for its ACK.
    pub fn is_pending(&self) -> bool {
        self.session.is_pending()
    }

    /// How the last queued packet left the slot, consumed on read.
    pub fn take_outcome(&mut self) -> Option<SlotOutcome> {
        self.session.take_outcome()
    }

    /// The flag set interrupt handlers raise tasks in.
    pub fn tasks(&self) -> &'t DeferredTasks {
        self.tasks
    }

    /// When the scheduled RESPONSE_ID is due.
    pub fn id_reply_at(&self) -> Option<u64> {
        self.id_reply_at
    }

    /// Current time from the bus clock.
    pub fn now(&self) -> u64 {
        self.arbiter.now()
    }

    /// Access to the UART, for diagnostics.
    pub fn transport_mut(&mut self) -> &mut T {
        self.arbiter.transport()
    }

    /// Tear the engine down, returning the node state and the peripherals.
    pub fn release(self) -> (S, Peripherals<T, D, K, R>) {
        let (transport, direction, timer, rng) = self.arbiter.release();
        (
            self.state,
            Peripherals {
                transport,
                direction,
                timer,
                rng,
            },
        )
    }

    //==================================================================================Polling
    /// Full main loop step: [`Self::core_poll`], the RESPONSE_ID timer, the
    /// deferred tasks, then the idle hook if nothing happened.
    pub fn poll(&mut self) -> Result<(), BusError<T::Error>> {
        let mut busy = self.core_poll()?;

        if let Some(at) = self.id_reply_at {
            if deadline_reached(self.arbiter.now(), at) {
                self.id_reply_at = None;
                self.tasks.request(Task::SendId);
            }
        }

        busy |= self.drain_tasks()?;

        if !busy {
            self.arbiter.idle();
        }
        Ok(())
    }

    /// Receive, dispatch and retry only. Returns whether anything happened.
    ///
    /// This is what [`Self::send_blocking`] spins on, so handlers keep
    /// running while a node waits for a reply.
    pub fn core_poll(&mut self) -> Result<bool, BusError<T::Error>> {
        let now = self.arbiter.now();
        let rx_timeout = self.config.rx_timeout_micros();
        let event = self
            .assembler
            .pump(self.arbiter.transport(), now, rx_timeout)
            .map_err(BusError::Transport)?;

        let mut busy = !matches!(event, RxEvent::Idle | RxEvent::Aborted);
        if let RxEvent::Complete(inbound) = event {
            accept(&mut self.session, &mut self.inbox, self.address, inbound);
        }

        while let Some(inbound) = self.inbox.pop_front() {
            busy = true;
            self.dispatch(inbound)?;
        }

        let now = self.arbiter.now();
        if let Some(attempt) = self.session.retry(now, self.config.max_retries) {
            busy = true;
            self.transmit_attempt(attempt, self.config.retry.as_micros())?;
        }

        Ok(busy)
    }

    /// Poll until the transport fails.
    pub fn poll_forever(&mut self) -> Result<Infallible, BusError<T::Error>> {
        loop {
            self.poll()?;
        }
    }

    //==================================================================================Sending
    /// Queue a request that is retried until acknowledged. The first attempt
    /// goes out immediately.
    pub fn queue(&mut self, packet: QueuedPacket) -> Result<(), BusError<T::Error>> {
        self.queue_with(packet, self.config.initial_retry.as_micros())
    }

    fn queue_with(&mut self, packet: QueuedPacket, window: u64) -> Result<(), BusError<T::Error>> {
        let attempt = self
            .session
            .install(packet)
            .map_err(|_| BusError::SlotOccupied)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("queued {} to {}", packet.packet_type, packet.dest);
        self.transmit_attempt(attempt, window)
    }

    /// Send a request and wait for the matching response, returning its
    /// payload. Frames for this node keep being dispatched meanwhile.
    ///
    /// Not for interrupt context.
    pub fn send_blocking(&mut self, packet: QueuedPacket) -> Result<Payload, BusError<T::Error>> {
        if let Err(err) = self.queue_with(packet, self.config.retry.as_micros()) {
            if !matches!(err, BusError::SlotOccupied) {
                self.session.cancel();
                self.session.take_outcome();
            }
            return Err(err);
        }

        while self.session.is_pending() {
            self.core_poll()?;
        }

        match self.session.take_outcome() {
            Some(SlotOutcome::Acknowledged(reply)) => Ok(reply),
            Some(SlotOutcome::Exhausted) => Err(BusError::RetriesExhausted),
            Some(SlotOutcome::Cancelled) | None => Err(BusError::Cancelled),
        }
    }

    /// Send once, without waiting for an ACK. Responses reuse the last seen
    /// seq so they pair with the command they answer.
    pub fn send_without_queuing(
        &mut self,
        dest: NodeAddress,
        packet_type: PacketType,
        payload: &[u8],
    ) -> Result<(), BusError<T::Error>> {
        let seq = self.session.seq_for_unqueued(packet_type.code());
        self.send(dest, packet_type.code(), seq, payload)
    }

    /// Acknowledge `seq` from `dest`.
    pub fn send_ack(&mut self, dest: NodeAddress, seq: u8) -> Result<(), BusError<T::Error>> {
        self.send(dest, PacketType::Ack.code(), seq, &[])
    }

    /// Put one frame on the bus with an explicit seq, waiting for a quiet line
    /// first. Frames completed while backing off are queued for dispatch.
    pub fn send(
        &mut self,
        dest: NodeAddress,
        packet_type: u8,
        seq: u8,
        payload: &[u8],
    ) -> Result<(), BusError<T::Error>> {
        let frame = frame::encode(self.address, dest, packet_type, seq, payload)?;
        let backoff = if packet_type == PacketType::ResponseId.code() {
            self.config.bcast_reply_backoff
        } else {
            self.config.backoff
        };
        let rx_timeout = self.config.rx_timeout_micros();
        let address = self.address;
        let assembler = &mut self.assembler;
        let session = &mut self.session;
        let inbox = &mut self.inbox;

        self.arbiter
            .transmit(&frame, &backoff, |transport, now| {
                if let RxEvent::Complete(inbound) = assembler.pump(transport, now, rx_timeout)? {
                    accept(session, inbox, address, inbound);
                }
                Ok(())
            })
            .map_err(BusError::Transport)
    }

    fn transmit_attempt(&mut self, attempt: Attempt, window: u64) -> Result<(), BusError<T::Error>> {
        let Attempt { packet, seq } = attempt;
        let sent = self.send(packet.dest, packet.packet_type.code(), seq, packet.payload.as_slice());
        // Armed even when the write failed, so the packet is tried again.
        let now = self.arbiter.now();
        self.session.arm_retry(now, window);
        sent
    }

    //==================================================================================Dispatch
    fn dispatch(&mut self, inbound: Inbound) -> Result<(), BusError<T::Error>> {
        let mut outbox = Outbox::new(self.address, self.mode);
        let disposition = self.table.dispatch(&mut self.state, &inbound, &mut outbox);
        self.apply(outbox.take_actions())?;
        if let Disposition::Handled { auto_ack: true } = disposition {
            self.send_ack(inbound.source, inbound.seq)?;
        }
        Ok(())
    }

    fn apply(&mut self, actions: Vec<Action, OUTBOX_CAPACITY>) -> Result<(), BusError<T::Error>> {
        for action in actions {
            match action {
                Action::Send {
                    dest,
                    packet_type,
                    payload,
                } => self.send_without_queuing(dest, packet_type, payload.as_slice())?,
                Action::Queue(packet) => match self.queue(packet) {
                    Err(BusError::SlotOccupied) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("slot busy, dropping {}", packet.packet_type);
                    }
                    other => other?,
                },
                Action::SetMode(mode) => self.set_mode(mode),
                Action::Reset => self.reset(),
                Action::ScheduleIdReply { to } => self.schedule_id_reply(to),
            }
        }
        Ok(())
    }

    /// Mode back to [`Mode::Sleep`] and the queued packet dropped.
    pub fn reset(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("stop");
        self.set_mode(Mode::Sleep);
        self.session.cancel();
    }

    /// Arm the RESPONSE_ID timer for a reply to `to` after a random spread.
    pub fn schedule_id_reply(&mut self, to: NodeAddress) {
        let delay = self.arbiter.pick(&self.config.id_spread);
        self.id_requester = to;
        self.id_reply_at = Some(self.arbiter.now().wrapping_add(delay));
    }

    //==================================================================================Deferred
    /// Act on raised tasks. Returns whether any ran.
    fn drain_tasks(&mut self) -> Result<bool, BusError<T::Error>> {
        let mut acted = false;
        for task in self.tasks.pending().iter() {
            if task.needs_slot() && self.session.is_pending() {
                continue;
            }
            if !self.tasks.take(task) {
                continue;
            }
            acted = true;
            self.run_task(task)?;
        }
        Ok(acted)
    }

    fn run_task(&mut self, task: Task) -> Result<(), BusError<T::Error>> {
        match task {
            Task::Strike => {
                #[cfg(feature = "defmt")]
                defmt::info!("strike");
                self.queue(QueuedPacket::new(NodeAddress::MASTER, PacketType::Strike))
            }
            Task::Disarmed => {
                #[cfg(feature = "defmt")]
                defmt::info!("disarmed");
                // A failed first write still leaves the packet queued for retry.
                let queued = self.queue(QueuedPacket::new(NodeAddress::MASTER, PacketType::Disarmed));
                self.set_mode(Mode::Disarmed);
                queued
            }
            Task::SendId => {
                let payload = self.config.module_flags.id_payload();
                let sent = self.send_without_queuing(self.id_requester, PacketType::ResponseId, &payload);
                if sent.is_err() {
                    // Nothing went out, so the reply is owed on the next poll.
                    self.tasks.request(Task::SendId);
                }
                sent
            }
            Task::ReadStatus | Task::SendTime => {
                let Some(hook) = self.table.task_hook() else {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("no hook for {}", task);
                    return Ok(());
                };
                let mut outbox = Outbox::new(self.address, self.mode);
                hook(&mut self.state, task, &mut outbox);
                self.apply(outbox.take_actions())
            }
        }
    }
}

/// Link bookkeeping for a complete frame: track its seq, match it against
/// the queued packet, and keep it for dispatch when it is addressed to us.
fn accept(
    session: &mut LinkSession,
    inbox: &mut Deque<Inbound, INBOX_CAPACITY>,
    address: NodeAddress,
    inbound: Inbound,
) {
    session.observe(&inbound);
    if !address.accepts(inbound.dest) {
        return;
    }
    session.try_acknowledge(&inbound);
    if inbox.push_back(inbound).is_err() {
        #[cfg(feature = "defmt")]
        defmt::warn!("inbox full, dropping frame from {}", inbound.source);
    }
}
