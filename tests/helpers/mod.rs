/// Test doubles simulating the shared serial line, the microsecond clock, the
/// direction pin and the random source during integration tests.
use ktane_bus::protocol::{
    address::NodeAddress,
    messages::PacketType,
    transport::{
        frame::{decode, encode, total_len},
        traits::{bus_timer::BusTimer, byte_transport::ByteTransport, direction::DirectionControl},
    },
};
use rand_core::{impls, RngCore};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Produces the bytes a scripted peer sends back after seeing a frame.
pub type Responder = Box<dyn FnMut(&DecodedFrame) -> Option<Vec<u8>>>;

/// Owned view of a frame seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct DecodedFrame {
    pub source: NodeAddress,
    pub dest: NodeAddress,
    pub packet_type: u8,
    pub seq: u8,
    pub payload: Vec<u8>,
}

#[allow(dead_code)]
impl DecodedFrame {
    pub fn is(&self, packet_type: PacketType) -> bool {
        self.packet_type == packet_type.code()
    }
}

#[derive(Default)]
struct WireState {
    /// Pending bytes per attached UART.
    rx: Vec<VecDeque<u8>>,
    /// Every frame written by an attached UART, oldest first.
    written: VecDeque<DecodedFrame>,
    responder: Option<Responder>,
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// In-memory multi-drop line: whatever one UART writes every other one reads.
pub struct Wire {
    state: Rc<RefCell<WireState>>,
}

#[allow(dead_code)]
impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a new UART to the line.
    pub fn attach(&self) -> SimUart {
        let mut state = self.state.borrow_mut();
        state.rx.push(VecDeque::new());
        SimUart {
            id: state.rx.len() - 1,
            state: self.state.clone(),
        }
    }

    /// Put raw bytes on the line as an external peer.
    pub fn inject(&self, bytes: &[u8]) {
        for rx in self.state.borrow_mut().rx.iter_mut() {
            rx.extend(bytes.iter().copied());
        }
    }

    /// Encode and put a frame on the line as an external peer.
    pub fn inject_frame(
        &self,
        source: NodeAddress,
        dest: NodeAddress,
        packet_type: PacketType,
        seq: u8,
        payload: &[u8],
    ) {
        let frame = encode(source, dest, packet_type.code(), seq, payload).unwrap();
        self.inject(frame.as_bytes());
    }

    /// Frames written by attached nodes since the last call.
    pub fn take_written(&self) -> Vec<DecodedFrame> {
        self.state.borrow_mut().written.drain(..).collect()
    }

    /// Answer frames written by attached nodes with scripted bytes.
    pub fn set_responder(&self, responder: Responder) {
        self.state.borrow_mut().responder = Some(responder);
    }
}

#[allow(dead_code)]
/// One node's UART on the [`Wire`].
pub struct SimUart {
    id: usize,
    state: Rc<RefCell<WireState>>,
}

impl ByteTransport for SimUart {
    type Error = ();

    fn bytes_available(&mut self) -> usize {
        self.state.borrow().rx[self.id].len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut state = self.state.borrow_mut();
        let rx = &mut state.rx[self.id];
        let n = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        for (id, rx) in state.rx.iter_mut().enumerate() {
            if id != self.id {
                rx.extend(data.iter().copied());
            }
        }

        let mut rest = data;
        while !rest.is_empty() {
            let (one, tail) = rest.split_at(total_len(rest[0]).min(rest.len()));
            let frame = decode(one).map_err(|_| ())?;
            let frame = DecodedFrame {
                source: frame.source,
                dest: frame.dest,
                packet_type: frame.packet_type,
                seq: frame.seq,
                payload: frame.payload.to_vec(),
            };
            let reply = state.responder.as_mut().and_then(|respond| respond(&frame));
            state.written.push_back(frame);
            if let Some(reply) = reply {
                for rx in state.rx.iter_mut() {
                    rx.extend(reply.iter().copied());
                }
            }
            rest = tail;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Shared clock; every read advances it by one microsecond so busy-wait
/// loops always terminate.
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }

    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl BusTimer for SimClock {
    fn now_micros(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + 1);
        now
    }

    fn idle(&mut self) {
        self.advance(10);
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Direction pin recording how often the node drove the line.
pub struct SimDirection {
    driving: Rc<Cell<bool>>,
    transmissions: Rc<Cell<usize>>,
}

#[allow(dead_code)]
impl SimDirection {
    pub fn is_driving(&self) -> bool {
        self.driving.get()
    }

    pub fn transmissions(&self) -> usize {
        self.transmissions.get()
    }
}

impl DirectionControl for SimDirection {
    fn assert_transmit(&mut self) {
        assert!(!self.driving.get(), "transmit enable raised twice");
        self.driving.set(true);
        self.transmissions.set(self.transmissions.get() + 1);
    }

    fn deassert_transmit(&mut self) {
        self.driving.set(false);
    }
}

#[allow(dead_code)]
/// Deterministic xorshift generator.
pub struct TestRng(u64);

#[allow(dead_code)]
impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }
}

impl RngCore for TestRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
