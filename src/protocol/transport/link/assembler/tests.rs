//! Reassembly tests covering split reads, stalls, noise and back-to-back frames.
use super::*;
use crate::protocol::address::NodeAddress;
use crate::protocol::messages::PacketType;
use crate::protocol::transport::frame::encode;
use std::collections::VecDeque;

const TIMEOUT: u64 = 174;

/// UART double fed by the test.
#[derive(Default)]
struct MockUart {
    rx: VecDeque<u8>,
}

impl MockUart {
    fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl ByteTransport for MockUart {
    type Error = ();

    fn bytes_available(&mut self) -> usize {
        self.rx.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let count = buf.len().min(self.rx.len());
        for slot in buf.iter_mut().take(count) {
            *slot = self.rx.pop_front().ok_or(())?;
        }
        Ok(count)
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), ()> {
        Ok(())
    }
}

fn strike_frame(seq: u8) -> crate::core::EncodedFrame {
    encode(
        NodeAddress(0x0203),
        NodeAddress::MASTER,
        PacketType::Strike.code(),
        seq,
        &[0xAA, 0xBB],
    )
    .unwrap()
}

fn expect_complete(event: RxEvent) -> Inbound {
    match event {
        RxEvent::Complete(inbound) => inbound,
        other => panic!("expected a complete frame, got {other:?}"),
    }
}

#[test]
fn test_idle_without_bytes() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    assert_eq!(assembler.pump(&mut uart, 0, TIMEOUT), Ok(RxEvent::Idle));
}

#[test]
/// A frame already fully buffered needs two pumps at most: Length, then body.
fn test_complete_frame() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    uart.feed(strike_frame(7).as_bytes());

    let inbound = expect_complete(assembler.pump(&mut uart, 0, TIMEOUT).unwrap());
    assert_eq!(inbound.source, NodeAddress(0x0203));
    assert_eq!(inbound.kind(), Ok(PacketType::Strike));
    assert_eq!(inbound.seq, 7);
    assert_eq!(inbound.payload.as_slice(), &[0xAA, 0xBB]);
    assert_eq!(assembler.buffered(), 0);
    assert_eq!(assembler.rx_timeout(), None);
}

#[test]
/// Bytes trickling in are accumulated, each read re-arming the timeout.
fn test_split_frame() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    let frame = strike_frame(1);
    let bytes = frame.as_bytes();

    uart.feed(&bytes[..1]);
    assert_eq!(assembler.pump(&mut uart, 10, TIMEOUT), Ok(RxEvent::InProgress));
    assert_eq!(assembler.rx_timeout(), Some(10 + TIMEOUT));

    uart.feed(&bytes[1..5]);
    assert_eq!(assembler.pump(&mut uart, 100, TIMEOUT), Ok(RxEvent::InProgress));
    assert_eq!(assembler.buffered(), 5);
    assert_eq!(assembler.rx_timeout(), Some(100 + TIMEOUT));

    // Quiet but within the timeout: keep waiting.
    assert_eq!(assembler.pump(&mut uart, 200, TIMEOUT), Ok(RxEvent::InProgress));

    uart.feed(&bytes[5..]);
    let inbound = expect_complete(assembler.pump(&mut uart, 250, TIMEOUT).unwrap());
    assert_eq!(inbound.seq, 1);
}

#[test]
/// A stalled frame is dropped and the next Length byte starts over.
fn test_stalled_frame_aborts() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    let frame = strike_frame(2);

    uart.feed(&frame.as_bytes()[..4]);
    assert_eq!(assembler.pump(&mut uart, 0, TIMEOUT), Ok(RxEvent::InProgress));
    assert_eq!(assembler.pump(&mut uart, TIMEOUT, TIMEOUT), Ok(RxEvent::Aborted));
    assert_eq!(assembler.buffered(), 0);

    uart.feed(strike_frame(3).as_bytes());
    let inbound = expect_complete(assembler.pump(&mut uart, 1_000, TIMEOUT).unwrap());
    assert_eq!(inbound.seq, 3);
}

#[test]
/// Only the Length byte arrived: the timeout armed on that byte still fires.
fn test_lone_length_byte_aborts() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    uart.feed(&[0x08]);

    assert_eq!(assembler.pump(&mut uart, 50, TIMEOUT), Ok(RxEvent::InProgress));
    assert_eq!(assembler.pump(&mut uart, 50 + TIMEOUT - 1, TIMEOUT), Ok(RxEvent::InProgress));
    assert_eq!(assembler.pump(&mut uart, 50 + TIMEOUT, TIMEOUT), Ok(RxEvent::Aborted));
}

#[test]
/// A Length byte too small for a real frame is dropped on its own.
fn test_short_length_byte_discarded() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    uart.feed(&[0x02]);
    uart.feed(strike_frame(4).as_bytes());

    assert_eq!(assembler.pump(&mut uart, 0, TIMEOUT), Ok(RxEvent::Discarded));
    let inbound = expect_complete(assembler.pump(&mut uart, 1, TIMEOUT).unwrap());
    assert_eq!(inbound.seq, 4);
}

#[test]
fn test_corrupted_frame_rejected() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    let frame = strike_frame(5);
    let mut bytes = [0u8; 16];
    bytes[..frame.len()].copy_from_slice(frame.as_bytes());
    bytes[3] ^= 0x10;
    uart.feed(&bytes[..frame.len()]);

    match assembler.pump(&mut uart, 0, TIMEOUT).unwrap() {
        RxEvent::Rejected(FrameError::ChecksumMismatch { .. }) => {}
        other => panic!("expected a checksum rejection, got {other:?}"),
    }
    assert_eq!(assembler.buffered(), 0);
}

#[test]
/// The assembler never reads past the current frame.
fn test_back_to_back_frames() {
    let mut uart = MockUart::default();
    let mut assembler = FrameAssembler::new();
    uart.feed(strike_frame(10).as_bytes());
    uart.feed(strike_frame(11).as_bytes());

    assert_eq!(expect_complete(assembler.pump(&mut uart, 0, TIMEOUT).unwrap()).seq, 10);
    assert_eq!(uart.bytes_available(), strike_frame(11).len());
    assert_eq!(expect_complete(assembler.pump(&mut uart, 1, TIMEOUT).unwrap()).seq, 11);
}
