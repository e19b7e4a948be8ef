//! Handler registration, routing and the auto-ACK decision.
use super::*;

#[derive(Default)]
struct Counter {
    configures: usize,
    last_payload: std::vec::Vec<u8>,
}

fn frame(packet_type: u8, dest: NodeAddress, payload: &[u8]) -> Inbound {
    Inbound {
        source: NodeAddress::MASTER,
        dest,
        packet_type,
        seq: 0x10,
        payload: Payload::from_slice(payload).unwrap(),
    }
}

fn on_configure(state: &mut Counter, inbound: &Inbound, _outbox: &mut Outbox) -> bool {
    state.configures += 1;
    state.last_payload = inbound.payload.as_slice().to_vec();
    false
}

fn on_read_status(_state: &mut Counter, inbound: &Inbound, outbox: &mut Outbox) -> bool {
    outbox.send(inbound.source, PacketType::Status, &[0x01]);
    true
}

fn outbox() -> Outbox {
    Outbox::new(NodeAddress(0x0203), Mode::Ready)
}

//==================================================================================ROUTING
#[test]
/// A unicast frame reaches its handler and asks for exactly one auto-ACK.
fn test_unicast_handled_with_auto_ack() {
    let table = DispatchTable::new().with(PacketType::Configure, on_configure);
    let mut state = Counter::default();
    let mut out = outbox();
    let inbound = frame(PacketType::Configure.code(), NodeAddress(0x0203), &[1, 2, 3, 4, 5]);

    let disposition = table.dispatch(&mut state, &inbound, &mut out);

    assert_eq!(disposition, Disposition::Handled { auto_ack: true });
    assert_eq!(state.configures, 1);
    assert_eq!(state.last_payload, [1, 2, 3, 4, 5]);
    assert!(out.actions().is_empty());
}

#[test]
/// Group and global broadcasts never get an ACK.
fn test_broadcast_never_auto_acked() {
    let table = DispatchTable::new().with(PacketType::Configure, on_configure);
    let mut state = Counter::default();
    for dest in [NodeAddress(0x02FF), NodeAddress::BROADCAST_ALL] {
        let inbound = frame(PacketType::Configure.code(), dest, &[]);
        assert_eq!(
            table.dispatch(&mut state, &inbound, &mut outbox()),
            Disposition::Handled { auto_ack: false }
        );
    }
    assert_eq!(state.configures, 2);
}

#[test]
/// A handler that replies itself suppresses the auto-ACK.
fn test_handler_claims_its_ack() {
    let table = DispatchTable::new().with(PacketType::ReadStatus, on_read_status);
    let mut out = outbox();
    let inbound = frame(PacketType::ReadStatus.code(), NodeAddress(0x0203), &[]);
    assert_eq!(
        table.dispatch(&mut Counter::default(), &inbound, &mut out),
        Disposition::Handled { auto_ack: false }
    );
    assert!(matches!(
        out.actions(),
        [Action::Send { dest: NodeAddress::MASTER, packet_type: PacketType::Status, .. }]
    ));
}

#[test]
fn test_unknown_or_unregistered_type() {
    let table: DispatchTable<Counter> = DispatchTable::new();
    let mut state = Counter::default();
    for code in [PacketType::Start.code(), 0x42] {
        let inbound = frame(code, NodeAddress(0x0203), &[]);
        assert_eq!(
            table.dispatch(&mut state, &inbound, &mut outbox()),
            Disposition::Unhandled
        );
    }
}

//==================================================================================REGISTRATION
#[test]
fn test_register_replaces_and_unregisters() {
    let mut table = DispatchTable::<Counter>::empty();
    assert!(table.handler(PacketType::Stop.code()).is_none());
    assert!(table.register(PacketType::Configure, on_configure).is_none());
    assert!(table.register(PacketType::Configure, on_read_status).is_some());
    assert!(table.unregister(PacketType::Configure).is_some());
    assert!(table.handler(PacketType::Configure.code()).is_none());
}

//==================================================================================STOCK_HANDLERS
#[test]
/// The default table resets the node on STOP and ACKs it.
fn test_base_stop() {
    let table = DispatchTable::<Counter>::new();
    let mut out = outbox();
    let inbound = frame(PacketType::Stop.code(), NodeAddress(0x0203), &[]);
    assert_eq!(
        table.dispatch(&mut Counter::default(), &inbound, &mut out),
        Disposition::Handled { auto_ack: true }
    );
    assert_eq!(out.actions(), [Action::Reset]);
}

#[test]
fn test_request_id_schedules_reply() {
    let table = DispatchTable::<Counter>::new().with(PacketType::RequestId, request_id);
    let mut out = outbox();
    let inbound = frame(PacketType::RequestId.code(), NodeAddress::BROADCAST_ALL, &[]);
    table.dispatch(&mut Counter::default(), &inbound, &mut out);
    assert_eq!(
        out.actions(),
        [Action::ScheduleIdReply { to: NodeAddress::MASTER }]
    );
}

#[test]
fn test_stop_on_error_broadcasts_stop() {
    let table = DispatchTable::<Counter>::new().with(PacketType::Error, stop_on_error);
    let mut out = outbox();
    let inbound = frame(PacketType::Error.code(), NodeAddress(0x0203), &[]);
    assert_eq!(
        table.dispatch(&mut Counter::default(), &inbound, &mut out),
        Disposition::Handled { auto_ack: true }
    );
    assert_eq!(
        out.actions(),
        [Action::Send {
            dest: NodeAddress::BROADCAST_ALL,
            packet_type: PacketType::Stop,
            payload: Payload::new(),
        }]
    );
}

//==================================================================================OUTBOX
#[test]
/// Actions past capacity and oversized payloads are counted, not kept.
fn test_outbox_overflow() {
    let mut out = outbox();
    for _ in 0..OUTBOX_CAPACITY + 2 {
        out.set_mode(Mode::Armed);
    }
    out.send(NodeAddress::MASTER, PacketType::Sound, &[0u8; crate::core::MAX_PAYLOAD_LEN + 1]);
    assert_eq!(out.actions().len(), OUTBOX_CAPACITY);
    assert_eq!(out.dropped(), 3);

    let taken = out.take_actions();
    assert_eq!(taken.len(), OUTBOX_CAPACITY);
    assert!(out.actions().is_empty());
    assert_eq!(out.dropped(), 0);
}
