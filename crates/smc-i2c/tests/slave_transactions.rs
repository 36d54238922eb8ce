//! Transaction-level tests driven at the shift-register interface: the
//! test plays the master, feeding shifted bytes/bits into the ISR entry
//! points and checking every directive the engine hands back.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use smc_i2c::{Addresses, BusState, I2cSlave, ShiftControl, SlaveHandlers, TxBuffer};

const GENERAL: u8 = 0x42;
const KBD: u8 = 0x43;
const MSE: u8 = 0x44;

#[derive(Default)]
struct Shared {
    received: Vec<Vec<u8>>,
    general_reply: Vec<u8>,
    keyboard_queue: VecDeque<u8>,
    mouse_queue: VecDeque<Vec<u8>>,
}

#[derive(Clone, Default)]
struct TestHandlers(Rc<RefCell<Shared>>);

impl SlaveHandlers for TestHandlers {
    fn on_receive(&mut self, data: &[u8]) {
        self.0.borrow_mut().received.push(data.to_vec());
    }

    fn fill_general(&mut self, tx: &mut TxBuffer) {
        tx.extend(&self.0.borrow().general_reply);
    }

    fn fill_keyboard(&mut self, tx: &mut TxBuffer) {
        if let Some(byte) = self.0.borrow_mut().keyboard_queue.pop_front() {
            tx.push(byte);
        }
    }

    fn fill_mouse(&mut self, tx: &mut TxBuffer) {
        if let Some(packet) = self.0.borrow_mut().mouse_queue.pop_front() {
            tx.extend(&packet);
        }
    }
}

fn slave() -> (I2cSlave, TestHandlers) {
    let handlers = TestHandlers::default();
    let addrs = Addresses::new(GENERAL, KBD, MSE).unwrap();
    (I2cSlave::new(addrs, Box::new(handlers.clone())), handlers)
}

fn start(slave: &mut I2cSlave) {
    assert_eq!(
        slave.on_start_condition(true, false),
        ShiftControl::ReadByte
    );
}

fn stop(slave: &mut I2cSlave) {
    assert_eq!(slave.on_start_condition(false, true), ShiftControl::Listen);
}

/// Addresses the slave; true if the address byte was ACKed.
fn address(slave: &mut I2cSlave, addr: u8, read: bool) -> bool {
    match slave.on_counter_overflow(addr << 1 | read as u8) {
        ShiftControl::WriteBit { sda_low: true } => true,
        ShiftControl::Listen => false,
        other => panic!("unexpected address directive {other:?}"),
    }
}

/// Writes `bytes` after a successful address; returns how many were ACKed.
fn master_write(slave: &mut I2cSlave, bytes: &[u8]) -> usize {
    let mut acked = 0;
    for &byte in bytes {
        assert_eq!(slave.on_counter_overflow(0), ShiftControl::ReadByte);
        match slave.on_counter_overflow(byte) {
            ShiftControl::WriteBit { sda_low: true } => acked += 1,
            ShiftControl::WriteBit { sda_low: false } => break,
            other => panic!("unexpected data directive {other:?}"),
        }
    }
    acked
}

/// Reads `n` bytes after a successful address, NACKing the last one.
fn master_read(slave: &mut I2cSlave, n: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut ctl = slave.on_counter_overflow(0);
    for i in 0..n {
        let byte = match ctl {
            ShiftControl::WriteByte { byte } => byte,
            other => panic!("expected data byte, got {other:?}"),
        };
        out.push(byte);
        assert_eq!(slave.on_counter_overflow(byte), ShiftControl::ReadBit);
        let last = i + 1 == n;
        ctl = slave.on_counter_overflow(last as u8);
    }
    assert_eq!(ctl, ShiftControl::Listen, "master NACK must end the read");
    out
}

#[test]
fn register_write_is_delivered_at_the_stop_condition() {
    let (mut slave, handlers) = slave();

    start(&mut slave);
    assert!(address(&mut slave, GENERAL, false));
    assert_eq!(master_write(&mut slave, &[0x09, 0x01]), 2);
    assert!(handlers.0.borrow().received.is_empty(), "not delivered yet");

    stop(&mut slave);
    assert_eq!(handlers.0.borrow().received, vec![vec![0x09, 0x01]]);
    assert_eq!(slave.state(), BusState::Stopped);
}

#[test]
fn repeated_start_also_delivers_the_pending_write() {
    let (mut slave, handlers) = slave();

    start(&mut slave);
    assert!(address(&mut slave, GENERAL, false));
    master_write(&mut slave, &[0x08]);

    // Typical register read: write the offset, repeated start, read back.
    handlers.0.borrow_mut().general_reply = vec![0x05];
    start(&mut slave);
    assert_eq!(handlers.0.borrow().received, vec![vec![0x08]]);
    assert!(address(&mut slave, GENERAL, true));
    assert_eq!(master_read(&mut slave, 1), vec![0x05]);
    stop(&mut slave);
}

#[test]
fn unclaimed_address_and_general_call_are_ignored() {
    let (mut slave, handlers) = slave();

    start(&mut slave);
    assert!(!address(&mut slave, 0x17, false));
    assert_eq!(slave.state(), BusState::AddressMismatch);
    stop(&mut slave);

    start(&mut slave);
    assert!(!address(&mut slave, 0x00, false));
    stop(&mut slave);

    assert!(handlers.0.borrow().received.is_empty());
}

#[test]
fn exhausted_read_pads_with_all_ones() {
    let (mut slave, handlers) = slave();
    handlers.0.borrow_mut().general_reply = vec![0xAB];

    start(&mut slave);
    assert!(address(&mut slave, GENERAL, true));
    assert_eq!(master_read(&mut slave, 3), vec![0xAB, 0xFF, 0xFF]);
    stop(&mut slave);
}

#[test]
fn keyboard_fast_path_yields_one_code_per_transaction() {
    let (mut slave, handlers) = slave();
    handlers
        .0
        .borrow_mut()
        .keyboard_queue
        .extend([0x1C, 0x9C]);

    for expected in [0x1C, 0x9C] {
        start(&mut slave);
        assert!(address(&mut slave, KBD, true));
        assert_eq!(master_read(&mut slave, 1), vec![expected]);
        stop(&mut slave);
    }
}

#[test]
fn empty_fast_path_nacks_the_address() {
    let (mut slave, _) = slave();

    start(&mut slave);
    assert!(!address(&mut slave, KBD, true), "empty queue must NACK");
    assert_eq!(slave.state(), BusState::AddressMismatch);
    stop(&mut slave);
    assert_eq!(slave.state(), BusState::Stopped);
}

#[test]
fn fast_path_rejects_writes() {
    let (mut slave, handlers) = slave();
    handlers.0.borrow_mut().keyboard_queue.push_back(0x1C);

    start(&mut slave);
    assert!(!address(&mut slave, KBD, false));
    stop(&mut slave);
    assert!(handlers.0.borrow().received.is_empty());
}

#[test]
fn mouse_fast_path_returns_a_whole_packet() {
    let (mut slave, handlers) = slave();
    handlers
        .0
        .borrow_mut()
        .mouse_queue
        .push_back(vec![0x09, 0x05, 0xFB, 0x01]);

    start(&mut slave);
    assert!(address(&mut slave, MSE, true));
    assert_eq!(master_read(&mut slave, 4), vec![0x09, 0x05, 0xFB, 0x01]);
    stop(&mut slave);
}

#[test]
fn write_overflow_nacks_and_aborts() {
    let (mut slave, handlers) = slave();
    let data: Vec<u8> = (0..40).collect();

    start(&mut slave);
    assert!(address(&mut slave, GENERAL, false));
    assert_eq!(master_write(&mut slave, &data), 32);
    assert_eq!(slave.state(), BusState::SlaveAborted);

    // Whatever fit is still delivered.
    stop(&mut slave);
    assert_eq!(handlers.0.borrow().received[0].len(), 32);
}

#[test]
fn master_nack_mid_stream_leaves_the_rest_queued() {
    let (mut slave, handlers) = slave();
    handlers.0.borrow_mut().general_reply = vec![1, 2, 3, 4];

    start(&mut slave);
    assert!(address(&mut slave, GENERAL, true));
    assert_eq!(master_read(&mut slave, 2), vec![1, 2]);
    assert_eq!(slave.state(), BusState::MasterAborted);
    stop(&mut slave);
}
