//! Sequencer tests against a scripted command port: the device's bytes are
//! queued by the test, command outcomes are set explicitly, and every
//! command the sequencer issues is recorded.

use std::collections::VecDeque;

use smc_ps2::sequencer::{KeyboardState, MouseState};
use smc_ps2::{CommandPort, CommandStatus, KeyboardSequencer, MouseSequencer};

#[derive(Default)]
struct ScriptedPort {
    incoming: VecDeque<u8>,
    sent: Vec<(u8, Option<u8>)>,
    status: Option<CommandStatus>,
    bat: Option<u8>,
    flushes: u32,
}

impl ScriptedPort {
    fn push(&mut self, byte: u8) {
        self.incoming.push_back(byte);
    }

    fn ack(&mut self) {
        self.status = Some(CommandStatus::Acked);
    }

    fn resend(&mut self) {
        self.status = Some(CommandStatus::Errored);
    }

    fn last_sent(&self) -> (u8, Option<u8>) {
        *self.sent.last().unwrap()
    }
}

impl CommandPort for ScriptedPort {
    fn available(&self) -> bool {
        !self.incoming.is_empty()
    }

    fn next(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }

    fn flush(&mut self) {
        self.incoming.clear();
        self.flushes += 1;
    }

    fn send_command(&mut self, cmd: u8) {
        self.sent.push((cmd, None));
        self.status = Some(CommandStatus::Pending);
    }

    fn send_command_with_param(&mut self, cmd: u8, param: u8) {
        self.sent.push((cmd, Some(param)));
        self.status = Some(CommandStatus::Pending);
    }

    fn command_status(&self) -> CommandStatus {
        self.status.unwrap_or(CommandStatus::Idle)
    }

    fn take_bat(&mut self) -> Option<u8> {
        self.bat.take()
    }
}

/// Ticks until the sequencer issues its next command, acking along the way.
fn run_until_send(seq: &mut MouseSequencer, port: &mut ScriptedPort) -> (u8, Option<u8>) {
    let before = port.sent.len();
    for _ in 0..8 {
        seq.tick(port, true);
        if port.sent.len() > before {
            return port.last_sent();
        }
        if port.command_status() == CommandStatus::Pending {
            port.ack();
        }
    }
    panic!("sequencer issued no command; state {:?}", seq.state());
}

#[test]
fn wheel_mouse_negotiates_id_four() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::BatWait);

    port.push(0xAA);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::IdWait);
    port.push(0x00);
    seq.tick(&mut port, true);

    // Intellimouse knock for ID 4, then the identity probe.
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(200)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(200)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(80)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF2, None));
    port.ack();
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::IdByteWait);
    port.push(0x04);
    seq.tick(&mut port, true);

    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(60)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF4, None));
    port.ack();
    seq.tick(&mut port, true);

    assert!(seq.is_ready());
    assert_eq!(seq.mouse_id(), 4);
    assert_eq!(seq.packet_size(), 4);
}

#[test]
fn plain_mouse_downgrades_through_three_to_zero() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    // First pass: requested 4, probe answers 0.
    seq.tick(&mut port, true);
    port.push(0xAA);
    seq.tick(&mut port, true);
    port.push(0x00);
    seq.tick(&mut port, true);
    for _ in 0..4 {
        run_until_send(&mut seq, &mut port);
        port.ack();
    }
    seq.tick(&mut port, true);
    port.push(0x00);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::Reset);

    // The downgrade re-resets and retries with the wheel-only knock.
    assert_eq!(run_until_send(&mut seq, &mut port), (0xFF, None));
    port.ack();
    seq.tick(&mut port, true);
    port.push(0xAA);
    seq.tick(&mut port, true);
    port.push(0x00);
    seq.tick(&mut port, true);
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(200)));
    port.ack();
    assert_eq!(
        run_until_send(&mut seq, &mut port),
        (0xF3, Some(100)),
        "second knock byte distinguishes the wheel-only attempt"
    );
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(80)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF2, None));
    port.ack();
    seq.tick(&mut port, true);
    port.push(0x00);
    seq.tick(&mut port, true);

    // Wheel-only probe answering 0 settles on a standard mouse.
    assert_eq!(seq.state(), MouseState::SetSampleRate);
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(60)));
    port.ack();
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF4, None));
    port.ack();
    seq.tick(&mut port, true);

    assert!(seq.is_ready());
    assert_eq!(seq.mouse_id(), 0);
    assert_eq!(seq.packet_size(), 3);
}

#[test]
fn silent_mouse_is_reset_by_the_watchdog() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::BatWait);

    // No BAT ever arrives; the watchdog budget runs out and the sequencer
    // falls back to a reset.
    for _ in 0..300 {
        seq.tick(&mut port, true);
        if !port.sent.is_empty() {
            break;
        }
    }
    assert_eq!(port.last_sent(), (0xFF, None));
    assert_eq!(seq.state(), MouseState::ResetAck);
}

#[test]
fn dead_mouse_gets_repeated_resets() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    // Nothing ever answers, so every issued command pends forever. Each
    // watchdog expiry must land back in Reset and actually reissue the
    // reset command, pending or not.
    for _ in 0..600 {
        seq.tick(&mut port, true);
    }
    let resets = port.sent.iter().filter(|&&cmd| cmd == (0xFF, None)).count();
    assert!(resets >= 2, "only {resets} reset(s) issued");
    assert_eq!(seq.state(), MouseState::ResetAck);
}

#[test]
fn dead_keyboard_gets_repeated_resets() {
    let mut seq = KeyboardSequencer::new();
    let mut port = ScriptedPort::default();

    for _ in 0..600 {
        seq.tick(&mut port, true);
    }
    let resets = port.sent.iter().filter(|&&cmd| cmd == (0xFF, None)).count();
    assert!(resets >= 2, "only {resets} reset(s) issued");
    assert_eq!(seq.state(), KeyboardState::ResetAck);
}

#[test]
fn reset_ack_burst_keeps_bat_and_id() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    seq.request_reset();
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xFF, None));

    // A prompt device answers ACK, BAT and ID in one burst; the queued
    // BAT/ID bytes must survive the ResetAck transition.
    port.ack();
    port.push(0xAA);
    port.push(0x00);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::Knock1);
    assert_eq!(run_until_send(&mut seq, &mut port), (0xF3, Some(200)));
}

#[test]
fn bat_failure_parks_the_mouse() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    port.push(0xFC);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::Failed);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::Failed);
}

#[test]
fn power_loss_returns_the_mouse_to_off() {
    let mut seq = MouseSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    port.push(0xAA);
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::IdWait);

    seq.tick(&mut port, false);
    assert_eq!(seq.state(), MouseState::Off);
    assert_eq!(port.flushes, 1);

    // Power restored: init starts over from BAT.
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), MouseState::BatWait);
}

#[test]
fn keyboard_reaches_ready_through_bat_and_leds() {
    let mut seq = KeyboardSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    assert_eq!(seq.state(), KeyboardState::BatWait);
    assert_eq!(seq.state().as_reg(), 0x02);

    port.bat = Some(0xAA);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xED, Some(0x02)));
    port.ack();
    seq.tick(&mut port, true);

    assert!(seq.is_ready());
    assert_eq!(seq.state().as_reg(), 0x01);
}

#[test]
fn led_update_reissues_the_command_when_ready() {
    let mut seq = KeyboardSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    port.bat = Some(0xAA);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    port.ack();
    seq.tick(&mut port, true);
    assert!(seq.is_ready());

    seq.set_leds(0x05);
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xED, Some(0x05)));
    port.ack();
    seq.tick(&mut port, true);
    assert!(seq.is_ready());
    assert_eq!(seq.leds(), 0x05);
}

#[test]
fn keyboard_bat_failure_triggers_a_reset() {
    let mut seq = KeyboardSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    port.bat = Some(0xFC);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xFF, None));
    assert_eq!(seq.state(), KeyboardState::ResetAck);

    // Reset ACKed: back to waiting for the self test.
    port.ack();
    seq.tick(&mut port, true);
    assert_eq!(seq.state(), KeyboardState::BatWait);
}

#[test]
fn resend_during_led_setup_falls_back_to_reset() {
    let mut seq = KeyboardSequencer::new();
    let mut port = ScriptedPort::default();

    seq.tick(&mut port, true);
    port.bat = Some(0xAA);
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xED, Some(0x02)));

    port.resend();
    seq.tick(&mut port, true);
    seq.tick(&mut port, true);
    assert_eq!(port.last_sent(), (0xFF, None));
}
