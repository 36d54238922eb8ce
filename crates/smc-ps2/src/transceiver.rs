//! PS/2 bit-level transceiver.
//!
//! One [`Ps2Port`] per physical port. The device owns the clock; every
//! falling edge lands in [`Ps2Port::on_falling_clock`], which either shifts
//! a received bit in or drives the next transmitted bit out. Host-to-device
//! commands go through the request-to-send sequence, which is paced by the
//! periodic [`Ps2Port::tick`] rather than the clock ISR (the clock is
//! silent until the device notices the request).

use smc_pins::PinOps;
use tracing::trace;

use crate::codes;
use crate::keyboard::ScancodeDecoder;
use crate::mouse::MouseAggregator;
use crate::ring::RingBuffer;

/// Gap after which an incoming frame is considered abandoned and the next
/// edge starts a new one.
pub const FRAME_TIMEOUT_MS: u32 = 50;

/// Outcome of the most recent host-to-device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// No command since the last reset.
    Idle,
    /// Queued or on the wire; response not seen yet.
    Pending,
    /// Device acknowledged every byte of the command.
    Acked,
    /// Device answered Resend; the caller decides whether to retry.
    Errored,
}

/// Semantic layer the received bytes feed into, fixed at construction.
#[derive(Debug)]
pub enum FrameSink {
    Keyboard(ScancodeDecoder),
    Mouse(MouseAggregator),
    /// Bytes go straight to the ring buffer.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Receive,
    Send,
}

/// Timer-paced request-to-send progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxPhase {
    Idle,
    /// Next tick pulls the clock low (inhibits the device).
    InhibitClock,
    /// Next tick pulls data low and releases the clock; the device starts
    /// clocking the frame.
    RequestToSend,
}

pub struct Ps2Port<const N: usize> {
    clk: Box<dyn PinOps>,
    dat: Box<dyn PinOps>,
    buffer: RingBuffer<N>,
    sink: FrameSink,

    direction: Direction,
    bit_count: u8,
    shift: u8,
    parity: u8,
    last_bit_ms: u32,

    cmd: [u8; 2],
    cmd_len: u8,
    cmd_sent: u8,
    status: CommandStatus,
    tx_phase: TxPhase,

    framing_errors: u16,
}

impl<const N: usize> Ps2Port<N> {
    pub fn new(clk: Box<dyn PinOps>, dat: Box<dyn PinOps>, sink: FrameSink) -> Self {
        let mut port = Self {
            clk,
            dat,
            buffer: RingBuffer::new(),
            sink,
            direction: Direction::Receive,
            bit_count: 0,
            shift: 0,
            parity: 0,
            last_bit_ms: 0,
            cmd: [0; 2],
            cmd_len: 0,
            cmd_sent: 0,
            status: CommandStatus::Idle,
            tx_phase: TxPhase::Idle,
            framing_errors: 0,
        };
        port.clk.release();
        port.dat.release();
        port
    }

    /// Clock-edge ISR body. `now_ms` is a wrapping millisecond timestamp.
    pub fn on_falling_clock(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.last_bit_ms) >= FRAME_TIMEOUT_MS
            && self.direction == Direction::Receive
            && self.bit_count != 0
        {
            // Haven't heard from the device in a while; this edge starts a
            // new frame.
            trace!(stale_bits = self.bit_count, "ps2 frame timeout");
            self.reset_receiver();
        }
        self.last_bit_ms = now_ms;

        match self.direction {
            Direction::Receive => self.receive_bit(),
            Direction::Send => self.send_bit(),
        }
    }

    fn receive_bit(&mut self) {
        let bit = self.dat.read().is_high() as u8;
        match self.bit_count {
            0 => {
                // Start bit must be low.
                if bit == 0 {
                    self.bit_count = 1;
                } else {
                    self.framing_errors = self.framing_errors.wrapping_add(1);
                }
            }
            1..=8 => {
                // Data, LSB first.
                if bit != 0 {
                    self.shift |= 1 << (self.bit_count - 1);
                }
                self.parity += bit;
                self.bit_count += 1;
            }
            9 => {
                self.parity += bit;
                self.bit_count += 1;
            }
            _ => {
                // Stop bit. Odd parity: data+parity bits must sum odd.
                if bit != 1 || self.parity & 1 != 1 {
                    // Recorded but the byte is still delivered; peripherals
                    // retransmit at the protocol layer when it matters.
                    self.framing_errors = self.framing_errors.wrapping_add(1);
                    trace!(byte = self.shift, "ps2 framing error");
                }
                let byte = self.shift;
                self.reset_receiver();
                self.deliver(byte);
            }
        }
    }

    fn send_bit(&mut self) {
        match self.bit_count {
            0..=7 => {
                let bit = self.shift >> self.bit_count & 1;
                if bit == 0 {
                    self.dat.drive_low();
                } else {
                    self.dat.release();
                }
                self.parity += bit;
                self.bit_count += 1;
            }
            8 => {
                // Odd parity bit: high iff the data had an even bit count.
                if self.parity & 1 == 0 {
                    self.dat.release();
                } else {
                    self.dat.drive_low();
                }
                self.bit_count += 1;
            }
            9 => {
                // Stop bit: released line.
                self.dat.release();
                self.bit_count += 1;
            }
            _ => {
                // Device line-ACK bit (it pulls data low for one clock).
                if self.dat.read().is_high() {
                    self.framing_errors = self.framing_errors.wrapping_add(1);
                }
                self.direction = Direction::Receive;
                self.reset_receiver();
            }
        }
    }

    /// Periodic timer tick: advances the request-to-send sequence.
    pub fn tick(&mut self) {
        match self.tx_phase {
            TxPhase::Idle => {}
            TxPhase::InhibitClock => {
                self.clk.drive_low();
                self.tx_phase = TxPhase::RequestToSend;
            }
            TxPhase::RequestToSend => {
                self.dat.drive_low();
                self.clk.release();
                self.shift = self.cmd[self.cmd_sent as usize];
                self.cmd_sent += 1;
                self.direction = Direction::Send;
                self.bit_count = 0;
                self.parity = 0;
                self.tx_phase = TxPhase::Idle;
            }
        }
    }

    /// Queues a one-byte command. Resets any in-flight transfer state; the
    /// request-to-send sequence starts on the next tick.
    pub fn send_command(&mut self, cmd: u8) {
        self.cmd = [cmd, 0];
        self.cmd_len = 1;
        self.start_command();
    }

    /// Queues a two-byte command. The parameter byte is transmitted
    /// automatically once the device ACKs the first byte, so callers see a
    /// single pending/acked/errored outcome for the pair.
    pub fn send_command_with_param(&mut self, cmd: u8, param: u8) {
        self.cmd = [cmd, param];
        self.cmd_len = 2;
        self.start_command();
    }

    fn start_command(&mut self) {
        self.cmd_sent = 0;
        self.status = CommandStatus::Pending;
        self.direction = Direction::Receive;
        self.reset_receiver();
        self.tx_phase = TxPhase::InhibitClock;
    }

    pub fn command_status(&self) -> CommandStatus {
        self.status
    }

    /// Frame-level error counter (missing start/stop bit, bad parity,
    /// missing device line-ACK).
    pub fn framing_errors(&self) -> u16 {
        self.framing_errors
    }

    /// Full port reset: receiver state, buffers, command machinery.
    /// Used on power loss.
    pub fn reset(&mut self) {
        self.direction = Direction::Receive;
        self.reset_receiver();
        self.buffer.flush();
        self.status = CommandStatus::Idle;
        self.tx_phase = TxPhase::Idle;
        self.cmd_len = 0;
        self.cmd_sent = 0;
        self.clk.release();
        self.dat.release();
        match &mut self.sink {
            FrameSink::Keyboard(dec) => dec.reset(),
            FrameSink::Mouse(agg) => agg.disable(),
            FrameSink::Raw => {}
        }
    }

    fn reset_receiver(&mut self) {
        self.bit_count = 0;
        self.shift = 0;
        self.parity = 0;
    }

    fn deliver(&mut self, byte: u8) {
        if self.status == CommandStatus::Pending && self.tx_phase == TxPhase::Idle {
            match byte {
                codes::ACK => {
                    if self.cmd_sent < self.cmd_len {
                        // Second byte of a two-byte command.
                        self.tx_phase = TxPhase::InhibitClock;
                    } else {
                        self.status = CommandStatus::Acked;
                    }
                    return;
                }
                codes::RESEND => {
                    self.status = CommandStatus::Errored;
                    return;
                }
                // Anything else (BAT, ID bytes) belongs to the sink.
                _ => {}
            }
        }
        match &mut self.sink {
            FrameSink::Keyboard(dec) => dec.process(byte, &mut self.buffer),
            FrameSink::Mouse(agg) => agg.process(byte, &mut self.buffer),
            FrameSink::Raw => {
                self.buffer.push(byte);
            }
        }
    }

    /// True if [`Ps2Port::next`] would yield a byte.
    pub fn available(&self) -> bool {
        if self.buffer.available() {
            return true;
        }
        match &self.sink {
            FrameSink::Keyboard(dec) => dec.replay_pending(),
            _ => false,
        }
    }

    /// Queued byte count, including any keyboard modifier replay that will
    /// materialize once the buffer drains.
    pub fn queue_len(&self) -> u8 {
        let extra = match &self.sink {
            FrameSink::Keyboard(dec) => dec.pending_replay_len(),
            _ => 0,
        };
        self.buffer.len() + extra
    }

    /// Pops the next byte for the consumer (main loop / I2C fill).
    pub fn next(&mut self) -> Option<u8> {
        if self.buffer.is_empty() {
            if let FrameSink::Keyboard(dec) = &mut self.sink {
                dec.maybe_replay(&mut self.buffer);
            }
        }
        self.buffer.pop()
    }

    /// Drops all buffered bytes.
    pub fn flush(&mut self) {
        self.buffer.flush();
    }

    pub fn keyboard(&mut self) -> Option<&mut ScancodeDecoder> {
        match &mut self.sink {
            FrameSink::Keyboard(dec) => Some(dec),
            _ => None,
        }
    }

    pub fn mouse(&mut self) -> Option<&mut MouseAggregator> {
        match &mut self.sink {
            FrameSink::Mouse(agg) => Some(agg),
            _ => None,
        }
    }
}

impl<const N: usize> std::fmt::Debug for Ps2Port<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ps2Port")
            .field("direction", &self.direction)
            .field("bit_count", &self.bit_count)
            .field("status", &self.status)
            .field("queue_len", &self.buffer.len())
            .field("framing_errors", &self.framing_errors)
            .finish()
    }
}
