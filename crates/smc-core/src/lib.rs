//! The SMC itself: both PS/2 channels, the I2C slave, and the register
//! glue between them.
//!
//! [`Smc`] exposes one entry point per hardware event source:
//!
//! - [`Smc::keyboard_clock_edge`] / [`Smc::mouse_clock_edge`] — the PS/2
//!   clock ISRs;
//! - [`Smc::tick`] — the periodic timer (sequencers, transmit pacing,
//!   watchdogs);
//! - [`Smc::i2c_start_condition`] / [`Smc::i2c_counter_overflow`] — the
//!   two-wire interrupt pair, delegated to the slave engine.
//!
//! The bus handlers and the timer/ISR paths share the channels through
//! `Rc<RefCell<_>>`; the event sources never nest, so a borrow is always
//! exclusive to one entry point.

#![forbid(unsafe_code)]

pub mod regs;

use std::cell::RefCell;
use std::rc::Rc;

use smc_i2c::{Addresses, ConfigError, I2cSlave, ShiftControl, SlaveHandlers, TxBuffer};
use smc_pins::PinOps;
use smc_ps2::{
    FrameSink, KeyboardSequencer, KeyboardState, MouseAggregator, MouseSequencer, MouseState,
    Ps2Port, ScancodeDecoder,
};
use tracing::{debug, trace};

/// Per-port queue capacity in bytes.
const PS2_QUEUE: usize = 16;

/// The four PS/2 pins handed to [`Smc::new`].
pub struct SmcPinset {
    pub keyboard_clk: Box<dyn PinOps>,
    pub keyboard_dat: Box<dyn PinOps>,
    pub mouse_clk: Box<dyn PinOps>,
    pub mouse_dat: Box<dyn PinOps>,
}

struct KeyboardChannel {
    port: Ps2Port<PS2_QUEUE>,
    seq: KeyboardSequencer,
}

struct MouseChannel {
    port: Ps2Port<PS2_QUEUE>,
    seq: MouseSequencer,
}

pub struct Smc {
    keyboard: Rc<RefCell<KeyboardChannel>>,
    mouse: Rc<RefCell<MouseChannel>>,
    i2c: I2cSlave,
    powered: bool,
}

impl Smc {
    pub fn new(pins: SmcPinset) -> Result<Self, ConfigError> {
        let keyboard = Rc::new(RefCell::new(KeyboardChannel {
            port: Ps2Port::new(
                pins.keyboard_clk,
                pins.keyboard_dat,
                FrameSink::Keyboard(ScancodeDecoder::new()),
            ),
            seq: KeyboardSequencer::new(),
        }));
        let mouse = Rc::new(RefCell::new(MouseChannel {
            port: Ps2Port::new(
                pins.mouse_clk,
                pins.mouse_dat,
                FrameSink::Mouse(MouseAggregator::new()),
            ),
            seq: MouseSequencer::new(),
        }));

        let addrs = Addresses::new(regs::ADDR_GENERAL, regs::ADDR_KBD_FAST, regs::ADDR_MSE_FAST)?;
        let bus = SmcBus {
            keyboard: keyboard.clone(),
            mouse: mouse.clone(),
            pointer: 0,
            echo: 0,
        };
        let i2c = I2cSlave::new(addrs, Box::new(bus));

        Ok(Self {
            keyboard,
            mouse,
            i2c,
            powered: false,
        })
    }

    /// System power rail. Deasserting it abandons all in-flight device
    /// negotiation immediately and flushes both channels.
    pub fn set_system_power(&mut self, on: bool) {
        if self.powered == on {
            return;
        }
        debug!(on, "system power rail");
        self.powered = on;
        if !on {
            {
                let mut ch = self.keyboard.borrow_mut();
                let KeyboardChannel { port, seq } = &mut *ch;
                seq.tick(port, false);
                port.reset();
            }
            let mut ch = self.mouse.borrow_mut();
            let MouseChannel { port, seq } = &mut *ch;
            seq.tick(port, false);
            port.reset();
        }
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    /// Periodic timer ISR body.
    pub fn tick(&mut self) {
        {
            let mut ch = self.keyboard.borrow_mut();
            let KeyboardChannel { port, seq } = &mut *ch;
            seq.tick(port, self.powered);
            port.tick();
        }

        let mut ch = self.mouse.borrow_mut();
        let MouseChannel { port, seq } = &mut *ch;
        seq.tick(port, self.powered);
        port.tick();

        // Packet assembly follows the negotiated state: enabled with the
        // negotiated size once ready, raw pass-through otherwise.
        let ready = seq.is_ready();
        let size = seq.packet_size();
        if let Some(agg) = port.mouse() {
            if ready && agg.packet_size() != Some(size) {
                agg.enable(size);
            } else if !ready && agg.enabled() {
                agg.disable();
            }
        }
    }

    /// Keyboard-port clock ISR body.
    pub fn keyboard_clock_edge(&mut self, now_ms: u32) {
        self.keyboard.borrow_mut().port.on_falling_clock(now_ms);
    }

    /// Mouse-port clock ISR body.
    pub fn mouse_clock_edge(&mut self, now_ms: u32) {
        self.mouse.borrow_mut().port.on_falling_clock(now_ms);
    }

    /// I2C start/stop detector ISR body.
    pub fn i2c_start_condition(&mut self, scl_low: bool, sda_high: bool) -> ShiftControl {
        self.i2c.on_start_condition(scl_low, sda_high)
    }

    /// I2C counter-overflow ISR body.
    pub fn i2c_counter_overflow(&mut self, shifted: u8) -> ShiftControl {
        self.i2c.on_counter_overflow(shifted)
    }

    pub fn keyboard_state(&self) -> KeyboardState {
        self.keyboard.borrow().seq.state()
    }

    pub fn mouse_state(&self) -> MouseState {
        self.mouse.borrow().seq.state()
    }

    /// One-shot Ctrl+Alt+Del latch from the keyboard decoder.
    pub fn take_reset_request(&mut self) -> bool {
        let mut ch = self.keyboard.borrow_mut();
        ch.port
            .keyboard()
            .map(|dec| dec.take_reset_request())
            .unwrap_or(false)
    }

    /// One-shot Ctrl+Alt+PrtScr latch from the keyboard decoder.
    pub fn take_nmi_request(&mut self) -> bool {
        let mut ch = self.keyboard.borrow_mut();
        ch.port
            .keyboard()
            .map(|dec| dec.take_nmi_request())
            .unwrap_or(false)
    }
}

/// The register file and fast-path glue behind the slave engine.
struct SmcBus {
    keyboard: Rc<RefCell<KeyboardChannel>>,
    mouse: Rc<RefCell<MouseChannel>>,
    /// Register offset selected by the most recent master write.
    pointer: u8,
    echo: u8,
}

impl SmcBus {
    fn read_register(&mut self, reg: u8) -> u8 {
        match reg {
            regs::REG_KBD_AVAIL => self.keyboard.borrow().port.queue_len(),
            regs::REG_KBD_STATE => self.keyboard.borrow().seq.state().as_reg(),
            regs::REG_KBD_LEDS => self.keyboard.borrow().seq.leds(),
            regs::REG_MSE_AVAIL => {
                let mut ch = self.mouse.borrow_mut();
                ch.port.mouse().map(|agg| agg.queued()).unwrap_or(0)
            }
            regs::REG_MSE_ID => self.mouse.borrow().seq.mouse_id(),
            regs::REG_MSE_REQ_ID => self.mouse.borrow().seq.requested_id(),
            regs::REG_DBG_ECHO => self.echo,
            regs::REG_FW_MAJOR => regs::FW_MAJOR,
            regs::REG_FW_MINOR => regs::FW_MINOR,
            _ => {
                trace!(reg, "read of unmapped register");
                0xFF
            }
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            regs::REG_KBD_LEDS => self.keyboard.borrow_mut().seq.set_leds(value),
            regs::REG_MSE_REQ_ID => self.mouse.borrow_mut().seq.set_requested_id(value),
            regs::REG_DBG_ECHO => self.echo = value,
            _ => trace!(reg, value, "write to unmapped register"),
        }
    }
}

impl SlaveHandlers for SmcBus {
    /// Master write: first byte selects the register, any further bytes are
    /// written to consecutive offsets.
    fn on_receive(&mut self, data: &[u8]) {
        let Some((&offset, rest)) = data.split_first() else {
            return;
        };
        self.pointer = offset;
        let mut reg = offset;
        for &value in rest {
            self.write_register(reg, value);
            reg = reg.wrapping_add(1);
        }
    }

    fn fill_general(&mut self, tx: &mut TxBuffer) {
        let value = self.read_register(self.pointer);
        tx.push(value);
    }

    fn fill_keyboard(&mut self, tx: &mut TxBuffer) {
        if let Some(code) = self.keyboard.borrow_mut().port.next() {
            tx.push(code);
        }
    }

    fn fill_mouse(&mut self, tx: &mut TxBuffer) {
        let mut ch = self.mouse.borrow_mut();
        let size = ch.seq.packet_size();
        let Some(packet) = ch.port.mouse().and_then(|agg| agg.pop_packet()) else {
            return;
        };
        let (bytes, len) = packet.encode(size);
        tx.extend(&bytes[..len]);
    }
}
