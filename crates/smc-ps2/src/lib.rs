//! PS/2 side of the SMC: bit-level transceiver, scan-code decoder, mouse
//! packet aggregator, and the device init sequencers.
//!
//! Everything here is a plain state machine with explicit entry points for
//! the contexts that drive it on hardware:
//!
//! - [`Ps2Port::on_falling_clock`] — the per-port clock-edge ISR;
//! - [`Ps2Port::tick`] and the sequencer `tick`s — the periodic timer ISR;
//! - `available`/`next`-style getters — the main loop.
//!
//! No entry point blocks or allocates; buffers are fixed-capacity rings.

#![forbid(unsafe_code)]

pub mod keyboard;
pub mod keymap;
pub mod mouse;
pub mod ring;
pub mod sequencer;
pub mod transceiver;

pub use keyboard::{Modifiers, ScancodeDecoder};
pub use mouse::{MouseAggregator, MousePacket};
pub use ring::RingBuffer;
pub use sequencer::{
    CommandPort, KeyboardSequencer, KeyboardState, MouseSequencer, MouseState, Watchdog,
};
pub use transceiver::{CommandStatus, FrameSink, Ps2Port};

/// Device response codes shared by both PS/2 ports.
pub mod codes {
    /// Command acknowledged.
    pub const ACK: u8 = 0xFA;
    /// Device requests the last command byte again.
    pub const RESEND: u8 = 0xFE;
    /// Basic Assurance Test passed.
    pub const BAT_OK: u8 = 0xAA;
    /// Basic Assurance Test failed.
    pub const BAT_FAIL: u8 = 0xFC;
}

/// Host-to-device command bytes used by the sequencers.
pub mod commands {
    pub const RESET: u8 = 0xFF;
    pub const ENABLE_REPORTING: u8 = 0xF4;
    pub const SET_SAMPLE_RATE: u8 = 0xF3;
    pub const READ_DEVICE_TYPE: u8 = 0xF2;
    pub const SET_LEDS: u8 = 0xED;
}
