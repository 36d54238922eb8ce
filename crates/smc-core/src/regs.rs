//! The host-visible I2C contract: slave addresses and register offsets.
//!
//! These values are read by host boot firmware and must stay stable across
//! releases.

pub use smc_ps2::sequencer::{KBD_STATE_OFF, KBD_STATE_READY};

/// General register-mapped slave address (read/write).
pub const ADDR_GENERAL: u8 = 0x42;
/// Keyboard fast path: one key code per read transaction.
pub const ADDR_KBD_FAST: u8 = 0x43;
/// Mouse fast path: one complete packet per read transaction.
pub const ADDR_MSE_FAST: u8 = 0x44;

/// Number of bytes waiting in the keyboard queue.
pub const REG_KBD_AVAIL: u8 = 0x08;
/// Keyboard init state ([`KBD_STATE_READY`] once usable).
pub const REG_KBD_STATE: u8 = 0x09;
/// Status indicator (LED) mask, read/write.
pub const REG_KBD_LEDS: u8 = 0x0A;

/// Number of complete mouse packets waiting.
pub const REG_MSE_AVAIL: u8 = 0x21;
/// Negotiated mouse device ID (0, 3 or 4; `0xFC` while unknown).
pub const REG_MSE_ID: u8 = 0x22;
/// Identity negotiation target, read/write; writing re-runs init.
pub const REG_MSE_REQ_ID: u8 = 0x23;

/// Debug echo: reads back the last byte written.
pub const REG_DBG_ECHO: u8 = 0x30;
pub const REG_FW_MAJOR: u8 = 0x31;
pub const REG_FW_MINOR: u8 = 0x32;

pub const FW_MAJOR: u8 = 0;
pub const FW_MINOR: u8 = 1;
