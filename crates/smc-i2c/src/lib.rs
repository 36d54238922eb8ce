//! Bit-banged (USI-style) I2C slave engine.
//!
//! The hardware this models is a synchronous shift register with two
//! interrupt sources: a start/stop detector and a counter overflow that
//! fires after a programmed number of bits has been shifted. The engine is
//! the software between those interrupts: [`I2cSlave::on_start_condition`]
//! and [`I2cSlave::on_counter_overflow`] are the ISR bodies, and every
//! return value is a [`ShiftControl`] directive the ISR would write back to
//! the shift hardware (SDA direction, preload value, bit vs. byte count).
//!
//! One slave serves three 7-bit addresses: the general register-mapped
//! address (read/write) and two read-only fast-path addresses that bypass
//! the register file and stream one queue entry per transaction.

#![forbid(unsafe_code)]

mod slave;

pub use slave::{BusState, Direction, I2cSlave, ShiftControl, SlaveHandlers, TxBuffer, BUF_SIZE};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Address `0x00` is the I2C general call, which this slave ignores.
    #[error("slave address 0x00 is the general call and cannot be claimed")]
    GeneralCall,
    #[error("address {0:#04x} does not fit in 7 bits")]
    OutOfRange(u8),
    #[error("duplicate slave address {0:#04x}")]
    Duplicate(u8),
}

/// The three 7-bit addresses one slave instance answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addresses {
    pub general: u8,
    pub keyboard: u8,
    pub mouse: u8,
}

impl Addresses {
    pub fn new(general: u8, keyboard: u8, mouse: u8) -> Result<Self, ConfigError> {
        let all = [general, keyboard, mouse];
        for (i, &addr) in all.iter().enumerate() {
            if addr == 0 {
                return Err(ConfigError::GeneralCall);
            }
            if addr >= 0x80 {
                return Err(ConfigError::OutOfRange(addr));
            }
            if all[..i].contains(&addr) {
                return Err(ConfigError::Duplicate(addr));
            }
        }
        Ok(Self {
            general,
            keyboard,
            mouse,
        })
    }
}
