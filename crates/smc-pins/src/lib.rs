//! GPIO pin capability consumed by the protocol engines.
//!
//! The SMC never drives a pin high directly: both PS/2 and I2C are
//! open-collector buses, so a "1" is always expressed by releasing the line
//! to its pull-up. The two composite operations [`PinOps::drive_low`] and
//! [`PinOps::release`] capture the only transitions the engines are allowed
//! to make, and implementations must sequence them so the pin never passes
//! through a driven-high state.
//!
//! On real hardware each pin is touched from exactly one execution context
//! at a time (one ISR, or the main loop); implementations backed by shared
//! port registers must make the read-modify-write atomic with respect to the
//! other contexts that share the register.

#![forbid(unsafe_code)]

pub mod sim;

/// Electrical level seen on (or requested for) a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

/// Pin direction / pull configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// High-impedance input.
    Input,
    /// Input with the internal pull-up enabled.
    InputPullup,
    /// Push-pull output; the driven level comes from [`PinOps::write`].
    Output,
}

/// Single-pin control capability.
pub trait PinOps {
    fn set_mode(&mut self, mode: PinMode);

    /// Sets the output latch. Only observable on the wire while the pin is
    /// in [`PinMode::Output`].
    fn write(&mut self, level: Level);

    fn read(&self) -> Level;

    /// Drives the line low: latch low first, then switch to output, so the
    /// pin never drives high on the way.
    fn drive_low(&mut self) {
        self.write(Level::Low);
        self.set_mode(PinMode::Output);
    }

    /// Releases the line to the bus pull-up.
    fn release(&mut self) {
        self.set_mode(PinMode::InputPullup);
    }
}
