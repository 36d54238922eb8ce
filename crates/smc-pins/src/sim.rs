//! Simulated open-drain bus lines.
//!
//! A [`Line`] is one wire with a pull-up; any number of [`SimPin`] handles
//! attach to it. The wire reads low iff at least one attached pin is pulling
//! it low, which is exactly the PS/2 and I2C electrical model. Tests attach
//! one pin for the SMC side and one for the simulated peripheral/master.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{Level, PinMode, PinOps};

#[derive(Debug, Default)]
struct LineState {
    /// One entry per attached pin: true while that pin pulls the wire low.
    pulling_low: Vec<bool>,
}

/// A shared open-drain wire.
#[derive(Debug, Clone, Default)]
pub struct Line {
    state: Rc<RefCell<LineState>>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new pin to this wire, initially released.
    pub fn pin(&self) -> SimPin {
        let mut state = self.state.borrow_mut();
        state.pulling_low.push(false);
        SimPin {
            line: self.state.clone(),
            slot: state.pulling_low.len() - 1,
            mode: PinMode::InputPullup,
            latch: Level::High,
        }
    }

    /// Resolved wire level: low wins over the pull-up.
    pub fn level(&self) -> Level {
        if self.state.borrow().pulling_low.iter().any(|&low| low) {
            Level::Low
        } else {
            Level::High
        }
    }

    pub fn is_low(&self) -> bool {
        self.level() == Level::Low
    }
}

/// One attachment point on a [`Line`].
#[derive(Debug)]
pub struct SimPin {
    line: Rc<RefCell<LineState>>,
    slot: usize,
    mode: PinMode,
    latch: Level,
}

impl SimPin {
    fn update_line(&mut self) {
        let pulls = self.mode == PinMode::Output && self.latch == Level::Low;
        self.line.borrow_mut().pulling_low[self.slot] = pulls;
    }
}

impl PinOps for SimPin {
    fn set_mode(&mut self, mode: PinMode) {
        self.mode = mode;
        self.update_line();
    }

    fn write(&mut self, level: Level) {
        self.latch = level;
        self.update_line();
    }

    fn read(&self) -> Level {
        if self.line.borrow().pulling_low.iter().any(|&low| low) {
            Level::Low
        } else {
            Level::High
        }
    }
}
