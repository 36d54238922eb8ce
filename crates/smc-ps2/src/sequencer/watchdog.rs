/// Countdown guarding a response wait, with a designated expiry state.
///
/// Armed with a tick budget and the state to force when it runs out;
/// re-arming replaces both. Disarmed watchdogs never fire.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog<S> {
    remaining: u16,
    expiry: Option<S>,
}

impl<S: Copy> Watchdog<S> {
    pub fn new() -> Self {
        Self {
            remaining: 0,
            expiry: None,
        }
    }

    pub fn arm(&mut self, ticks: u16, expiry: S) {
        self.remaining = ticks;
        self.expiry = Some(expiry);
    }

    pub fn disarm(&mut self) {
        self.expiry = None;
    }

    pub fn armed(&self) -> bool {
        self.expiry.is_some()
    }

    /// Counts down one tick; returns the expiry state when the budget is
    /// exhausted (and disarms).
    pub fn tick(&mut self) -> Option<S> {
        let expiry = self.expiry?;
        if self.remaining > 0 {
            self.remaining -= 1;
            return None;
        }
        self.expiry = None;
        Some(expiry)
    }
}

impl<S: Copy> Default for Watchdog<S> {
    fn default() -> Self {
        Self::new()
    }
}
