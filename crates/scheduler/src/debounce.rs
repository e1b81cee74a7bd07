//! Trailing-edge debouncing
//!
//! Each trigger pushes the deadline out to `now + delay`. The debouncer fires
//! once the deadline passes without a new trigger. A debouncer bound to a
//! cancelled token never fires.

use crate::cancel::CancellationToken;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    deadline: Option<u64>,
    token: CancellationToken,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Tie this debouncer to a session token
    pub fn bind(&mut self, token: CancellationToken) {
        self.token = token;
        self.deadline = None;
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn trigger(&mut self, now: u64) {
        if self.token.is_cancelled() {
            return;
        }
        self.deadline = Some(now.saturating_add(self.delay_ms));
    }

    /// Returns true exactly once per settled burst of triggers
    pub fn poll(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if self.token.is_cancelled() {
                    tracing::trace!("debounce dropped after cancellation");
                    return false;
                }
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}
