//! Fixed-period timer

use crate::cancel::CancellationToken;

/// Repeating timer driven by explicit time
///
/// Missed periods collapse into a single fire.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period_ms: u64,
    next_due: Option<u64>,
    token: CancellationToken,
}

impl IntervalTimer {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due: None,
            token: CancellationToken::new(),
        }
    }

    pub fn start(&mut self, now: u64, token: CancellationToken) {
        self.token = token;
        self.next_due = Some(now.saturating_add(self.period_ms));
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some() && !self.token.is_cancelled()
    }

    pub fn poll(&mut self, now: u64) -> bool {
        if self.token.is_cancelled() {
            self.next_due = None;
            return false;
        }
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let missed = (now - due) / self.period_ms;
        self.next_due = Some(due + (missed + 1) * self.period_ms);
        true
    }
}
