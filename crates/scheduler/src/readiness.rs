//! Bounded readiness polling
//!
//! Used when a host never signals that its pages have rendered: check,
//! wait, check again, and give up after a fixed number of attempts.

use crate::cancel::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not started, finished or cancelled
    Idle,
    /// Next attempt is in the future
    NotDue,
    Ready,
    /// Checked and not ready; another attempt is scheduled
    Retry,
    /// Last attempt failed
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    max_attempts: u32,
    delay_ms: u64,
    attempts: u32,
    next_due: Option<u64>,
    token: CancellationToken,
}

impl ReadinessPoller {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            attempts: 0,
            next_due: None,
            token: CancellationToken::new(),
        }
    }

    /// Start polling; the first check is due immediately
    pub fn start(&mut self, now: u64, token: CancellationToken) {
        self.token = token;
        self.attempts = 0;
        self.next_due = Some(now);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some() && !self.token.is_cancelled()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run a check if one is due
    pub fn poll(&mut self, now: u64, check: impl FnOnce() -> bool) -> PollOutcome {
        if self.token.is_cancelled() {
            self.next_due = None;
            return PollOutcome::Idle;
        }
        let Some(due) = self.next_due else {
            return PollOutcome::Idle;
        };
        if now < due {
            return PollOutcome::NotDue;
        }

        self.attempts += 1;
        if check() {
            self.next_due = None;
            tracing::debug!(attempts = self.attempts, "pages ready");
            return PollOutcome::Ready;
        }

        if self.attempts >= self.max_attempts {
            self.next_due = None;
            tracing::warn!(attempts = self.attempts, "pages not ready, giving up");
            return PollOutcome::Exhausted;
        }

        self.next_due = Some(now.saturating_add(self.delay_ms));
        PollOutcome::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_on_first_check() {
        let mut poller = ReadinessPoller::new(10, 100);
        poller.start(0, CancellationToken::new());
        assert_eq!(poller.poll(0, || true), PollOutcome::Ready);
        assert!(!poller.is_active());
    }

    #[test]
    fn test_retries_then_ready() {
        let mut poller = ReadinessPoller::new(10, 100);
        poller.start(0, CancellationToken::new());
        assert_eq!(poller.poll(0, || false), PollOutcome::Retry);
        assert_eq!(poller.poll(50, || true), PollOutcome::NotDue);
        assert_eq!(poller.poll(100, || true), PollOutcome::Ready);
        assert_eq!(poller.attempts(), 2);
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut poller = ReadinessPoller::new(3, 100);
        poller.start(0, CancellationToken::new());
        assert_eq!(poller.poll(0, || false), PollOutcome::Retry);
        assert_eq!(poller.poll(100, || false), PollOutcome::Retry);
        assert_eq!(poller.poll(200, || false), PollOutcome::Exhausted);
        assert_eq!(poller.poll(300, || true), PollOutcome::Idle);
    }

    #[test]
    fn test_cancelled_poller_is_idle() {
        let token = CancellationToken::new();
        let mut poller = ReadinessPoller::new(10, 100);
        poller.start(0, token.clone());
        token.cancel();

        let mut checked = false;
        assert_eq!(
            poller.poll(0, || {
                checked = true;
                true
            }),
            PollOutcome::Idle
        );
        assert!(!checked);
    }
}
