//! Coalesced animation-frame scheduling
//!
//! Any number of scroll, resize or state-change triggers between two frames
//! collapse into one pending frame. The frame reads the latest state when it
//! runs, so no intermediate trigger is lost.

/// Counters for frame requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Every call to `request`
    pub requested: u64,

    /// Requests that found a frame already pending
    pub coalesced: u64,

    /// Frames actually run
    pub frames: u64,
}

/// Gate allowing at most one pending frame
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::AnimationFrameGate;
///
/// let mut gate = AnimationFrameGate::new();
/// assert!(gate.request());
/// assert!(!gate.request());
/// assert!(gate.take());
/// assert!(!gate.take());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnimationFrameGate {
    pending: bool,
    stats: FrameStats,
}

impl AnimationFrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a frame; returns true when this call scheduled it
    pub fn request(&mut self) -> bool {
        self.stats.requested += 1;
        if self.pending {
            self.stats.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Consume the pending frame; returns false when none was pending
    pub fn take(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.stats.frames += 1;
        true
    }

    /// Drop the pending frame without running it
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_coalesce() {
        let mut gate = AnimationFrameGate::new();
        assert!(gate.request());
        for _ in 0..9 {
            assert!(!gate.request());
        }
        assert!(gate.take());

        let stats = gate.stats();
        assert_eq!(stats.requested, 10);
        assert_eq!(stats.coalesced, 9);
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn test_request_after_take() {
        let mut gate = AnimationFrameGate::new();
        gate.request();
        gate.take();
        assert!(!gate.is_pending());
        assert!(gate.request());
    }

    #[test]
    fn test_cancel_drops_frame() {
        let mut gate = AnimationFrameGate::new();
        gate.request();
        gate.cancel();
        assert!(!gate.take());
        assert_eq!(gate.stats().frames, 0);
    }
}
