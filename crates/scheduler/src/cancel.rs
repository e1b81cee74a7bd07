//! Cancellation tokens and teardown tracking
//!
//! A session hands a token to every timer it starts and registers every
//! observer it attaches. Unmounting cancels the token and drains the registry,
//! so nothing scheduled under a previous mount can fire afterwards.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative cancellation
///
/// Timers check `is_cancelled()` before firing. Clones share the same state.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let timer_token = token.clone();
///
/// token.cancel();
/// assert!(timer_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token and all of its clones
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles to release on teardown
///
/// Handles are released in reverse registration order. Draining cancels the
/// current token and starts a fresh one for the next mount.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::TeardownRegistry;
///
/// let mut registry = TeardownRegistry::new();
/// let token = registry.token();
/// registry.register("mutation");
/// registry.register("resize");
///
/// assert_eq!(registry.drain(), vec!["resize", "mutation"]);
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug)]
pub struct TeardownRegistry<H> {
    handles: Vec<H>,
    token: CancellationToken,
}

impl<H> TeardownRegistry<H> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    /// Token that is cancelled on the next drain
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn register(&mut self, handle: H) {
        self.handles.push(handle);
    }

    /// Cancel the token and hand back every handle, newest first
    pub fn drain(&mut self) -> Vec<H> {
        self.token.cancel();
        self.token = CancellationToken::new();

        let mut handles = std::mem::take(&mut self.handles);
        handles.reverse();
        if !handles.is_empty() {
            tracing::debug!(count = handles.len(), "tearing down handles");
        }
        handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H> Default for TeardownRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
