//! PDF Annotator Scheduler Library
//!
//! Event-loop primitives for the annotation engine. Everything is driven by
//! explicit millisecond timestamps supplied by the host, so behavior is the
//! same in a browser frame loop, a native event loop and in tests.
//!
//! # Example
//!
//! ```
//! use pdf_annotator_scheduler::{AnimationFrameGate, Debouncer, TeardownRegistry};
//!
//! let mut teardown: TeardownRegistry<&str> = TeardownRegistry::new();
//! let mut debouncer = Debouncer::new(32);
//! debouncer.bind(teardown.token());
//!
//! // A burst of canvas mutations
//! debouncer.trigger(0);
//! debouncer.trigger(10);
//!
//! let mut frames = AnimationFrameGate::new();
//! if debouncer.poll(42) {
//!     frames.request();
//! }
//! assert!(frames.take());
//!
//! // Unmount: nothing scheduled under the old token fires
//! debouncer.trigger(50);
//! teardown.drain();
//! assert!(!debouncer.poll(100));
//! ```

mod cancel;
mod debounce;
mod frame;
mod interval;
mod readiness;

pub use cancel::{CancellationToken, TeardownRegistry};
pub use debounce::Debouncer;
pub use frame::{AnimationFrameGate, FrameStats};
pub use interval::IntervalTimer;
pub use readiness::{PollOutcome, ReadinessPoller};
