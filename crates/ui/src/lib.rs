//! Annotation overlay UI
//!
//! Connects the positioning engine to a rendering host: observer lifecycle,
//! frame scheduling, and keyed reconciliation of the overlay elements the
//! engine owns (connector lines, highlight rectangles, remote cursors).

pub mod connectors;
pub mod cursors;
pub mod highlights;
pub mod host;
pub mod pipeline;
pub mod registry;
pub mod session;

pub use connectors::{ConnectorLayer, ReconcileStats};
pub use cursors::CursorLayer;
pub use highlights::{HighlightLayer, HighlightSpec};
pub use host::{ContainerId, ObserverHandle, ObserverKind, ViewerEvent, ViewerHost};
pub use pipeline::{CommentPosition, FrameInput, FrameOutput, FramePipeline};
pub use registry::{
    ElementKind, ElementSpec, OverlayError, OverlayPatch, OverlaySink, OwnedElementRegistry,
    RecordingSink, OWNED_MARKER,
};
pub use session::ViewerSession;
