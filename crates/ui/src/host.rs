//! Rendering host abstraction
//!
//! The host owns the scroll container, the rendered pages and the overlay
//! surface. The session attaches observers through it and receives their
//! notifications back as [`ViewerEvent`]s.

use crate::registry::OverlaySink;
use pdf_annotator_core::{CommentId, PageGeometry, TextLayerLocator, ViewerFrame};
use std::fmt;

/// Identity of a scroll container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    /// Canvas elements added to the container subtree
    Mutation,
    /// Container size changes
    Resize,
    Scroll,
    WindowResize,
}

impl ObserverKind {
    pub const ALL: [ObserverKind; 4] = [
        ObserverKind::Mutation,
        ObserverKind::Resize,
        ObserverKind::Scroll,
        ObserverKind::WindowResize,
    ];
}

/// Handle of an attached observer, returned to the host on teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle {
    pub id: u64,
    pub kind: ObserverKind,
    pub container: ContainerId,
}

impl fmt::Display for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

/// Services the host provides to a viewer session
pub trait ViewerHost: PageGeometry + TextLayerLocator + OverlaySink {
    fn attach(&mut self, container: ContainerId, kind: ObserverKind) -> ObserverHandle;

    fn detach(&mut self, handle: ObserverHandle);

    /// Current scroll container state
    fn viewer_frame(&self) -> ViewerFrame;
}

/// Notifications delivered to the session
///
/// Geometry is not carried in the events; the session reads the latest
/// viewer frame from the host when the next animation frame runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Scrolled,
    Zoomed,
    ContainerResized,
    WindowResized,
    /// A canvas was added somewhere under the container
    CanvasAdded,
    /// The host reports a page finished rendering
    PageReady { page_number: u32 },
    /// A rendered cluster changed height
    ClusterResized { key: CommentId, height: f64 },
}
