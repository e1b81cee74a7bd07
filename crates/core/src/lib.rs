//! PDF Annotator Core Library
//!
//! Data model and pure positioning stages for PDF highlight annotations and
//! their comments: selection to normalized boxes, box to pixel mapping,
//! comment clustering, sidebar layout, connector geometry and presence.

pub mod annotation;
pub mod cluster;
pub mod comment;
pub mod config;
pub mod connector;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod mapping;
pub mod presence;
pub mod selection;
pub mod state;

pub use annotation::{Annotation, DEFAULT_HIGHLIGHT_COLOR};
pub use cluster::{
    cluster_comments, comment_anchor_y, Cluster, ClusterSummary, PositionedComment,
    CLUSTER_THRESHOLD_PX,
};
pub use comment::{
    Comment, CommentId, CommentPage, CommentPatch, CommentStore, CommentUser,
    InMemoryCommentStore, NewComment, PageCursor, UserId, Visibility,
};
pub use config::EngineConfig;
pub use connector::{
    build_connector_path, ConnectorPath, ConnectorSpec, ConnectorStyle, LineVisual, PathCommand,
};
pub use error::{ConfigError, StoreError};
pub use geometry::{
    merge_highlight_boxes, merge_normalized_boxes, BoundingBox, MergeOptions, Point, Rect,
};
pub use layout::{layout_clusters, ClusterHeights, LayoutItem, PlacedCluster};
pub use mapping::{
    highlight_anchor, map_annotation, map_box, HighlightAnchor, MappingInputs, PageFrame,
    PageFrames, PageGeometry, ViewerFrame,
};
pub use presence::{
    presence_color, ActiveUser, CursorBroadcaster, CursorMarker, CursorMessage, CursorUpdate,
    PresenceChannel, PresenceOverlay, UserCursor, ViewMode,
};
pub use selection::{
    calculate_bounding_boxes, draft_annotation, SelectionOptions, SelectionRange,
    TextLayerLocator,
};
pub use state::{ClusterVisual, CommentState, CommentStateStore, ElementId, HoverTarget};
