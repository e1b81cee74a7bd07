//! Ordered per-frame derivation
//!
//! One frame runs, in order: mapping, clustering, pin-conflict resolution,
//! layout, connector derivation. State of comments whose cluster disappeared
//! since the previous frame is reset right after clustering. Each stage reads the output of the stage
//! before it from the same frame, never a value cached from an earlier one.

use crate::highlights::HighlightSpec;
use pdf_annotator_core::{
    build_connector_path, cluster_comments, comment_anchor_y, highlight_anchor, layout_clusters,
    ClusterHeights, ClusterSummary, Comment, CommentId, CommentStateStore, ConnectorSpec,
    ConnectorStyle, EngineConfig, HighlightAnchor, LayoutItem, LineVisual, PageGeometry,
    PlacedCluster, Point, PositionedComment, ViewerFrame,
};
use serde::Serialize;
use std::collections::HashMap;

/// Everything a frame reads from the outside world
pub struct FrameInput<'a> {
    pub geometry: &'a dyn PageGeometry,
    pub viewer: &'a ViewerFrame,
    /// Top-level comments; replies are ignored
    pub comments: &'a [Comment],
    pub heights: &'a ClusterHeights,
    /// Clusters drawn by the previous frame
    pub previous_clusters: &'a [ClusterSummary],
}

/// Mapped anchor of one comment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPosition {
    pub comment_id: CommentId,
    pub page_number: u32,
    /// Badge y in container content space
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutput {
    pub positions: Vec<CommentPosition>,
    pub clusters: Vec<ClusterSummary>,
    pub layout: Vec<PlacedCluster>,
    pub connectors: Vec<ConnectorSpec>,
    pub highlights: Vec<HighlightSpec>,

    /// Comments whose first box could not be mapped this frame
    pub skipped: Vec<CommentId>,

    /// Comments unpinned by conflict resolution
    pub unpinned: Vec<CommentId>,

    /// Members of previous clusters that no longer exist; their state was reset
    pub reset: Vec<CommentId>,
}

#[derive(Debug, Clone)]
pub struct FramePipeline {
    config: EngineConfig,
    style: ConnectorStyle,
}

impl FramePipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            style: ConnectorStyle::Orthogonal,
        }
    }

    pub fn with_style(mut self, style: ConnectorStyle) -> Self {
        self.style = style;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, input: FrameInput<'_>, states: &mut CommentStateStore) -> FrameOutput {
        let mut output = FrameOutput::default();

        // Mapping
        let mut anchors: HashMap<CommentId, (HighlightAnchor, String)> = HashMap::new();
        let mut positioned = Vec::new();
        for comment in input.comments.iter().filter(|c| c.is_top_level()) {
            let Some(annotation) = comment.annotation.as_ref() else {
                continue;
            };
            let Some(anchor) = highlight_anchor(annotation, input.geometry) else {
                output.skipped.push(comment.id);
                continue;
            };

            let client_y = comment_anchor_y(&anchor.first_box, self.config.badge_height_px);
            let y = input.viewer.to_content(Point::new(anchor.first_box.x, client_y)).y;

            output.positions.push(CommentPosition {
                comment_id: comment.id,
                page_number: annotation.page_number,
                y,
            });
            output.highlights.push(HighlightSpec {
                comment_id: comment.id,
                rects: anchor.boxes.clone(),
                color: annotation.color.clone(),
            });
            positioned.push(PositionedComment::new(comment.clone(), y));
            anchors.insert(comment.id, (anchor, annotation.color.clone()));
        }
        if !output.skipped.is_empty() {
            tracing::debug!(skipped = output.skipped.len(), "comments without mapped geometry");
        }

        // Clustering
        let clusters = cluster_comments(positioned, self.config.cluster_threshold_px);
        let members: Vec<Vec<CommentId>> = clusters.iter().map(|c| c.comment_ids()).collect();

        // Cluster teardown
        output.reset = input
            .previous_clusters
            .iter()
            .filter(|previous| !clusters.iter().any(|cluster| cluster.key() == previous.key))
            .flat_map(|previous| previous.comment_ids.iter().copied())
            .collect();
        if !output.reset.is_empty() {
            tracing::debug!(reset = output.reset.len(), "clusters went away, state reset");
            states.reset_many(&output.reset);
        }

        // Pin conflicts
        output.unpinned = states.resolve_pin_conflicts(&members);

        // Layout
        let visuals: Vec<_> = members.iter().map(|ids| states.cluster_visual(ids)).collect();
        let items: Vec<LayoutItem> = clusters
            .iter()
            .zip(&visuals)
            .map(|(cluster, visual)| LayoutItem {
                key: cluster.key(),
                ideal_y: cluster.y_position,
                height: input.heights.height_for(cluster.key(), visual.expanded),
            })
            .collect();
        output.layout = layout_clusters(&items, self.config.min_gap_px);

        // Connectors
        let source_x = input.viewer.right_edge() + self.config.sidebar_gap_px;
        let channel_x = input.viewer.right_edge() + self.config.channel_offset_px;
        for ((ids, visual), placed) in members.iter().zip(&visuals).zip(&output.layout) {
            if !visual.shows_connectors() {
                continue;
            }
            let source_y = input.viewer.content_y_to_client(placed.actual_y)
                + self.config.badge_height_px / 2.0;

            for id in ids {
                let Some((anchor, color)) = anchors.get(id) else {
                    continue;
                };
                let target = match self.style {
                    ConnectorStyle::Orthogonal => anchor.left,
                    ConnectorStyle::Straight => anchor.centroid,
                };
                let hovered = states.get(*id).is_some_and(|state| state.is_hovered());
                output.connectors.push(ConnectorSpec {
                    comment_id: *id,
                    path: build_connector_path(
                        Point::new(source_x, source_y),
                        target,
                        channel_x,
                        self.config.corner_radius_px,
                        self.style,
                    ),
                    color: color.clone(),
                    hovered,
                    visual: LineVisual::for_state(hovered, &self.config),
                });
            }
        }

        output.clusters = clusters.iter().map(ClusterSummary::from).collect();
        tracing::trace!(
            positioned = output.positions.len(),
            clusters = output.clusters.len(),
            connectors = output.connectors.len(),
            "frame derived"
        );
        output
    }
}
