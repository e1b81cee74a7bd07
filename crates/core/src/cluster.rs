//! Comment clustering
//!
//! Comments whose anchors are close together vertically are grouped and shown
//! as one badge. Clusters are rebuilt from scratch on every pass; identity across
//! rebuilds is the id of the first member.

use crate::comment::{Comment, CommentId};
use crate::geometry::Rect;
use serde::Serialize;

/// Default distance below the first member that still joins a cluster
pub const CLUSTER_THRESHOLD_PX: f64 = 60.0;

/// A top-level comment with its resolved anchor y (container content space)
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedComment {
    pub comment: Comment,
    pub y: f64,
}

impl PositionedComment {
    pub fn new(comment: Comment, y: f64) -> Self {
        Self { comment, y }
    }

    pub fn id(&self) -> CommentId {
        self.comment.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Members ordered by id
    pub comments: Vec<Comment>,

    /// Anchor y of the topmost member
    pub y_position: f64,
}

impl Cluster {
    /// Stable identity of the cluster: the smallest member id
    pub fn key(&self) -> CommentId {
        self.comments.first().map(|c| c.id).unwrap_or(CommentId(0))
    }

    pub fn comment_ids(&self) -> Vec<CommentId> {
        self.comments.iter().map(|c| c.id).collect()
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.comments.iter().any(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

/// Summary of a cluster for machine-readable output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub key: CommentId,
    pub comment_ids: Vec<CommentId>,
    pub y_position: f64,
}

impl From<&Cluster> for ClusterSummary {
    fn from(cluster: &Cluster) -> Self {
        Self {
            key: cluster.key(),
            comment_ids: cluster.comment_ids(),
            y_position: cluster.y_position,
        }
    }
}

/// Badge y for a highlight: centered on its first box
pub fn comment_anchor_y(first_box: &Rect, badge_height: f64) -> f64 {
    first_box.center().y - badge_height / 2.0
}

/// Group comments whose anchors lie within `threshold` of a cluster's first member
pub fn cluster_comments(mut positioned: Vec<PositionedComment>, threshold: f64) -> Vec<Cluster> {
    positioned.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.id().cmp(&b.id())));

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut current: Vec<Comment> = Vec::new();
    let mut first_y = 0.0;

    for item in positioned {
        if !current.is_empty() && item.y - first_y > threshold {
            clusters.push(finish_cluster(std::mem::take(&mut current), first_y));
        }
        if current.is_empty() {
            first_y = item.y;
        }
        current.push(item.comment);
    }
    if !current.is_empty() {
        clusters.push(finish_cluster(current, first_y));
    }

    tracing::trace!(clusters = clusters.len(), "clustered comments");
    clusters
}

fn finish_cluster(mut comments: Vec<Comment>, y_position: f64) -> Cluster {
    comments.sort_by_key(|c| c.id);
    Cluster {
        comments,
        y_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{CommentUser, Visibility};
    use chrono::{TimeZone, Utc};

    fn comment(id: i64) -> Comment {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Comment {
            id: CommentId(id),
            content: format!("comment {id}"),
            user: CommentUser::new(1, "ada"),
            annotation: None,
            parent_id: None,
            num_replies: 0,
            replies: None,
            visibility: Visibility::Public,
            created_at: at,
            updated_at: at,
        }
    }

    fn positioned(items: &[(i64, f64)]) -> Vec<PositionedComment> {
        items.iter().map(|(id, y)| PositionedComment::new(comment(*id), *y)).collect()
    }

    #[test]
    fn test_threshold_splits_clusters() {
        let clusters = cluster_comments(
            positioned(&[(1, 0.0), (2, 10.0), (3, 100.0), (4, 110.0)]),
            CLUSTER_THRESHOLD_PX,
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].comment_ids(), vec![CommentId(1), CommentId(2)]);
        assert_eq!(clusters[0].y_position, 0.0);
        assert_eq!(clusters[1].comment_ids(), vec![CommentId(3), CommentId(4)]);
        assert_eq!(clusters[1].y_position, 100.0);
    }

    #[test]
    fn test_distance_measured_from_first_member() {
        // 0, 50, 100: 100 is more than 60 below the first member even though it is
        // only 50 below the previous one.
        let clusters =
            cluster_comments(positioned(&[(1, 0.0), (2, 50.0), (3, 100.0)]), CLUSTER_THRESHOLD_PX);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].key(), CommentId(3));
    }

    #[test]
    fn test_exact_threshold_joins() {
        let clusters = cluster_comments(positioned(&[(1, 0.0), (2, 60.0)]), CLUSTER_THRESHOLD_PX);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_members_sorted_by_id() {
        let clusters = cluster_comments(positioned(&[(9, 5.0), (3, 20.0), (5, 0.0)]), 60.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(
            clusters[0].comment_ids(),
            vec![CommentId(3), CommentId(5), CommentId(9)]
        );
        assert_eq!(clusters[0].key(), CommentId(3));
        assert_eq!(clusters[0].y_position, 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_comments(Vec::new(), 60.0).is_empty());
    }

    #[test]
    fn test_anchor_centers_badge() {
        let first = Rect::new(10.0, 100.0, 50.0, 20.0);
        assert_eq!(comment_anchor_y(&first, 32.0), 94.0);
    }
}
