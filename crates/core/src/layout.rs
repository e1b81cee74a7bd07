//! Collision-free vertical layout of comment clusters
//!
//! One forward pass: every cluster sits at its ideal y unless that would overlap
//! the cluster above, in which case it is pushed down to just below it.

use crate::comment::CommentId;
use serde::Serialize;
use std::collections::HashMap;

pub const MIN_GAP_PX: f64 = 8.0;
pub const BADGE_HEIGHT_PX: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutItem {
    pub key: CommentId,
    pub ideal_y: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCluster {
    pub key: CommentId,
    pub ideal_y: f64,
    pub actual_y: f64,
    pub height: f64,
}

impl PlacedCluster {
    pub fn bottom(&self) -> f64 {
        self.actual_y + self.height
    }

    pub fn was_pushed(&self) -> bool {
        self.actual_y > self.ideal_y
    }
}

/// Place clusters top to bottom
///
/// Items are expected in ideal-y order. The first one is kept at or below zero.
pub fn layout_clusters(items: &[LayoutItem], gap: f64) -> Vec<PlacedCluster> {
    let mut placed: Vec<PlacedCluster> = Vec::with_capacity(items.len());

    for item in items {
        let floor = match placed.last() {
            Some(previous) => previous.bottom() + gap,
            None => 0.0,
        };
        placed.push(PlacedCluster {
            key: item.key,
            ideal_y: item.ideal_y,
            actual_y: item.ideal_y.max(floor),
            height: item.height,
        });
    }

    placed
}

/// Measured heights of rendered clusters
///
/// Collapsed clusters always report the badge height; a measured height only
/// applies while the cluster is expanded.
#[derive(Debug, Clone)]
pub struct ClusterHeights {
    measured: HashMap<CommentId, f64>,
    badge_height: f64,
}

impl Default for ClusterHeights {
    fn default() -> Self {
        Self::new(BADGE_HEIGHT_PX)
    }
}

impl ClusterHeights {
    pub fn new(badge_height: f64) -> Self {
        Self {
            measured: HashMap::new(),
            badge_height,
        }
    }

    /// Record a resize observation; returns true when the height changed
    pub fn record(&mut self, key: CommentId, height: f64) -> bool {
        if !height.is_finite() || height < 0.0 {
            return false;
        }
        match self.measured.insert(key, height) {
            Some(previous) => (previous - height).abs() > f64::EPSILON,
            None => true,
        }
    }

    pub fn forget(&mut self, key: CommentId) {
        self.measured.remove(&key);
    }

    pub fn height_for(&self, key: CommentId, expanded: bool) -> f64 {
        if expanded {
            self.measured.get(&key).copied().unwrap_or(self.badge_height)
        } else {
            self.badge_height
        }
    }

    /// Drop measurements of clusters that no longer exist
    pub fn retain(&mut self, live: &[CommentId]) {
        self.measured.retain(|key, _| live.contains(key));
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: i64, ideal_y: f64, height: f64) -> LayoutItem {
        LayoutItem {
            key: CommentId(key),
            ideal_y,
            height,
        }
    }

    #[test]
    fn test_non_overlapping_stay_put() {
        let placed = layout_clusters(&[item(1, 10.0, 32.0), item(2, 100.0, 32.0)], MIN_GAP_PX);
        assert_eq!(placed[0].actual_y, 10.0);
        assert_eq!(placed[1].actual_y, 100.0);
        assert!(!placed[1].was_pushed());
    }

    #[test]
    fn test_overlap_is_pushed_down() {
        let placed = layout_clusters(
            &[item(1, 10.0, 200.0), item(2, 50.0, 32.0), item(3, 60.0, 32.0)],
            MIN_GAP_PX,
        );
        assert_eq!(placed[1].actual_y, 218.0);
        assert_eq!(placed[2].actual_y, 258.0);
        assert!(placed[2].was_pushed());
    }

    #[test]
    fn test_negative_first_is_clamped() {
        let placed = layout_clusters(&[item(1, -40.0, 32.0)], MIN_GAP_PX);
        assert_eq!(placed[0].actual_y, 0.0);
    }

    #[test]
    fn test_monotonic_and_gap_respected() {
        let items: Vec<LayoutItem> = [0.0, 5.0, 7.0, 300.0, 301.0, 302.0, 900.0]
            .iter()
            .enumerate()
            .map(|(i, y)| item(i as i64, *y, 20.0 + (i as f64) * 7.0))
            .collect();
        let placed = layout_clusters(&items, MIN_GAP_PX);

        for pair in placed.windows(2) {
            assert!(pair[1].actual_y >= pair[0].bottom() + MIN_GAP_PX);
        }
        for (placed, item) in placed.iter().zip(&items) {
            assert!(placed.actual_y >= item.ideal_y);
        }
    }

    #[test]
    fn test_layout_is_idempotent() {
        let items = vec![item(1, 0.0, 50.0), item(2, 10.0, 50.0), item(3, 400.0, 50.0)];
        let first = layout_clusters(&items, MIN_GAP_PX);
        let second = layout_clusters(&items, MIN_GAP_PX);
        assert_eq!(first, second);

        // Feeding the placed positions back in as ideals changes nothing.
        let replay: Vec<LayoutItem> =
            first.iter().map(|p| item(p.key.0, p.actual_y, p.height)).collect();
        let third = layout_clusters(&replay, MIN_GAP_PX);
        let ys: Vec<f64> = third.iter().map(|p| p.actual_y).collect();
        assert_eq!(ys, first.iter().map(|p| p.actual_y).collect::<Vec<_>>());
    }

    #[test]
    fn test_heights_only_apply_when_expanded() {
        let mut heights = ClusterHeights::default();
        assert!(heights.record(CommentId(1), 180.0));
        assert!(!heights.record(CommentId(1), 180.0));
        assert_eq!(heights.height_for(CommentId(1), true), 180.0);
        assert_eq!(heights.height_for(CommentId(1), false), BADGE_HEIGHT_PX);
        assert_eq!(heights.height_for(CommentId(2), true), BADGE_HEIGHT_PX);

        heights.retain(&[CommentId(2)]);
        assert!(heights.is_empty());
    }
}
