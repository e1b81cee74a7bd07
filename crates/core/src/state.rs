//! Per-comment interaction state
//!
//! State is created lazily when a comment is first touched and lives until the
//! comment is deleted or its cluster unmounts. Element references are registry
//! ids, not handles, and are replaced on every highlight reconciliation.

use crate::comment::CommentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Id of an element in the owned-element registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentState {
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_highlight_hovered: bool,
    #[serde(default)]
    pub is_badge_hovered: bool,
    #[serde(default)]
    pub is_comment_hovered: bool,
    #[serde(default)]
    pub is_editing: bool,
    #[serde(default)]
    pub is_replying: bool,
    #[serde(skip)]
    pub highlight_elements: Vec<ElementId>,
}

impl CommentState {
    pub fn is_hovered(&self) -> bool {
        self.is_highlight_hovered || self.is_badge_hovered || self.is_comment_hovered
    }

    /// Whether the comment keeps its cluster open
    pub fn keeps_expanded(&self) -> bool {
        self.is_pinned
            || self.is_editing
            || self.is_replying
            || self.is_badge_hovered
            || self.is_comment_hovered
    }
}

/// Aggregated state of a cluster's members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterVisual {
    pub expanded: bool,
    pub hovered: bool,
    pub pinned: bool,
}

impl ClusterVisual {
    /// Connector lines are drawn only for clusters in one of these states
    pub fn shows_connectors(&self) -> bool {
        self.expanded || self.hovered || self.pinned
    }
}

/// Which hover target changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverTarget {
    Highlight,
    Badge,
    Comment,
}

/// Comment id to state map
#[derive(Debug, Clone, Default)]
pub struct CommentStateStore {
    states: HashMap<CommentId, CommentState>,
}

impl CommentStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing map (CLI scenes, tests)
    pub fn from_states(states: impl IntoIterator<Item = (CommentId, CommentState)>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    pub fn get(&self, id: CommentId) -> Option<&CommentState> {
        self.states.get(&id)
    }

    /// State for a comment, created on first access
    pub fn entry(&mut self, id: CommentId) -> &mut CommentState {
        self.states.entry(id).or_default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn set_hovered(&mut self, id: CommentId, target: HoverTarget, hovered: bool) {
        let state = self.entry(id);
        match target {
            HoverTarget::Highlight => state.is_highlight_hovered = hovered,
            HoverTarget::Badge => state.is_badge_hovered = hovered,
            HoverTarget::Comment => state.is_comment_hovered = hovered,
        }
    }

    pub fn set_editing(&mut self, id: CommentId, editing: bool) {
        self.entry(id).is_editing = editing;
    }

    pub fn set_replying(&mut self, id: CommentId, replying: bool) {
        self.entry(id).is_replying = replying;
    }

    /// Pin a comment, unpinning every other comment in the document
    ///
    /// Returns the ids that were unpinned.
    pub fn pin(&mut self, id: CommentId) -> Vec<CommentId> {
        let mut unpinned = Vec::new();
        for (other, state) in self.states.iter_mut() {
            if *other != id && state.is_pinned {
                state.is_pinned = false;
                unpinned.push(*other);
            }
        }
        unpinned.sort_unstable();
        self.entry(id).is_pinned = true;
        unpinned
    }

    pub fn unpin(&mut self, id: CommentId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.is_pinned = false;
        }
    }

    /// Flip the pin; returns the new pinned flag
    pub fn toggle_pin(&mut self, id: CommentId) -> bool {
        if self.get(id).is_some_and(|state| state.is_pinned) {
            self.unpin(id);
            false
        } else {
            self.pin(id);
            true
        }
    }

    pub fn is_pinned(&self, id: CommentId) -> bool {
        self.get(id).is_some_and(|state| state.is_pinned)
    }

    pub fn remove(&mut self, id: CommentId) -> Option<CommentState> {
        self.states.remove(&id)
    }

    /// Drop the state of comments whose cluster went away
    pub fn reset_many(&mut self, ids: &[CommentId]) {
        for id in ids {
            self.states.remove(id);
        }
    }

    /// Drop state of comments not in `live`
    pub fn retain_live(&mut self, live: &[CommentId]) {
        self.states.retain(|id, _| live.contains(id));
    }

    pub fn set_highlight_elements(&mut self, id: CommentId, elements: Vec<ElementId>) {
        self.entry(id).highlight_elements = elements;
    }

    pub fn pinned_ids(&self) -> Vec<CommentId> {
        let mut ids: Vec<CommentId> = self
            .states
            .iter()
            .filter(|(_, state)| state.is_pinned)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Leave at most one pinned comment per cluster
    ///
    /// Each entry of `clusters` lists the member ids in cluster order. The survivor is
    /// the pinned comment whose highlight is hovered, else whose badge is hovered,
    /// else the first pinned one. Returns the ids that were unpinned.
    pub fn resolve_pin_conflicts(&mut self, clusters: &[Vec<CommentId>]) -> Vec<CommentId> {
        let mut unpinned = Vec::new();

        for members in clusters {
            let pinned: Vec<CommentId> =
                members.iter().copied().filter(|id| self.is_pinned(*id)).collect();
            if pinned.len() <= 1 {
                continue;
            }

            let state_of = |id: &CommentId| self.states.get(id);
            let keep = pinned
                .iter()
                .find(|id| state_of(id).is_some_and(|s| s.is_highlight_hovered))
                .or_else(|| pinned.iter().find(|id| state_of(id).is_some_and(|s| s.is_badge_hovered)))
                .copied()
                .unwrap_or(pinned[0]);

            for id in pinned.into_iter().filter(|id| *id != keep) {
                self.unpin(id);
                unpinned.push(id);
            }
        }

        if !unpinned.is_empty() {
            tracing::debug!(?unpinned, "resolved pin conflicts");
        }
        unpinned
    }

    pub fn cluster_visual(&self, members: &[CommentId]) -> ClusterVisual {
        members
            .iter()
            .filter_map(|id| self.states.get(id))
            .fold(ClusterVisual::default(), |visual, state| ClusterVisual {
                expanded: visual.expanded || state.keeps_expanded(),
                hovered: visual.hovered || state.is_hovered(),
                pinned: visual.pinned || state.is_pinned,
            })
    }
}
