//! Owned overlay elements
//!
//! The engine draws into a host it shares with the PDF renderer. Every element
//! it creates is recorded here and marked with [`OWNED_MARKER`]; patches for
//! any other id are refused, so the engine never touches foreign elements.

use pdf_annotator_core::{CommentId, ConnectorSpec, ElementId, LineVisual, Point, Rect, UserId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute placed on every element the engine creates
pub const OWNED_MARKER: &str = "data-annotator-owned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Connector,
    Highlight,
    Cursor,
}

/// What an owned element draws
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSpec {
    Connector {
        comment_id: CommentId,
        d: String,
        start: Point,
        end: Point,
        color: String,
        visual: LineVisual,
    },
    Highlight {
        comment_id: CommentId,
        rect: Rect,
        color: String,
    },
    Cursor {
        user_id: UserId,
        position: Point,
        color: String,
        label: String,
    },
}

impl ElementSpec {
    pub fn connector(spec: &ConnectorSpec) -> Self {
        ElementSpec::Connector {
            comment_id: spec.comment_id,
            d: spec.path.to_svg_path(),
            start: spec.path.start().unwrap_or_default(),
            end: spec.path.end().unwrap_or_default(),
            color: spec.color.clone(),
            visual: spec.visual,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementSpec::Connector { .. } => ElementKind::Connector,
            ElementSpec::Highlight { .. } => ElementKind::Highlight,
            ElementSpec::Cursor { .. } => ElementKind::Cursor,
        }
    }
}

/// A change to apply to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OverlayPatch {
    Add {
        id: ElementId,
        marker: &'static str,
        spec: ElementSpec,
    },
    Update {
        id: ElementId,
        spec: ElementSpec,
    },
    /// Geometry-only update of a connector
    Reposition {
        id: ElementId,
        d: String,
        start: Point,
        end: Point,
    },
    Remove {
        id: ElementId,
    },
}

impl OverlayPatch {
    pub fn id(&self) -> ElementId {
        match self {
            OverlayPatch::Add { id, .. }
            | OverlayPatch::Update { id, .. }
            | OverlayPatch::Reposition { id, .. }
            | OverlayPatch::Remove { id } => *id,
        }
    }
}

/// Host side of the overlay
pub trait OverlaySink {
    fn apply(&mut self, patch: OverlayPatch);
}

/// Sink that keeps the patches and the resulting element set
///
/// Used by the CLI to report what a frame would draw, and by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub patches: Vec<OverlayPatch>,
    pub elements: BTreeMap<ElementId, ElementSpec>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_patches(&mut self) -> Vec<OverlayPatch> {
        std::mem::take(&mut self.patches)
    }
}

impl OverlaySink for RecordingSink {
    fn apply(&mut self, patch: OverlayPatch) {
        match &patch {
            OverlayPatch::Add { id, spec, .. } | OverlayPatch::Update { id, spec } => {
                self.elements.insert(*id, spec.clone());
            }
            OverlayPatch::Reposition { id, d, start, end } => {
                if let Some(ElementSpec::Connector {
                    d: old_d,
                    start: old_start,
                    end: old_end,
                    ..
                }) = self.elements.get_mut(id)
                {
                    *old_d = d.clone();
                    *old_start = *start;
                    *old_end = *end;
                }
            }
            OverlayPatch::Remove { id } => {
                self.elements.remove(id);
            }
        }
        self.patches.push(patch);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("element {0} is not owned by the annotator")]
    NotOwned(ElementId),
    #[error("element {id} is not a {expected:?} element")]
    WrongKind { id: ElementId, expected: ElementKind },
}

/// Registry of elements created by the engine
#[derive(Debug)]
pub struct OwnedElementRegistry {
    elements: BTreeMap<ElementId, ElementSpec>,
    next_id: u64,
}

impl Default for OwnedElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnedElementRegistry {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn create(&mut self, spec: ElementSpec, sink: &mut dyn OverlaySink) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, spec.clone());
        sink.apply(OverlayPatch::Add {
            id,
            marker: OWNED_MARKER,
            spec,
        });
        id
    }

    /// Replace an element's spec; returns false when nothing changed
    pub fn update(
        &mut self,
        id: ElementId,
        spec: ElementSpec,
        sink: &mut dyn OverlaySink,
    ) -> Result<bool, OverlayError> {
        let current = self.elements.get_mut(&id).ok_or(OverlayError::NotOwned(id))?;
        if *current == spec {
            return Ok(false);
        }
        *current = spec.clone();
        sink.apply(OverlayPatch::Update { id, spec });
        Ok(true)
    }

    /// Move a connector without touching its style
    pub fn reposition(
        &mut self,
        id: ElementId,
        new_d: String,
        new_start: Point,
        new_end: Point,
        sink: &mut dyn OverlaySink,
    ) -> Result<bool, OverlayError> {
        let current = self.elements.get_mut(&id).ok_or(OverlayError::NotOwned(id))?;
        let ElementSpec::Connector { d, start, end, .. } = current else {
            return Err(OverlayError::WrongKind {
                id,
                expected: ElementKind::Connector,
            });
        };
        if *d == new_d {
            return Ok(false);
        }
        *d = new_d.clone();
        *start = new_start;
        *end = new_end;
        sink.apply(OverlayPatch::Reposition {
            id,
            d: new_d,
            start: new_start,
            end: new_end,
        });
        Ok(true)
    }

    pub fn remove(
        &mut self,
        id: ElementId,
        sink: &mut dyn OverlaySink,
    ) -> Result<ElementSpec, OverlayError> {
        let spec = self.elements.remove(&id).ok_or(OverlayError::NotOwned(id))?;
        sink.apply(OverlayPatch::Remove { id });
        Ok(spec)
    }

    /// Remove every owned element; returns how many were removed
    pub fn clear(&mut self, sink: &mut dyn OverlaySink) -> usize {
        let ids: Vec<ElementId> = self.elements.keys().copied().collect();
        for id in &ids {
            sink.apply(OverlayPatch::Remove { id: *id });
        }
        self.elements.clear();
        ids.len()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementSpec> {
        self.elements.get(&id)
    }

    pub fn is_owned(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn count_of(&self, kind: ElementKind) -> usize {
        self.elements.values().filter(|spec| spec.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
