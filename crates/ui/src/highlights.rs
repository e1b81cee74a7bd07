//! Highlight rectangle layer
//!
//! Each comment owns one element per mapped box. The element ids are handed
//! back after every pass so per-comment state can point at them.

use crate::registry::{ElementSpec, OverlayError, OverlaySink, OwnedElementRegistry};
use pdf_annotator_core::{CommentId, ElementId, Rect};
use serde::Serialize;
use std::collections::BTreeMap;

/// Boxes to draw for one comment, in client pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSpec {
    pub comment_id: CommentId,
    pub rects: Vec<Rect>,
    pub color: String,
}

impl HighlightSpec {
    fn element(&self, rect: Rect) -> ElementSpec {
        ElementSpec::Highlight {
            comment_id: self.comment_id,
            rect,
            color: self.color.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HighlightLayer {
    elements: BTreeMap<CommentId, Vec<ElementId>>,
}

impl HighlightLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile drawn highlights with `desired`
    ///
    /// Returns the element ids per comment after the pass.
    pub fn reconcile(
        &mut self,
        desired: &[HighlightSpec],
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<BTreeMap<CommentId, Vec<ElementId>>, OverlayError> {
        let stale: Vec<CommentId> = self
            .elements
            .keys()
            .filter(|id| !desired.iter().any(|spec| spec.comment_id == **id))
            .copied()
            .collect();
        for id in stale {
            for element in self.elements.remove(&id).unwrap_or_default() {
                registry.remove(element, sink)?;
            }
        }

        for spec in desired {
            let existing = self.elements.remove(&spec.comment_id).unwrap_or_default();
            let mut kept = Vec::with_capacity(spec.rects.len());

            for (index, rect) in spec.rects.iter().enumerate() {
                match existing.get(index) {
                    Some(element) => {
                        registry.update(*element, spec.element(*rect), sink)?;
                        kept.push(*element);
                    }
                    None => kept.push(registry.create(spec.element(*rect), sink)),
                }
            }
            for extra in existing.iter().skip(spec.rects.len()) {
                registry.remove(*extra, sink)?;
            }

            self.elements.insert(spec.comment_id, kept);
        }

        Ok(self.elements.clone())
    }

    pub fn clear(
        &mut self,
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<usize, OverlayError> {
        let mut count = 0;
        for (_, elements) in std::mem::take(&mut self.elements) {
            for element in elements {
                registry.remove(element, sink)?;
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn elements_for(&self, id: CommentId) -> &[ElementId] {
        self.elements.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
