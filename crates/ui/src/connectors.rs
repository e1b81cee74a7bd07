//! Connector line layer
//!
//! Lines are keyed by comment id. Reconciliation adds, updates and removes
//! only what changed, so a line that stays on screen keeps its element.

use crate::registry::{ElementSpec, OverlayError, OverlaySink, OwnedElementRegistry};
use pdf_annotator_core::{CommentId, ConnectorPath, ConnectorSpec, ElementId};
use std::collections::BTreeMap;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub updated: usize,
    pub repositioned: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileStats {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.repositioned == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone)]
struct Line {
    element: ElementId,
    spec: ConnectorSpec,
}

#[derive(Debug, Default)]
pub struct ConnectorLayer {
    lines: BTreeMap<CommentId, Line>,
}

impl ConnectorLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the drawn lines in line with `desired`
    ///
    /// A line whose only change is its path gets a reposition patch; any style
    /// change gets a full update.
    pub fn reconcile(
        &mut self,
        desired: &[ConnectorSpec],
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<ReconcileStats, OverlayError> {
        let mut stats = ReconcileStats::default();

        let stale: Vec<CommentId> = self
            .lines
            .keys()
            .filter(|id| !desired.iter().any(|spec| spec.comment_id == **id))
            .copied()
            .collect();
        for id in stale {
            if let Some(line) = self.lines.remove(&id) {
                registry.remove(line.element, sink)?;
                stats.removed += 1;
            }
        }

        for spec in desired {
            match self.lines.get_mut(&spec.comment_id) {
                Some(line) if line.spec == *spec => stats.unchanged += 1,
                Some(line) if same_style(&line.spec, spec) => {
                    reposition_line(line, &spec.path, registry, sink)?;
                    stats.repositioned += 1;
                }
                Some(line) => {
                    registry.update(line.element, ElementSpec::connector(spec), sink)?;
                    line.spec = spec.clone();
                    stats.updated += 1;
                }
                None => {
                    let element = registry.create(ElementSpec::connector(spec), sink);
                    self.lines.insert(
                        spec.comment_id,
                        Line {
                            element,
                            spec: spec.clone(),
                        },
                    );
                    stats.added += 1;
                }
            }
        }

        if !stats.is_noop() {
            tracing::trace!(?stats, "reconciled connectors");
        }
        Ok(stats)
    }

    /// Move existing lines; never adds or removes
    ///
    /// Paths for comments without a drawn line are ignored. Returns the number
    /// of lines that moved.
    pub fn reposition(
        &mut self,
        paths: &[(CommentId, ConnectorPath)],
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<usize, OverlayError> {
        let mut moved = 0;
        for (id, path) in paths {
            let Some(line) = self.lines.get_mut(id) else {
                continue;
            };
            if line.spec.path != *path {
                reposition_line(line, path, registry, sink)?;
                moved += 1;
            }
        }
        Ok(moved)
    }

    pub fn clear(
        &mut self,
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<usize, OverlayError> {
        let count = self.lines.len();
        for (_, line) in std::mem::take(&mut self.lines) {
            registry.remove(line.element, sink)?;
        }
        Ok(count)
    }

    pub fn element_for(&self, id: CommentId) -> Option<ElementId> {
        self.lines.get(&id).map(|line| line.element)
    }

    pub fn comment_ids(&self) -> Vec<CommentId> {
        self.lines.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn same_style(a: &ConnectorSpec, b: &ConnectorSpec) -> bool {
    a.color == b.color && a.hovered == b.hovered && a.visual == b.visual
}

fn reposition_line(
    line: &mut Line,
    path: &ConnectorPath,
    registry: &mut OwnedElementRegistry,
    sink: &mut dyn OverlaySink,
) -> Result<(), OverlayError> {
    registry.reposition(
        line.element,
        path.to_svg_path(),
        path.start().unwrap_or_default(),
        path.end().unwrap_or_default(),
        sink,
    )?;
    line.spec.path = path.clone();
    Ok(())
}
