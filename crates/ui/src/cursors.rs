//! Remote cursor layer

use crate::registry::{ElementSpec, OverlayError, OverlaySink, OwnedElementRegistry};
use pdf_annotator_core::{CursorMarker, ElementId, UserId};
use std::collections::BTreeMap;

/// One element per visible remote cursor, keyed by user
#[derive(Debug, Default)]
pub struct CursorLayer {
    elements: BTreeMap<UserId, ElementId>,
}

impl CursorLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(
        &mut self,
        markers: &[CursorMarker],
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<(), OverlayError> {
        let gone: Vec<UserId> = self
            .elements
            .keys()
            .filter(|user| !markers.iter().any(|marker| marker.user_id == **user))
            .copied()
            .collect();
        for user in gone {
            if let Some(element) = self.elements.remove(&user) {
                registry.remove(element, sink)?;
            }
        }

        for marker in markers {
            let spec = ElementSpec::Cursor {
                user_id: marker.user_id,
                position: marker.position,
                color: marker.color.to_string(),
                label: marker.username.clone(),
            };
            match self.elements.get(&marker.user_id) {
                Some(element) => {
                    registry.update(*element, spec, sink)?;
                }
                None => {
                    let element = registry.create(spec, sink);
                    self.elements.insert(marker.user_id, element);
                }
            }
        }
        Ok(())
    }

    pub fn clear(
        &mut self,
        registry: &mut OwnedElementRegistry,
        sink: &mut dyn OverlaySink,
    ) -> Result<(), OverlayError> {
        for (_, element) in std::mem::take(&mut self.elements) {
            registry.remove(element, sink)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
