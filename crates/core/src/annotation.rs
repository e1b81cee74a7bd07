//! Highlight annotation data model
//!
//! An annotation is the highlighted text span a comment is attached to.
//! Boxes are normalized when the selection is committed and never re-normalized;
//! only the color can change afterwards.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// Highlight color used when the user has not picked one
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffeb3b80";

/// Highlighted text span with its normalized boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Page of the first box (redundant for single-page annotations)
    pub page_number: u32,

    /// Selected text
    pub text: String,

    /// Normalized boxes, at least one for a drawable annotation
    pub bounding_boxes: Vec<BoundingBox>,

    /// CSS color
    pub color: String,

    /// Creation time (Unix milliseconds)
    pub timestamp: i64,
}

impl Annotation {
    /// Create a new annotation
    ///
    /// The page number is taken from the first box; an annotation without boxes
    /// is placed on page 1 and will never be drawn.
    pub fn new(
        text: impl Into<String>,
        bounding_boxes: Vec<BoundingBox>,
        color: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        let page_number = bounding_boxes.first().map(|b| b.page_number).unwrap_or(1);
        Self {
            page_number,
            text: text.into(),
            bounding_boxes,
            color: color.into(),
            timestamp,
        }
    }

    /// Change the highlight color (the only mutable part of an annotation)
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn first_box(&self) -> Option<&BoundingBox> {
        self.bounding_boxes.first()
    }

    /// The box closest to the top of the document (lowest page, then lowest y)
    pub fn topmost_box(&self) -> Option<&BoundingBox> {
        self.bounding_boxes
            .iter()
            .min_by(|a, b| a.page_number.cmp(&b.page_number).then(a.y.total_cmp(&b.y)))
    }

    /// Distinct page numbers covered by this annotation, ascending
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.bounding_boxes.iter().map(|b| b.page_number).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn spans_pages(&self) -> bool {
        self.pages().len() > 1
    }
}
