//! Text selection to normalized highlight boxes
//!
//! The host reports a selection as a list of client rects. Each rect is assigned
//! to the page whose text layer lies under it, normalized against that text layer
//! and clamped. Block-level selections sometimes produce a rect covering the whole
//! text layer; those are dropped, otherwise they show up as full-page highlights.

use crate::annotation::Annotation;
use crate::geometry::{merge_normalized_boxes, BoundingBox, MergeOptions, Point, Rect};
use serde::{Deserialize, Serialize};

/// Default ratio above which a rect is considered a full-page artifact
pub const FULL_PAGE_REJECT_RATIO: f64 = 0.95;

/// Maximum inset of the corner sample points, in pixels
const SAMPLE_INSET_PX: f64 = 2.0;

/// Hit testing against rendered text layers
pub trait TextLayerLocator {
    /// Page number of the topmost text layer under a client point
    fn text_layer_at(&self, point: Point) -> Option<u32>;

    /// Client rect of a page's text layer
    fn text_layer_rect(&self, page_number: u32) -> Option<Rect>;
}

/// Snapshot of the host's current text selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    /// Client rects of the selected range, one per line fragment
    pub client_rects: Vec<Rect>,

    /// True when start and end of the range coincide
    pub collapsed: bool,

    /// False when the selection anchor sits outside the document viewer
    pub anchor_in_viewer: bool,

    /// Selected text
    pub text: String,
}

impl SelectionRange {
    /// Create a non-collapsed selection anchored in the viewer
    pub fn new(text: impl Into<String>, client_rects: Vec<Rect>) -> Self {
        Self {
            client_rects,
            collapsed: false,
            anchor_in_viewer: true,
            text: text.into(),
        }
    }

    /// Whether this selection can become an annotation
    pub fn is_pending(&self) -> bool {
        !self.collapsed && self.anchor_in_viewer && !self.client_rects.is_empty()
    }
}

/// Options for turning a selection into an annotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionOptions {
    pub full_page_ratio: f64,
    pub merge: MergeOptions,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            full_page_ratio: FULL_PAGE_REJECT_RATIO,
            merge: MergeOptions::normalized(),
        }
    }
}

/// Interior points used to decide which page a rect belongs to
///
/// Order: center, then top-left, top-right and bottom-left corners pulled inwards.
/// A single center probe misses when sub-pixel gaps leave it between text spans.
pub fn sample_points(rect: &Rect) -> [Point; 4] {
    let inset_x = SAMPLE_INSET_PX.min(rect.width / 4.0);
    let inset_y = SAMPLE_INSET_PX.min(rect.height / 4.0);
    [
        rect.center(),
        Point::new(rect.x + inset_x, rect.y + inset_y),
        Point::new(rect.right() - inset_x, rect.y + inset_y),
        Point::new(rect.x + inset_x, rect.bottom() - inset_y),
    ]
}

fn resolve_page(rect: &Rect, locator: &dyn TextLayerLocator) -> Option<u32> {
    sample_points(rect).into_iter().find_map(|point| locator.text_layer_at(point))
}

/// Convert selection client rects into normalized, clamped boxes
///
/// Collapsed selections and selections anchored outside the viewer yield no boxes.
/// Rects that hit no text layer, or whose normalized width and height both exceed
/// `full_page_ratio`, are dropped.
pub fn calculate_bounding_boxes(
    selection: &SelectionRange,
    locator: &dyn TextLayerLocator,
    full_page_ratio: f64,
) -> Vec<BoundingBox> {
    if !selection.is_pending() {
        return Vec::new();
    }

    let mut boxes = Vec::with_capacity(selection.client_rects.len());
    for rect in selection.client_rects.iter().filter(|rect| !rect.is_empty()) {
        let Some(page_number) = resolve_page(rect, locator) else {
            tracing::trace!(?rect, "selection rect outside any text layer");
            continue;
        };
        let Some(layer) = locator.text_layer_rect(page_number) else {
            continue;
        };
        if layer.is_empty() {
            continue;
        }

        let width = rect.width / layer.width;
        let height = rect.height / layer.height;
        if width > full_page_ratio && height > full_page_ratio {
            tracing::debug!(page = page_number, "dropping full-page selection rect");
            continue;
        }

        boxes.push(BoundingBox::clamped(
            page_number,
            (rect.x - layer.x) / layer.width,
            (rect.y - layer.y) / layer.height,
            width,
            height,
        ));
    }

    boxes
}

/// Build an annotation from the current selection
///
/// Returns `None` when the selection is not pending or no box survives.
pub fn draft_annotation(
    selection: &SelectionRange,
    locator: &dyn TextLayerLocator,
    options: &SelectionOptions,
    color: &str,
    timestamp: i64,
) -> Option<Annotation> {
    let raw = calculate_bounding_boxes(selection, locator, options.full_page_ratio);
    let boxes = merge_normalized_boxes(&raw, &options.merge);
    if boxes.is_empty() {
        return None;
    }

    tracing::debug!(raw = raw.len(), merged = boxes.len(), "drafted annotation");
    Some(Annotation::new(selection.text.trim(), boxes, color, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::DEFAULT_HIGHLIGHT_COLOR;
    use crate::mapping::PageFrames;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // Two 500x1000 pages at x=0, y=0 and y=1010
    fn frames() -> PageFrames {
        PageFrames::stacked(2, 0.0, 0.0, 500.0, 1000.0, 10.0)
    }

    /// Locator whose text layers only register hits in a narrow band, like a page
    /// where glyph spans leave gaps between them.
    struct SparseLocator {
        frames: PageFrames,
        band: Rect,
    }

    impl TextLayerLocator for SparseLocator {
        fn text_layer_at(&self, point: Point) -> Option<u32> {
            if self.band.contains_point(&point) {
                self.frames.text_layer_at(point)
            } else {
                None
            }
        }

        fn text_layer_rect(&self, page_number: u32) -> Option<Rect> {
            self.frames.text_layer_rect(page_number)
        }
    }

    #[test]
    fn test_collapsed_selection_yields_nothing() {
        let mut selection = SelectionRange::new("x", vec![Rect::new(10.0, 10.0, 50.0, 12.0)]);
        selection.collapsed = true;
        assert!(calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO).is_empty());
    }

    #[test]
    fn test_selection_outside_viewer_yields_nothing() {
        let mut selection = SelectionRange::new("x", vec![Rect::new(10.0, 10.0, 50.0, 12.0)]);
        selection.anchor_in_viewer = false;
        assert!(calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO).is_empty());
    }

    #[test]
    fn test_rects_are_normalized_per_page() {
        let selection = SelectionRange::new(
            "split",
            vec![
                Rect::new(50.0, 990.0, 100.0, 10.0),
                Rect::new(50.0, 1010.0, 100.0, 10.0),
            ],
        );
        let boxes = calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO);

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].page_number, 1);
        assert!(approx(boxes[0].x, 0.1));
        assert!(approx(boxes[0].y, 0.99));
        assert_eq!(boxes[1].page_number, 2);
        assert!(approx(boxes[1].y, 0.0));
    }

    #[test]
    fn test_full_page_rect_is_rejected() {
        let selection = SelectionRange::new(
            "block",
            vec![Rect::new(0.0, 0.0, 490.0, 980.0), Rect::new(10.0, 10.0, 100.0, 12.0)],
        );
        let boxes = calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO);
        assert_eq!(boxes.len(), 1);
        assert!(approx(boxes[0].width, 0.2));
    }

    #[test]
    fn test_wide_but_short_rect_is_kept() {
        let selection = SelectionRange::new("line", vec![Rect::new(0.0, 0.0, 500.0, 12.0)]);
        let boxes = calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO);
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn test_corner_samples_catch_missed_center() {
        // Hits only register in the top 3px of the rect, so the center probe misses.
        let locator = SparseLocator {
            frames: frames(),
            band: Rect::new(0.0, 100.0, 500.0, 3.0),
        };
        let selection = SelectionRange::new("x", vec![Rect::new(20.0, 100.0, 80.0, 16.0)]);

        let boxes = calculate_bounding_boxes(&selection, &locator, FULL_PAGE_REJECT_RATIO);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].page_number, 1);
    }

    #[test]
    fn test_overflowing_rect_is_clamped() {
        let selection = SelectionRange::new("edge", vec![Rect::new(450.0, 995.0, 100.0, 12.0)]);
        let boxes = calculate_bounding_boxes(&selection, &frames(), FULL_PAGE_REJECT_RATIO);
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].is_within_bounds());
        assert!(approx(boxes[0].x + boxes[0].width, 1.0));
    }

    #[test]
    fn test_two_line_selection_drafts_two_boxes() {
        let selection = SelectionRange::new(
            "first line second line",
            vec![
                Rect::new(50.0, 100.0, 300.0, 14.0),
                Rect::new(50.0, 118.0, 120.0, 14.0),
            ],
        );
        let annotation = draft_annotation(
            &selection,
            &frames(),
            &SelectionOptions::default(),
            DEFAULT_HIGHLIGHT_COLOR,
            42,
        )
        .unwrap();

        assert_eq!(annotation.bounding_boxes.len(), 2);
        assert_eq!(annotation.page_number, 1);
        assert_eq!(annotation.color, DEFAULT_HIGHLIGHT_COLOR);
        assert!(approx(annotation.topmost_box().unwrap().y, 0.1));
    }

    #[test]
    fn test_fragments_on_one_line_are_merged() {
        let selection = SelectionRange::new(
            "one line",
            vec![
                Rect::new(50.0, 100.0, 40.0, 14.0),
                Rect::new(90.0, 100.0, 60.0, 14.0),
                Rect::new(151.0, 101.0, 30.0, 13.0),
            ],
        );
        let annotation = draft_annotation(
            &selection,
            &frames(),
            &SelectionOptions::default(),
            DEFAULT_HIGHLIGHT_COLOR,
            0,
        )
        .unwrap();
        assert_eq!(annotation.bounding_boxes.len(), 1);
    }

    #[test]
    fn test_no_boxes_no_annotation() {
        let selection = SelectionRange::new("void", vec![Rect::new(900.0, 100.0, 40.0, 14.0)]);
        assert!(draft_annotation(
            &selection,
            &frames(),
            &SelectionOptions::default(),
            DEFAULT_HIGHLIGHT_COLOR,
            0
        )
        .is_none());
    }
}
