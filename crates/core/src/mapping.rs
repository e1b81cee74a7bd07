//! Normalized box to pixel mapping
//!
//! Annotation boxes are stored relative to a page's text layer. To draw them, each
//! box is scaled by the text layer's current client rect and offset by its origin.
//! The text layer rect already reflects zoom and scroll, so mapping must be redone
//! whenever the scale, the scroll offset, or the rendered pages change.
//!
//! Pages that have not finished rendering (zero-width canvas) are skipped; the
//! caller retries on the next scroll, resize or mutation trigger.

use crate::annotation::Annotation;
use crate::geometry::{BoundingBox, Point, Rect};
use crate::selection::TextLayerLocator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rendered state of one page, as reported by the rendering host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFrame {
    pub page_number: u32,

    /// Width of the rendered canvas; zero while the page is still rendering
    pub canvas_width: f64,

    /// Client rect of the page's text layer
    pub text_layer: Rect,
}

impl PageFrame {
    pub fn new(page_number: u32, canvas_width: f64, text_layer: Rect) -> Self {
        Self {
            page_number,
            canvas_width,
            text_layer,
        }
    }

    /// A page can be mapped once its canvas and text layer have a size
    pub fn is_rendered(&self) -> bool {
        self.canvas_width > 0.0 && !self.text_layer.is_empty()
    }
}

/// Live page geometry provided by the rendering host
pub trait PageGeometry {
    /// Frame of the page with this number, `None` if the page or its text layer is absent
    fn page_frame(&self, page_number: u32) -> Option<PageFrame>;
}

/// Scroll container state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerFrame {
    /// Client rect of the scroll container
    pub container: Rect,
    pub scroll_top: f64,
    pub scroll_left: f64,

    /// Document zoom (1.0 = 100%)
    pub scale: f64,
}

impl ViewerFrame {
    pub fn new(container: Rect) -> Self {
        Self {
            container,
            scroll_top: 0.0,
            scroll_left: 0.0,
            scale: 1.0,
        }
    }

    pub fn with_scroll(mut self, scroll_top: f64, scroll_left: f64) -> Self {
        self.scroll_top = scroll_top;
        self.scroll_left = scroll_left;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Convert a client point into container content space (scroll-independent)
    pub fn to_content(&self, point: Point) -> Point {
        Point::new(
            point.x - self.container.x + self.scroll_left,
            point.y - self.container.y + self.scroll_top,
        )
    }

    /// Convert a content-space y back into client space
    pub fn content_y_to_client(&self, y: f64) -> f64 {
        y - self.scroll_top + self.container.y
    }

    pub fn right_edge(&self) -> f64 {
        self.container.right()
    }
}

impl Default for ViewerFrame {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 800.0, 600.0))
    }
}

/// Inputs a mapping pass depends on
///
/// Comparing the snapshot taken at the last pass with the current one tells the
/// caller whether previously mapped positions are stale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingInputs {
    pub scale: f64,
    pub scroll_top: f64,

    /// Bumped each time the host reports newly rendered pages
    pub dom_generation: u64,
}

impl MappingInputs {
    pub fn capture(viewer: &ViewerFrame, dom_generation: u64) -> Self {
        Self {
            scale: viewer.scale,
            scroll_top: viewer.scroll_top,
            dom_generation,
        }
    }

    /// Check whether positions mapped under `other` are stale under `self`
    pub fn differs(&self, other: &MappingInputs) -> bool {
        self.scale != other.scale
            || self.scroll_top != other.scroll_top
            || self.dom_generation != other.dom_generation
    }
}

/// Map a normalized box to a client pixel rect
///
/// Returns `None` when the page is missing or not rendered yet.
pub fn map_box(bbox: &BoundingBox, geometry: &dyn PageGeometry) -> Option<Rect> {
    let frame = geometry.page_frame(bbox.page_number)?;
    if !frame.is_rendered() {
        tracing::trace!(page = bbox.page_number, "page not rendered, skipping box");
        return None;
    }

    let layer = frame.text_layer;
    Some(Rect::new(
        layer.x + bbox.x * layer.width,
        layer.y + bbox.y * layer.height,
        bbox.width * layer.width,
        bbox.height * layer.height,
    ))
}

/// Map every box of an annotation
///
/// The first box decides: if it can't be mapped the whole annotation is skipped.
/// Later boxes on pages that are not rendered yet are left out.
pub fn map_annotation(annotation: &Annotation, geometry: &dyn PageGeometry) -> Option<Vec<Rect>> {
    let first = annotation.first_box()?;
    let first_rect = map_box(first, geometry)?;

    let mut rects = Vec::with_capacity(annotation.bounding_boxes.len());
    rects.push(first_rect);
    rects.extend(annotation.bounding_boxes.iter().skip(1).filter_map(|b| map_box(b, geometry)));
    Some(rects)
}

/// Where connector lines and badges attach to a highlight
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightAnchor {
    /// First box in client pixels
    pub first_box: Rect,

    /// Left edge of the first box, at its vertical center
    pub left: Point,

    /// Centroid of all mapped boxes
    pub centroid: Point,

    /// All mapped boxes in client pixels
    pub boxes: Vec<Rect>,
}

/// Resolve the client-space anchor points of an annotation
pub fn highlight_anchor(
    annotation: &Annotation,
    geometry: &dyn PageGeometry,
) -> Option<HighlightAnchor> {
    let boxes = map_annotation(annotation, geometry)?;
    let first_box = boxes[0];

    let count = boxes.len() as f64;
    let (sum_x, sum_y) = boxes.iter().fold((0.0, 0.0), |(sx, sy), rect| {
        let center = rect.center();
        (sx + center.x, sy + center.y)
    });

    Some(HighlightAnchor {
        first_box,
        left: Point::new(first_box.x, first_box.center().y),
        centroid: Point::new(sum_x / count, sum_y / count),
        boxes,
    })
}

/// Convert a client point to normalized coordinates within a page frame
pub fn normalize_point(point: Point, text_layer: &Rect) -> Option<(f64, f64)> {
    if text_layer.is_empty() {
        return None;
    }
    let x = ((point.x - text_layer.x) / text_layer.width).clamp(0.0, 1.0);
    let y = ((point.y - text_layer.y) / text_layer.height).clamp(0.0, 1.0);
    Some((x, y))
}

/// Convert normalized page coordinates to a client point
pub fn denormalize_point(
    page_number: u32,
    x: f64,
    y: f64,
    geometry: &dyn PageGeometry,
) -> Option<Point> {
    let frame = geometry.page_frame(page_number)?;
    if !frame.is_rendered() {
        return None;
    }
    let layer = frame.text_layer;
    Some(Point::new(layer.x + x * layer.width, layer.y + y * layer.height))
}

/// Page frames held in memory
///
/// Used by hosts that snapshot their layout once per frame, by the CLI scene
/// format and by tests. Hit testing picks the highest-numbered page whose text
/// layer contains the point, matching a document where later pages paint on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFrames {
    frames: BTreeMap<u32, PageFrame>,
}

impl PageFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay out pages vertically, top to bottom, starting at `top`
    pub fn stacked(
        count: u32,
        left: f64,
        top: f64,
        page_width: f64,
        page_height: f64,
        spacing: f64,
    ) -> Self {
        let mut frames = Self::new();
        for index in 0..count {
            let y = top + index as f64 * (page_height + spacing);
            frames.insert(PageFrame::new(
                index + 1,
                page_width,
                Rect::new(left, y, page_width, page_height),
            ));
        }
        frames
    }

    pub fn insert(&mut self, frame: PageFrame) {
        self.frames.insert(frame.page_number, frame);
    }

    pub fn remove(&mut self, page_number: u32) -> Option<PageFrame> {
        self.frames.remove(&page_number)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shift every page vertically, as scrolling the container does
    pub fn scrolled_by(&self, dy: f64) -> Self {
        let frames = self
            .frames
            .iter()
            .map(|(page, frame)| {
                let mut frame = *frame;
                frame.text_layer = frame.text_layer.translate(0.0, -dy);
                (*page, frame)
            })
            .collect();
        Self { frames }
    }
}

impl FromIterator<PageFrame> for PageFrames {
    fn from_iter<T: IntoIterator<Item = PageFrame>>(iter: T) -> Self {
        let mut frames = Self::new();
        for frame in iter {
            frames.insert(frame);
        }
        frames
    }
}

impl PageGeometry for PageFrames {
    fn page_frame(&self, page_number: u32) -> Option<PageFrame> {
        self.frames.get(&page_number).copied()
    }
}

impl TextLayerLocator for PageFrames {
    fn text_layer_at(&self, point: Point) -> Option<u32> {
        self.frames
            .values()
            .rev()
            .find(|frame| frame.is_rendered() && frame.text_layer.contains_point(&point))
            .map(|frame| frame.page_number)
    }

    fn text_layer_rect(&self, page_number: u32) -> Option<Rect> {
        self.frames.get(&page_number).map(|frame| frame.text_layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::DEFAULT_HIGHLIGHT_COLOR;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn frames() -> PageFrames {
        PageFrames::stacked(2, 100.0, 50.0, 600.0, 800.0, 20.0)
    }

    #[test]
    fn test_map_box_scales_and_offsets() {
        let bbox = BoundingBox::clamped(2, 0.5, 0.25, 0.1, 0.02);
        let rect = map_box(&bbox, &frames()).unwrap();

        // Page 2 text layer starts at y = 50 + 820
        assert!(approx(rect.x, 100.0 + 300.0));
        assert!(approx(rect.y, 870.0 + 200.0));
        assert!(approx(rect.width, 60.0));
        assert!(approx(rect.height, 16.0));
    }

    #[test]
    fn test_unrendered_page_is_skipped() {
        let mut frames = frames();
        frames.insert(PageFrame::new(3, 0.0, Rect::new(100.0, 1690.0, 600.0, 800.0)));

        let bbox = BoundingBox::clamped(3, 0.1, 0.1, 0.1, 0.1);
        assert!(map_box(&bbox, &frames).is_none());

        let missing = BoundingBox::clamped(9, 0.1, 0.1, 0.1, 0.1);
        assert!(map_box(&missing, &frames).is_none());
    }

    #[test]
    fn test_map_annotation_requires_first_box() {
        let annotation = Annotation::new(
            "x",
            vec![
                BoundingBox::clamped(9, 0.1, 0.1, 0.1, 0.02),
                BoundingBox::clamped(1, 0.1, 0.1, 0.1, 0.02),
            ],
            DEFAULT_HIGHLIGHT_COLOR,
            0,
        );
        assert!(map_annotation(&annotation, &frames()).is_none());
    }

    #[test]
    fn test_map_annotation_skips_later_unrendered_boxes() {
        let annotation = Annotation::new(
            "x",
            vec![
                BoundingBox::clamped(2, 0.1, 0.9, 0.1, 0.02),
                BoundingBox::clamped(3, 0.1, 0.0, 0.1, 0.02),
            ],
            DEFAULT_HIGHLIGHT_COLOR,
            0,
        );
        let rects = map_annotation(&annotation, &frames()).unwrap();
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn test_highlight_anchor_points() {
        let annotation = Annotation::new(
            "x",
            vec![
                BoundingBox::clamped(1, 0.0, 0.0, 0.5, 0.025),
                BoundingBox::clamped(1, 0.0, 0.05, 0.5, 0.025),
            ],
            DEFAULT_HIGHLIGHT_COLOR,
            0,
        );
        let anchor = highlight_anchor(&annotation, &frames()).unwrap();

        assert!(approx(anchor.left.x, 100.0));
        assert!(approx(anchor.left.y, 60.0));
        assert!(approx(anchor.centroid.x, 250.0));
        assert!(approx(anchor.centroid.y, 80.0));
    }

    #[test]
    fn test_scroll_moves_mapped_position() {
        let bbox = BoundingBox::clamped(1, 0.0, 0.5, 0.1, 0.01);
        let before = map_box(&bbox, &frames()).unwrap();
        let after = map_box(&bbox, &frames().scrolled_by(120.0)).unwrap();
        assert!(approx(before.y - after.y, 120.0));
    }

    #[test]
    fn test_viewer_content_space_round_trip() {
        let viewer = ViewerFrame::new(Rect::new(0.0, 40.0, 800.0, 600.0)).with_scroll(300.0, 0.0);
        let content = viewer.to_content(Point::new(10.0, 100.0));
        assert!(approx(content.y, 360.0));
        assert!(approx(viewer.content_y_to_client(content.y), 100.0));
    }

    #[test]
    fn test_mapping_inputs_detect_changes() {
        let viewer = ViewerFrame::default();
        let base = MappingInputs::capture(&viewer, 0);

        assert!(!base.differs(&MappingInputs::capture(&viewer, 0)));
        assert!(base.differs(&MappingInputs::capture(&viewer, 1)));
        assert!(base.differs(&MappingInputs::capture(&viewer.with_scale(1.5), 0)));
        assert!(base.differs(&MappingInputs::capture(&viewer.with_scroll(10.0, 0.0), 0)));
    }

    #[test]
    fn test_hit_testing() {
        let frames = frames();
        assert_eq!(frames.text_layer_at(Point::new(150.0, 60.0)), Some(1));
        assert_eq!(frames.text_layer_at(Point::new(150.0, 900.0)), Some(2));
        // Gap between pages
        assert_eq!(frames.text_layer_at(Point::new(150.0, 860.0)), None);
    }

    #[test]
    fn test_point_normalization() {
        let layer = Rect::new(100.0, 50.0, 600.0, 800.0);
        let (x, y) = normalize_point(Point::new(400.0, 450.0), &layer).unwrap();
        assert!(approx(x, 0.5));
        assert!(approx(y, 0.5));

        let point = denormalize_point(1, x, y, &frames()).unwrap();
        assert!(approx(point.x, 400.0));
        assert!(approx(point.y, 450.0));
    }
}
