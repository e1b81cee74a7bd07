//! Rectangle geometry for text highlights
//!
//! Two coordinate spaces meet here:
//! - Client pixels: rectangles reported by the host for a text selection
//! - Normalized page space: boxes relative to a page's text layer, 0.0 to 1.0
//!
//! Selections arrive as one rectangle per line fragment (often one per glyph run),
//! so adjacent fragments on the same line are merged before they are stored.

use serde::{Deserialize, Serialize};

/// A point in client pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True for zero-area or non-finite rectangles
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
            || !self.x.is_finite()
            || !self.y.is_finite()
            || !self.width.is_finite()
            || !self.height.is_finite()
    }

    /// Check if this rectangle contains a point (edges inclusive)
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Smallest rectangle covering both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Height of the shared vertical band, zero when the rectangles don't overlap
    pub fn vertical_overlap(&self, other: &Rect) -> f64 {
        (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Highlight box in normalized page space
///
/// All of `x`, `y`, `width` and `height` are fractions of the page's text layer.
/// Boxes are clamped at creation so `x + width <= 1` and `y + height <= 1` hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a box, clamping it into the unit square
    pub fn clamped(page_number: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        let x = clamp_unit(x);
        let y = clamp_unit(y);
        let width = width.max(0.0).min(1.0 - x);
        let height = height.max(0.0).min(1.0 - y);
        Self {
            page_number,
            x,
            y,
            width: if width.is_finite() { width } else { 0.0 },
            height: if height.is_finite() { height } else { 0.0 },
        }
    }

    /// Create a clamped box from a normalized rectangle
    pub fn from_rect(page_number: u32, rect: &Rect) -> Self {
        Self::clamped(page_number, rect.x, rect.y, rect.width, rect.height)
    }

    /// The box as a normalized rectangle (page number dropped)
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Check the normalization invariant
    pub fn is_within_bounds(&self) -> bool {
        const EPSILON: f64 = 1e-9;
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0 + EPSILON
            && self.y + self.height <= 1.0 + EPSILON
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Tuning for highlight box merging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    /// Maximum horizontal gap between boxes that still counts as adjacent
    pub margin: f64,

    /// Required vertical overlap, as a fraction of the smaller box's height
    pub min_vertical_overlap: f64,
}

impl MergeOptions {
    /// Defaults for client pixel rectangles (20px margin)
    pub fn pixels() -> Self {
        Self {
            margin: 20.0,
            min_vertical_overlap: 0.5,
        }
    }

    /// Defaults for normalized boxes (0.005 margin)
    pub fn normalized() -> Self {
        Self {
            margin: 0.005,
            min_vertical_overlap: 0.5,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_min_vertical_overlap(mut self, fraction: f64) -> Self {
        self.min_vertical_overlap = fraction;
        self
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::pixels()
    }
}

/// Merge line fragments of a selection into per-line boxes
///
/// Boxes on the same line (enough vertical overlap) that touch or nearly touch
/// horizontally are replaced by their union. Passes repeat until one produces no
/// reduction, because a union can become adjacent to a box it skipped earlier.
///
/// Empty and zero-size rectangles are dropped. The result is sorted by (y, x).
pub fn merge_highlight_boxes(rects: &[Rect], options: &MergeOptions) -> Vec<Rect> {
    let mut current: Vec<Rect> = rects.iter().copied().filter(|rect| !rect.is_empty()).collect();

    loop {
        let before = current.len();
        current = merge_pass(current, options);
        if current.len() >= before {
            return current;
        }
    }
}

/// Merge normalized boxes, page by page
///
/// Boxes are never merged across pages. Output is ordered by page, then (y, x).
pub fn merge_normalized_boxes(boxes: &[BoundingBox], options: &MergeOptions) -> Vec<BoundingBox> {
    let mut by_page: std::collections::BTreeMap<u32, Vec<Rect>> = std::collections::BTreeMap::new();
    for bbox in boxes {
        by_page.entry(bbox.page_number).or_default().push(bbox.rect());
    }

    by_page
        .into_iter()
        .flat_map(|(page_number, rects)| {
            merge_highlight_boxes(&rects, options)
                .into_iter()
                .map(move |rect| BoundingBox::from_rect(page_number, &rect))
        })
        .collect()
}

fn merge_pass(mut rects: Vec<Rect>, options: &MergeOptions) -> Vec<Rect> {
    rects.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut merged = Vec::with_capacity(rects.len());
    let mut iter = rects.into_iter();
    let Some(mut accumulator) = iter.next() else {
        return merged;
    };

    for rect in iter {
        if should_merge(&accumulator, &rect, options) {
            accumulator = accumulator.union(&rect);
        } else {
            merged.push(accumulator);
            accumulator = rect;
        }
    }
    merged.push(accumulator);

    merged
}

fn should_merge(accumulator: &Rect, next: &Rect, options: &MergeOptions) -> bool {
    let smaller_height = accumulator.height.min(next.height);
    let same_line =
        accumulator.vertical_overlap(next) >= smaller_height * options.min_vertical_overlap;

    let adjacent = next.x <= accumulator.right() + options.margin
        && next.right() >= accumulator.x - options.margin;

    same_line && adjacent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rect_union() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn test_vertical_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(0.0, 6.0, 10.0, 10.0);
        let c = Rect::new(0.0, 20.0, 10.0, 10.0);
        assert!(approx(a.vertical_overlap(&b), 4.0));
        assert_eq!(a.vertical_overlap(&c), 0.0);
    }

    #[test]
    fn test_empty_rects() {
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(Rect::new(0.0, 0.0, 10.0, 0.0).is_empty());
        assert!(Rect::new(f64::NAN, 0.0, 10.0, 10.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_clamped_box_stays_in_unit_square() {
        let bbox = BoundingBox::clamped(1, 0.9, -0.2, 0.5, 1.5);
        assert_eq!(bbox.x, 0.9);
        assert_eq!(bbox.y, 0.0);
        assert!(approx(bbox.width, 0.1));
        assert!(approx(bbox.height, 1.0));
        assert!(bbox.is_within_bounds());
    }

    #[test]
    fn test_merge_adjacent_same_line() {
        let boxes = [
            Rect::new(0.0, 0.0, 0.1, 0.02),
            Rect::new(0.1, 0.001, 0.1, 0.02),
        ];
        let merged = merge_highlight_boxes(&boxes, &MergeOptions::normalized());

        assert_eq!(merged.len(), 1);
        assert!(approx(merged[0].x, 0.0));
        assert!(approx(merged[0].right(), 0.2));
    }

    #[test]
    fn test_different_lines_never_merge() {
        let boxes = [Rect::new(0.0, 0.0, 0.1, 0.02), Rect::new(0.0, 0.5, 0.1, 0.02)];
        let merged = merge_highlight_boxes(&boxes, &MergeOptions::normalized());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_distant_boxes_on_same_line_stay_apart() {
        let boxes = [Rect::new(0.0, 0.0, 0.1, 0.02), Rect::new(0.5, 0.0, 0.1, 0.02)];
        let merged = merge_highlight_boxes(&boxes, &MergeOptions::normalized());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_reaches_fixed_point() {
        // First pass merges b and c only; a becomes adjacent to the union afterwards.
        let a = Rect::new(0.0, 0.0, 0.1, 0.02);
        let b = Rect::new(0.3, 0.0005, 0.1, 0.02);
        let c = Rect::new(0.1, 0.001, 0.2, 0.02);

        let merged = merge_highlight_boxes(&[a, b, c], &MergeOptions::normalized());

        assert_eq!(merged.len(), 1);
        assert!(approx(merged[0].x, 0.0));
        assert!(approx(merged[0].right(), 0.4));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let boxes = [
            Rect::new(10.0, 100.0, 40.0, 14.0),
            Rect::new(52.0, 101.0, 30.0, 14.0),
            Rect::new(200.0, 102.0, 30.0, 14.0),
            Rect::new(10.0, 118.0, 80.0, 14.0),
            Rect::new(95.0, 119.0, 10.0, 12.0),
            Rect::new(10.0, 400.0, 5.0, 14.0),
        ];
        let options = MergeOptions::pixels();

        let once = merge_highlight_boxes(&boxes, &options);
        let twice = merge_highlight_boxes(&once, &options);

        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn test_zero_size_rects_are_filtered() {
        let boxes = [
            Rect::new(0.0, 0.0, 0.0, 12.0),
            Rect::new(0.0, 0.0, 12.0, 0.0),
            Rect::new(5.0, 5.0, 10.0, 10.0),
        ];
        let merged = merge_highlight_boxes(&boxes, &MergeOptions::pixels());
        assert_eq!(merged, vec![Rect::new(5.0, 5.0, 10.0, 10.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_highlight_boxes(&[], &MergeOptions::pixels()).is_empty());
        assert!(merge_normalized_boxes(&[], &MergeOptions::normalized()).is_empty());
    }

    #[test]
    fn test_normalized_merge_keeps_pages_apart() {
        let boxes = [
            BoundingBox::clamped(2, 0.0, 0.0, 0.1, 0.02),
            BoundingBox::clamped(1, 0.1, 0.0, 0.1, 0.02),
            BoundingBox::clamped(1, 0.0, 0.0, 0.1, 0.02),
        ];
        let merged = merge_normalized_boxes(&boxes, &MergeOptions::normalized());

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].page_number, 1);
        assert!(approx(merged[0].width, 0.2));
        assert_eq!(merged[1].page_number, 2);
    }

    #[test]
    fn test_normalized_merge_respects_bounds() {
        let boxes = [
            BoundingBox::clamped(1, 0.8, 0.98, 0.15, 0.02),
            BoundingBox::clamped(1, 0.95, 0.985, 0.2, 0.05),
        ];
        for bbox in merge_normalized_boxes(&boxes, &MergeOptions::normalized()) {
            assert!(bbox.is_within_bounds(), "{bbox:?}");
        }
    }
}
