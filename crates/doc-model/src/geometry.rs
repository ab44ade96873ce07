//! Coordinate mapping between the three spaces an annotation lives in
//!
//! - viewport space: pixels on screen at the current zoom, origin top-left
//! - unscaled document space: the same pixels at zoom 1.0, origin top-left
//! - PDF space: points, origin bottom-left
//!
//! Annotations are always stored in unscaled document space. Viewport
//! positions are derived by multiplying with the zoom factor and PDF
//! positions by flipping the vertical axis against the page height.

use serde::{Deserialize, Serialize};

/// Drags smaller than this (in viewport pixels, on either axis) are ignored
pub const MIN_SELECTION_PX: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("zoom factor must be finite and > 0 (got {0})")]
    InvalidZoom(f32),
}

/// Zoom factor applied between unscaled and viewport space
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Zoom(f32);

impl Zoom {
    pub const ACTUAL_SIZE: Zoom = Zoom(1.0);

    pub fn new(factor: f32) -> Result<Self, GeometryError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(GeometryError::InvalidZoom(factor))
        }
    }

    pub fn factor(self) -> f32 {
        self.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self::ACTUAL_SIZE
    }
}

impl TryFrom<f32> for Zoom {
    type Error = GeometryError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Zoom> for f32 {
    fn from(value: Zoom) -> Self {
        value.0
    }
}

/// Viewport pixel to unscaled document pixel
pub fn to_unscaled(px: f32, zoom: Zoom) -> f32 {
    px / zoom.0
}

/// Unscaled document pixel to viewport pixel
pub fn to_viewport(unscaled: f32, zoom: Zoom) -> f32 {
    unscaled * zoom.0
}

/// Maps a top-left-origin rectangle edge to PDF space
///
/// Returns `(x, lower_edge)`; the upper edge is `lower_edge + height`, which
/// equals `page_height - y_top`.
pub fn to_pdf_space(x: f32, y_top: f32, height: f32, page_height: f32) -> (f32, f32) {
    (x, page_height - y_top - height)
}

/// Axis-aligned rectangle, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// True when `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    pub fn to_unscaled(&self, zoom: Zoom) -> Rect {
        Rect::new(
            to_unscaled(self.x, zoom),
            to_unscaled(self.y, zoom),
            to_unscaled(self.width, zoom),
            to_unscaled(self.height, zoom),
        )
    }

    pub fn to_viewport(&self, zoom: Zoom) -> Rect {
        Rect::new(
            to_viewport(self.x, zoom),
            to_viewport(self.y, zoom),
            to_viewport(self.width, zoom),
            to_viewport(self.height, zoom),
        )
    }

    /// The same physical region in PDF space for a page of `page_height` points
    pub fn to_pdf_rect(&self, page_height: f32) -> PdfRect {
        let (llx, lly) = to_pdf_space(self.x, self.y, self.height, page_height);
        PdfRect { llx, lly, urx: llx + self.width, ury: lly + self.height }
    }
}

/// Rectangle in PDF space given by its lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PdfRect {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// `/Rect` array order
    pub fn to_array(&self) -> [f32; 4] {
        [self.llx, self.lly, self.urx, self.ury]
    }

    /// `/QuadPoints` for a single quad covering the whole rectangle:
    /// upper-left, upper-right, lower-left, lower-right.
    pub fn quad_points(&self) -> [f32; 8] {
        [self.llx, self.ury, self.urx, self.ury, self.llx, self.lly, self.urx, self.lly]
    }

    /// Inverse of [`Rect::to_pdf_rect`]
    pub fn to_document_rect(&self, page_height: f32) -> Rect {
        Rect::new(self.llx, page_height - self.ury, self.width(), self.height())
    }
}

/// Point in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewportPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A drag gesture over the rendered page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub start: ViewportPoint,
    pub end: ViewportPoint,
}

impl Selection {
    pub fn new(start: ViewportPoint, end: ViewportPoint) -> Self {
        Self { start, end }
    }

    /// Normalized rectangle regardless of drag direction
    pub fn viewport_rect(&self) -> Rect {
        Rect::new(
            self.start.x.min(self.end.x),
            self.start.y.min(self.end.y),
            (self.end.x - self.start.x).abs(),
            (self.end.y - self.start.y).abs(),
        )
    }

    /// Whether the drag is large enough to become an annotation
    pub fn is_actionable(&self) -> bool {
        let rect = self.viewport_rect();
        rect.width > MIN_SELECTION_PX && rect.height > MIN_SELECTION_PX
    }

    pub fn document_rect(&self, zoom: Zoom) -> Rect {
        self.viewport_rect().to_unscaled(zoom)
    }
}
