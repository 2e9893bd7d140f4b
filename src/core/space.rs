use crate::core::geom::{Point, Rect};
use serde::{Deserialize, Serialize};

/// The logical viewport: the region of the shared unit space currently on
/// screen, plus the screen width in device pixels.
///
/// Every item in a world is positioned in the same logical space; the pixel
/// width is what lets an item compare a pyramid level's resolution against
/// the density the screen actually needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Visible region in logical coordinates
    pub rect: Rect,
    /// On-screen width of `rect` in device pixels
    pub pixels_wide: f64,
}

impl Viewport {
    pub fn new(rect: Rect, pixels_wide: f64) -> Self {
        Self { rect, pixels_wide }
    }

    /// Device pixels per logical unit at the current zoom
    pub fn pixels_per_unit(&self) -> f64 {
        if self.rect.width > 0.0 {
            self.pixels_wide / self.rect.width
        } else {
            0.0
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1024.0)
    }
}

/// Maps between an item's content pixel space and the shared logical space.
///
/// The mapping is the affine `logical = bounds.origin + content / scale` with
/// `scale = content_width / bounds.width`, optionally composed with a
/// rotation about the bounds center. Point maps are exact inverses of each
/// other; rectangle maps carry the origin through the point map and scale
/// extents, so they round-trip exactly as well (the rectangle stays an
/// axis-aligned carrier even under rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSpace {
    bounds: Rect,
    content_size: Point,
    rotation: f64,
}

impl CoordinateSpace {
    pub fn new(bounds: Rect, content_size: Point) -> Self {
        Self {
            bounds,
            content_size,
            rotation: 0.0,
        }
    }

    /// Composes a rotation (degrees) about the bounds center into the map
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Content pixels per logical unit
    pub fn scale(&self) -> f64 {
        self.content_size.x / self.bounds.width
    }

    pub fn content_to_logical_point(&self, point: &Point) -> Point {
        let scale = self.scale();
        let unrotated = Point::new(
            self.bounds.x + point.x / scale,
            self.bounds.y + point.y / scale,
        );
        unrotated.rotated_about(&self.bounds.center(), self.rotation)
    }

    pub fn logical_to_content_point(&self, point: &Point) -> Point {
        let scale = self.scale();
        let unrotated = point.rotated_about(&self.bounds.center(), -self.rotation);
        Point::new(
            (unrotated.x - self.bounds.x) * scale,
            (unrotated.y - self.bounds.y) * scale,
        )
    }

    pub fn content_to_logical_rect(&self, rect: &Rect) -> Rect {
        let scale = self.scale();
        let origin = self.content_to_logical_point(&rect.top_left());
        Rect::new(origin.x, origin.y, rect.width / scale, rect.height / scale)
    }

    pub fn logical_to_content_rect(&self, rect: &Rect) -> Rect {
        let scale = self.scale();
        let origin = self.logical_to_content_point(&rect.top_left());
        Rect::new(origin.x, origin.y, rect.width * scale, rect.height * scale)
    }
}
