//! Preview-space / image-space geometry.
//!
//! Positions are stored in image-space. Anything drawn on screen is
//! `image-space value * scale`, where the scale factor is the ratio of the
//! preview width to the source width.

use std::ops::{Add, Div, Mul, Sub};

use crate::settings::PresetAnchor;

/// Edge padding of the preset anchors at scale 1.0.
pub const ANCHOR_PADDING: f32 = 50.0;

/// Padding added around the measured content for hit-testing.
pub const BOUNDS_PADDING: f32 = 10.0;

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

/// Integer pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// `true` if either side is zero.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle with `f32` edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl Rect {
    /// Rectangle of `width` x `height` centered on `center`.
    #[must_use]
    pub fn centered(center: Point, width: f32, height: f32) -> Self {
        Self {
            left: center.x - width / 2.0,
            top: center.y - height / 2.0,
            right: center.x + width / 2.0,
            bottom: center.y + height / 2.0,
        }
    }

    /// Width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    /// The same rectangle moved by `delta`.
    #[must_use]
    pub fn translated(&self, delta: Point) -> Self {
        Self {
            left: self.left + delta.x,
            top: self.top + delta.y,
            right: self.right + delta.x,
            bottom: self.bottom + delta.y,
        }
    }
}

/// Resolve a preset anchor to a coordinate inside a surface of `size`.
///
/// `scale` only affects the padding: `round(50 * scale)`. Pass the image size
/// with `scale = 1.0` for image-space, or the preview size with the current
/// scale for preview-space.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn resolve_anchor(anchor: PresetAnchor, size: Size, scale: f32) -> Point {
    let pad = (ANCHOR_PADDING * scale).round();
    let w = size.width as f32;
    let h = size.height as f32;
    let mid_x = (size.width / 2) as f32;
    let mid_y = (size.height / 2) as f32;

    let (x, y) = match anchor {
        PresetAnchor::TopLeft => (pad, pad),
        PresetAnchor::TopCenter => (mid_x, pad),
        PresetAnchor::TopRight => (w - pad, pad),
        PresetAnchor::CenterLeft => (pad, mid_y),
        PresetAnchor::Center => (mid_x, mid_y),
        PresetAnchor::CenterRight => (w - pad, mid_y),
        PresetAnchor::BottomLeft => (pad, h - pad),
        PresetAnchor::BottomCenter => (mid_x, h - pad),
        PresetAnchor::BottomRight => (w - pad, h - pad),
    };
    Point::new(x, y)
}

/// Hit-test rectangle around `center` for content of `content_w` x `content_h`.
///
/// Axis-aligned; rotation is not taken into account.
#[must_use]
pub fn bounds_around(center: Point, content_w: f32, content_h: f32) -> Rect {
    Rect::centered(
        center,
        content_w + 2.0 * BOUNDS_PADDING,
        content_h + 2.0 * BOUNDS_PADDING,
    )
}

/// Inclusive test that `point` lies on the canvas.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn is_within_canvas(point: Point, canvas: Size) -> bool {
    point.x >= 0.0
        && point.y >= 0.0
        && point.x <= canvas.width as f32
        && point.y <= canvas.height as f32
}

/// Transient mapping between the preview surface and the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleContext {
    /// Full-resolution source size.
    pub image: Size,
    /// Displayed preview size.
    pub preview: Size,
    /// `preview.width / image.width`.
    pub factor: f32,
}

impl ScaleContext {
    /// Identity mapping used for export.
    #[must_use]
    pub fn identity(image: Size) -> Self {
        Self {
            image,
            preview: image,
            factor: 1.0,
        }
    }

    /// Build a context for an already chosen preview size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(image: Size, preview: Size) -> Self {
        let factor = if image.width == 0 {
            1.0
        } else {
            preview.width as f32 / image.width as f32
        };
        Self {
            image,
            preview,
            factor,
        }
    }

    /// Fit `image` into `viewport`, keeping aspect ratio. Images that already
    /// fit are shown at scale 1.0.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn fit(image: Size, viewport: Size) -> Self {
        if image.is_empty()
            || viewport.is_empty()
            || (image.width <= viewport.width && image.height <= viewport.height)
        {
            return Self::identity(image);
        }
        let ratio = (viewport.width as f32 / image.width as f32)
            .min(viewport.height as f32 / image.height as f32);
        let preview = Size::new(
            ((image.width as f32 * ratio).round() as u32).max(1),
            ((image.height as f32 * ratio).round() as u32).max(1),
        );
        Self::new(image, preview)
    }

    /// Image-space to preview-space.
    #[must_use]
    pub fn to_preview(&self, p: Point) -> Point {
        p * self.factor
    }

    /// Preview-space to image-space.
    #[must_use]
    pub fn to_image(&self, p: Point) -> Point {
        p / self.factor
    }
}
