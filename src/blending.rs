//! Alpha math for watermark compositing.
//!
//! All layers use straight (non-premultiplied) 8-bit RGBA. Compositing is the
//! Porter-Duff "over" operator:
//! `out_a = src_a + dst_a * (1 - src_a)`,
//! `out_c = (src_c * src_a + dst_c * dst_a * (1 - src_a)) / out_a`.
//!
//! Resampling for rotated stamping interpolates in premultiplied space so that
//! transparent neighbours do not darken edges.

use image::{Rgba, RgbaImage};

use crate::geometry::Point;

/// Below this output alpha a pixel is treated as fully transparent.
const MIN_ALPHA: f32 = 1.0 / 512.0;

/// Integer pixel rectangle, `x0..x1` by `y0..y1` (exclusive ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// First column.
    pub x0: u32,
    /// First row.
    pub y0: u32,
    /// One past the last column.
    pub x1: u32,
    /// One past the last row.
    pub y1: u32,
}

impl PixelRect {
    /// `true` if the rectangle covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Clip float bounds to an image of `width` x `height`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clipped(min_x: f32, min_y: f32, max_x: f32, max_y: f32, width: u32, height: u32) -> Self {
        let clamp = |v: f32, hi: u32| -> u32 { v.max(0.0).min(hi as f32) as u32 };
        Self {
            x0: clamp(min_x.floor(), width),
            y0: clamp(min_y.floor(), height),
            x1: clamp(max_x.ceil(), width),
            y1: clamp(max_y.ceil(), height),
        }
    }
}

/// Map an opacity percentage to an 8-bit alpha: `round(255 * percent / 100)`.
///
/// 80% maps to exactly 204.
#[must_use]
pub fn opacity_to_alpha(percent: u8) -> u8 {
    scale_alpha(255, percent)
}

/// Multiply an alpha value by `percent / 100`, rounding to nearest.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn scale_alpha(alpha: u8, percent: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    ((u32::from(alpha) * percent + 50) / 100) as u8
}

/// Multiply every pixel's alpha by `percent / 100` in place.
pub fn apply_opacity(layer: &mut RgbaImage, percent: u8) {
    if percent >= 100 {
        return;
    }
    for px in layer.pixels_mut() {
        px[3] = scale_alpha(px[3], percent);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Composite `src` over `dst`.
#[must_use]
pub fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        0 => return dst,
        255 => return src,
        _ => {}
    }
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < MIN_ALPHA {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| -> u8 {
        let s = f32::from(s) / 255.0;
        let d = f32::from(d) / 255.0;
        to_u8((s * sa + d * da * (1.0 - sa)) / out_a)
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        to_u8(out_a),
    ])
}

/// Composite `overlay` onto `target` inside `region`. Both images must have
/// the same dimensions.
pub fn composite_over(target: &mut RgbaImage, overlay: &RgbaImage, region: PixelRect) {
    debug_assert_eq!(target.dimensions(), overlay.dimensions());
    let x1 = region.x1.min(target.width()).min(overlay.width());
    let y1 = region.y1.min(target.height()).min(overlay.height());
    for y in region.y0..y1 {
        for x in region.x0..x1 {
            let src = *overlay.get_pixel(x, y);
            if src[3] == 0 {
                continue;
            }
            let px = target.get_pixel_mut(x, y);
            *px = over(*px, src);
        }
    }
}

/// Copy `sprite` over `target` with its top-left corner at `(left, top)`,
/// clipping to the target. Returns the touched region.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn blit_over(target: &mut RgbaImage, sprite: &RgbaImage, left: i64, top: i64) -> PixelRect {
    let tw = i64::from(target.width());
    let th = i64::from(target.height());
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = left.saturating_add(i64::from(sprite.width())).min(tw);
    let y1 = top.saturating_add(i64::from(sprite.height())).min(th);
    if x0 >= x1 || y0 >= y1 {
        return PixelRect::default();
    }
    for ty in y0..y1 {
        for tx in x0..x1 {
            let src = *sprite.get_pixel((tx - left) as u32, (ty - top) as u32);
            if src[3] == 0 {
                continue;
            }
            let px = target.get_pixel_mut(tx as u32, ty as u32);
            *px = over(*px, src);
        }
    }
    PixelRect {
        x0: x0 as u32,
        y0: y0 as u32,
        x1: x1 as u32,
        y1: y1 as u32,
    }
}

/// Bilinear sample at continuous pixel coordinates (pixel centers at
/// integers), interpolating in premultiplied space. Outside the image is
/// transparent.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let (ix, iy) = (x0 as i64, y0 as i64);

    let mut acc = [0.0_f32; 4];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if weight <= 0.0 {
            continue;
        }
        let (px, py) = (ix + dx, iy + dy);
        if px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let p = img.get_pixel(px as u32, py as u32);
        let a = f32::from(p[3]) / 255.0 * weight;
        acc[0] += f32::from(p[0]) / 255.0 * a;
        acc[1] += f32::from(p[1]) / 255.0 * a;
        acc[2] += f32::from(p[2]) / 255.0 * a;
        acc[3] += a;
    }

    if acc[3] < MIN_ALPHA {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        to_u8(acc[0] / acc[3]),
        to_u8(acc[1] / acc[3]),
        to_u8(acc[2] / acc[3]),
        to_u8(acc[3]),
    ])
}

/// Draw `sprite` onto `target` centered at `center`, rotated clockwise by
/// `degrees` about that point. Returns the touched region.
///
/// Unrotated sprites are placed with their top-left corner snapped to the
/// nearest pixel and copied without resampling.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn stamp(target: &mut RgbaImage, sprite: &RgbaImage, center: Point, degrees: f32) -> PixelRect {
    let sw = sprite.width() as f32;
    let sh = sprite.height() as f32;
    if sprite.width() == 0 || sprite.height() == 0 {
        return PixelRect::default();
    }

    let degrees = degrees.rem_euclid(360.0);
    if degrees == 0.0 {
        let left = (center.x - sw / 2.0).round() as i64;
        let top = (center.y - sh / 2.0).round() as i64;
        return blit_over(target, sprite, left, top);
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (hw, hh) = (sw / 2.0, sh / 2.0);

    // Forward-rotate the sprite corners to find the destination footprint.
    let corners = [(-hw, -hh), (hw, -hh), (-hw, hh), (hw, hh)];
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for (x, y) in corners {
        let rx = x * cos - y * sin + center.x;
        let ry = x * sin + y * cos + center.y;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }
    let region = PixelRect::clipped(
        min_x,
        min_y,
        max_x,
        max_y,
        target.width(),
        target.height(),
    );

    for ty in region.y0..region.y1 {
        for tx in region.x0..region.x1 {
            let dx = tx as f32 + 0.5 - center.x;
            let dy = ty as f32 + 0.5 - center.y;
            // inverse rotation back into sprite space
            let sx = dx * cos + dy * sin + hw;
            let sy = -dx * sin + dy * cos + hh;
            if sx < -1.0 || sy < -1.0 || sx > sw + 1.0 || sy > sh + 1.0 {
                continue;
            }
            let src = sample_bilinear(sprite, sx - 0.5, sy - 0.5);
            if src[3] == 0 {
                continue;
            }
            let px = target.get_pixel_mut(tx, ty);
            *px = over(*px, src);
        }
    }
    region
}

/// Draw a one pixel rectangle outline.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn outline(target: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) -> PixelRect {
    let x1 = rect.x1.min(target.width());
    let y1 = rect.y1.min(target.height());
    if rect.x0 >= x1 || rect.y0 >= y1 {
        return PixelRect::default();
    }
    for x in rect.x0..x1 {
        for y in [rect.y0, y1 - 1] {
            let px = target.get_pixel_mut(x, y);
            *px = over(*px, color);
        }
    }
    for y in rect.y0 + 1..y1.saturating_sub(1) {
        for x in [rect.x0, x1 - 1] {
            let px = target.get_pixel_mut(x, y);
            *px = over(*px, color);
        }
    }
    PixelRect {
        x0: rect.x0,
        y0: rect.y0,
        x1,
        y1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn opacity_maps_to_rounded_alpha() {
        assert_eq!(opacity_to_alpha(80), 204);
        assert_eq!(opacity_to_alpha(100), 255);
        assert_eq!(opacity_to_alpha(0), 0);
        assert_eq!(opacity_to_alpha(50), 128);
        assert_eq!(opacity_to_alpha(1), 3);
        assert_eq!(scale_alpha(128, 80), 102);
    }

    #[test]
    fn apply_opacity_scales_every_alpha() {
        let mut layer = solid(4, 4, [10, 20, 30, 255]);
        apply_opacity(&mut layer, 80);
        assert!(layer.pixels().all(|p| p[3] == 204 && p[0] == 10));
    }

    #[test]
    fn over_handles_trivial_alphas() {
        let dst = Rgba([10, 20, 30, 255]);
        assert_eq!(over(dst, Rgba([200, 200, 200, 0])), dst);
        assert_eq!(over(dst, Rgba([1, 2, 3, 255])), Rgba([1, 2, 3, 255]));
        assert_eq!(over(Rgba([0, 0, 0, 0]), Rgba([50, 60, 70, 204])), Rgba([50, 60, 70, 204]));
    }

    #[test]
    fn over_blends_on_opaque_background() {
        let out = over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 204]));
        assert_eq!(out[3], 255);
        assert_eq!(out[0], 204);
    }

    #[test]
    fn blit_clips_to_target() {
        let mut target = solid(10, 10, [0, 0, 0, 0]);
        let sprite = solid(4, 4, [255, 0, 0, 255]);
        let region = blit_over(&mut target, &sprite, 8, -2);
        assert_eq!(region, PixelRect { x0: 8, y0: 0, x1: 10, y1: 2 });
        assert_eq!(target.get_pixel(9, 1)[0], 255);
        assert_eq!(target.get_pixel(7, 1)[3], 0);

        let none = blit_over(&mut target, &sprite, 20, 20);
        assert!(none.is_empty());
    }

    #[test]
    fn blit_at_extreme_offsets_is_empty() {
        let mut target = solid(10, 10, [0, 0, 0, 0]);
        let sprite = solid(4, 4, [255, 0, 0, 255]);
        assert!(blit_over(&mut target, &sprite, i64::MAX, 2).is_empty());
        assert!(blit_over(&mut target, &sprite, 2, i64::MAX).is_empty());
        assert!(blit_over(&mut target, &sprite, i64::MIN, i64::MIN).is_empty());
        assert!(target.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn unrotated_stamp_is_pixel_exact() {
        let mut target = solid(20, 20, [0, 0, 0, 0]);
        let sprite = solid(4, 2, [9, 8, 7, 204]);
        let region = stamp(&mut target, &sprite, Point::new(10.0, 10.0), 0.0);
        assert_eq!(region, PixelRect { x0: 8, y0: 9, x1: 12, y1: 11 });
        assert_eq!(*target.get_pixel(8, 9), Rgba([9, 8, 7, 204]));
        assert_eq!(*target.get_pixel(11, 10), Rgba([9, 8, 7, 204]));
        assert_eq!(target.get_pixel(12, 10)[3], 0);
        assert_eq!(target.get_pixel(8, 8)[3], 0);
    }

    #[test]
    fn quarter_turn_swaps_footprint() {
        let mut target = solid(40, 40, [0, 0, 0, 0]);
        let sprite = solid(20, 4, [255, 255, 255, 255]);
        stamp(&mut target, &sprite, Point::new(20.0, 20.0), 90.0);
        // now 4 wide, 20 tall
        assert_eq!(target.get_pixel(20, 12)[3], 255);
        assert_eq!(target.get_pixel(20, 27)[3], 255);
        assert_eq!(target.get_pixel(12, 20)[3], 0);
        assert_eq!(target.get_pixel(27, 20)[3], 0);
    }

    #[test]
    fn bilinear_keeps_color_of_soft_edges() {
        let mut img = solid(2, 1, [0, 0, 0, 0]);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mid = sample_bilinear(&img, 0.5, 0.0);
        assert_eq!(mid[0], 255);
        assert_eq!(mid[3], 128);
        assert_eq!(sample_bilinear(&img, -5.0, 0.0)[3], 0);
    }

    #[test]
    fn composite_only_touches_region() {
        let mut target = solid(4, 4, [0, 0, 0, 255]);
        let overlay = solid(4, 4, [255, 255, 255, 255]);
        composite_over(&mut target, &overlay, PixelRect { x0: 0, y0: 0, x1: 2, y1: 2 });
        assert_eq!(target.get_pixel(1, 1)[0], 255);
        assert_eq!(target.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn outline_draws_border_only() {
        let mut target = solid(10, 10, [0, 0, 0, 0]);
        outline(&mut target, PixelRect { x0: 2, y0: 2, x1: 8, y1: 8 }, Rgba([1, 1, 1, 255]));
        assert_eq!(target.get_pixel(2, 5)[3], 255);
        assert_eq!(target.get_pixel(7, 7)[3], 255);
        assert_eq!(target.get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn union_ignores_empty() {
        let a = PixelRect { x0: 1, y0: 1, x1: 3, y1: 3 };
        assert_eq!(a.union(PixelRect::default()), a);
        let b = PixelRect { x0: 2, y0: 0, x1: 5, y1: 2 };
        assert_eq!(a.union(b), PixelRect { x0: 1, y0: 0, x1: 5, y1: 3 });
    }
}
