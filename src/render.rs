//! Watermark renderer.
//!
//! One function serves both the on-screen preview and the exported file:
//! [`Renderer::render`] is parameterized only by the scale factor (and a
//! [`DetailLevel`] that adds the interactive bounding box). Export passes the
//! full-resolution source with `scale = 1.0`; the preview passes its scaled-down
//! base with the preview scale factor. Placement positions are image-space and
//! multiplied by the scale here, so both outputs agree up to resampling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::blending::{self, PixelRect};
use crate::font::{FontBook, FontResolver};
use crate::geometry::{self, Rect, Size};
use crate::settings::{Rgba as Color, WatermarkKind, WatermarkSettings, WatermarkStyle};

/// Color of the hit-test box drawn at [`DetailLevel::Interactive`].
const BOUNDS_OUTLINE: Rgba<u8> = Rgba([0, 120, 215, 200]);

/// Decoded watermark rasters kept at once.
const MAX_CACHED_IMAGES: usize = 8;

/// How much to draw on top of the watermark itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// Watermark only. Used for export and for the settled preview.
    #[default]
    Final,
    /// Watermark plus an outline of its hit-test bounds, used while dragging.
    Interactive,
}

/// A transparent layer the size of the target with the watermark drawn in.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// The layer pixels.
    pub layer: RgbaImage,
    /// Pixels that may be non-transparent.
    pub region: PixelRect,
    /// Hit-test bounds in the layer's coordinate space.
    pub bounds: Rect,
}

#[derive(Clone, PartialEq)]
struct SpriteKey {
    style: WatermarkStyle,
    scale_bits: u32,
    /// Modification time of the watermark image file, if any.
    source_stamp: Option<SystemTime>,
}

/// Watermark content, opacity applied, not yet rotated.
struct Sprite {
    pixels: RgbaImage,
    /// Logical content size, centered in `pixels`. The raster may be larger
    /// to hold glyph overhang.
    content: (f32, f32),
}

/// A decoded watermark raster and the file state it was read from.
struct CachedImage {
    modified: SystemTime,
    last_used: u64,
    image: Option<Arc<RgbaImage>>,
}

/// Draws watermarks. Cheap to share: wrap in an `Arc` and reuse for every
/// preview frame and every exported file.
pub struct Renderer {
    fonts: Box<dyn FontResolver>,
    images: Mutex<ImageCache>,
    last_sprite: Mutex<Option<(SpriteKey, Option<Arc<Sprite>>)>>,
}

#[derive(Default)]
struct ImageCache {
    entries: HashMap<PathBuf, CachedImage>,
    tick: u64,
}

impl Renderer {
    /// Create a renderer resolving fonts through `fonts`.
    #[must_use]
    pub fn new(fonts: impl FontResolver + 'static) -> Self {
        Self {
            fonts: Box::new(fonts),
            images: Mutex::new(ImageCache::default()),
            last_sprite: Mutex::new(None),
        }
    }

    /// A renderer using the platform font directories.
    #[must_use]
    pub fn with_system_fonts() -> Self {
        Self::new(FontBook::system())
    }

    /// Render `settings` onto a copy of `source`.
    ///
    /// `source` is the surface being drawn on: the full image for export
    /// (`scale = 1.0`) or the scaled preview base (`scale` = preview factor).
    /// Never fails; missing fonts or watermark images degrade to a fallback
    /// font or to drawing nothing.
    #[must_use]
    pub fn render(
        &self,
        source: &RgbaImage,
        settings: &WatermarkSettings,
        scale: f32,
        detail: DetailLevel,
    ) -> RgbaImage {
        let mut output = source.clone();
        let overlay = self.draw_overlay(Size::of(source), settings, scale, detail);
        blending::composite_over(&mut output, &overlay.layer, overlay.region);
        output
    }

    /// Draw the watermark into a fresh transparent layer of `size`.
    #[must_use]
    pub fn draw_overlay(
        &self,
        size: Size,
        settings: &WatermarkSettings,
        scale: f32,
        detail: DetailLevel,
    ) -> Overlay {
        let mut layer = RgbaImage::new(size.width, size.height);
        let center = settings.placement.position * scale;
        let sprite = self.sprite(&settings.style, scale);

        let (content_w, content_h) = sprite.as_deref().map_or((0.0, 0.0), |s| s.content);
        let bounds = geometry::bounds_around(center, content_w, content_h);

        let mut region = match &sprite {
            Some(sprite) => blending::stamp(
                &mut layer,
                &sprite.pixels,
                center,
                f32::from(settings.style.rotation_degrees),
            ),
            None => PixelRect::default(),
        };

        if detail == DetailLevel::Interactive {
            let rect = PixelRect::clipped(
                bounds.left,
                bounds.top,
                bounds.right,
                bounds.bottom,
                size.width,
                size.height,
            );
            region = region.union(blending::outline(&mut layer, rect, BOUNDS_OUTLINE));
        }

        tracing::trace!(?center, scale, ?detail, ?region, "watermark overlay drawn");
        Overlay {
            layer,
            region,
            bounds,
        }
    }

    /// Axis-aligned hit-test rectangle of the watermark at `scale`, in the
    /// scaled coordinate space. Rotation is ignored.
    #[must_use]
    pub fn compute_bounds(&self, settings: &WatermarkSettings, scale: f32) -> Rect {
        let (w, h) = self.measure(&settings.style, scale);
        geometry::bounds_around(settings.placement.position * scale, w, h)
    }

    /// Unrotated content size at `scale`. Zero when nothing would be drawn.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn measure(&self, style: &WatermarkStyle, scale: f32) -> (f32, f32) {
        match style.kind {
            WatermarkKind::Text => {
                if style.text.content.is_empty() {
                    return (0.0, 0.0);
                }
                match self.fonts.resolve(&style.text.font).font() {
                    Some(font) => {
                        text_extent(font, &style.text.content, text_px(style.text.font.size_pt, scale))
                    }
                    None => (0.0, 0.0),
                }
            }
            WatermarkKind::Image => {
                let Some(img) = style
                    .image
                    .source_path
                    .as_deref()
                    .and_then(|p| self.watermark_image(p))
                else {
                    return (0.0, 0.0);
                };
                let factor = image_factor(style.image.scale_percent, scale);
                (img.width() as f32 * factor, img.height() as f32 * factor)
            }
        }
    }

    /// The watermark content at `scale`, opacity applied, not yet rotated.
    fn sprite(&self, style: &WatermarkStyle, scale: f32) -> Option<Arc<Sprite>> {
        let source_stamp = match style.kind {
            WatermarkKind::Text => None,
            WatermarkKind::Image => style.image.source_path.as_deref().and_then(modified_time),
        };
        let key = SpriteKey {
            style: style.clone(),
            scale_bits: scale.to_bits(),
            source_stamp,
        };
        if let Some((cached_key, sprite)) = self.last_sprite.lock().as_ref() {
            if *cached_key == key {
                return sprite.clone();
            }
        }
        let sprite = match style.kind {
            WatermarkKind::Text => self.text_sprite(style, scale),
            WatermarkKind::Image => self.image_sprite(style, scale),
        }
        .map(Arc::new);
        *self.last_sprite.lock() = Some((key, sprite.clone()));
        sprite
    }

    fn text_sprite(&self, style: &WatermarkStyle, scale: f32) -> Option<Sprite> {
        let text = &style.text;
        if text.content.is_empty() {
            return None;
        }
        let handle = self.fonts.resolve(&text.font);
        if handle.is_fallback() {
            tracing::debug!(family = %text.font.family, "drawing with fallback font");
        }
        let font = handle.font()?;
        let color = Color {
            a: blending::opacity_to_alpha(style.opacity_percent),
            ..text.color
        };
        rasterize_text(font, &text.content, text_px(text.font.size_pt, scale), color)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn image_sprite(&self, style: &WatermarkStyle, scale: f32) -> Option<Sprite> {
        let path = style.image.source_path.as_deref()?;
        let source = self.watermark_image(path)?;
        let factor = image_factor(style.image.scale_percent, scale);
        let w = ((source.width() as f32 * factor).round() as u32).max(1);
        let h = ((source.height() as f32 * factor).round() as u32).max(1);

        let mut sprite = if (w, h) == source.dimensions() {
            source.as_ref().clone()
        } else {
            imageops::resize(source.as_ref(), w, h, FilterType::Lanczos3)
        };
        blending::apply_opacity(&mut sprite, style.opacity_percent);
        Some(Sprite {
            pixels: sprite,
            content: (w as f32, h as f32),
        })
    }

    /// Load a watermark raster. Results are cached per path and reused while
    /// the file's modification time is unchanged; a missing file is never
    /// cached.
    fn watermark_image(&self, path: &Path) -> Option<Arc<RgbaImage>> {
        let Some(modified) = modified_time(path) else {
            if self.images.lock().entries.remove(path).is_some() {
                tracing::warn!("watermark image {} disappeared", path.display());
            }
            return None;
        };

        {
            let mut cache = self.images.lock();
            cache.tick += 1;
            let tick = cache.tick;
            if let Some(entry) = cache.entries.get_mut(path) {
                if entry.modified == modified {
                    entry.last_used = tick;
                    return entry.image.clone();
                }
            }
        }

        let image = match image::open(path) {
            Ok(img) => Some(Arc::new(img.to_rgba8())),
            Err(e) => {
                tracing::warn!("watermark image {} unavailable: {e}", path.display());
                None
            }
        };

        let mut cache = self.images.lock();
        if cache.entries.len() >= MAX_CACHED_IMAGES && !cache.entries.contains_key(path) {
            let oldest = cache
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(p, _)| p.clone());
            if let Some(oldest) = oldest {
                cache.entries.remove(&oldest);
            }
        }
        let last_used = cache.tick;
        cache.entries.insert(
            path.to_path_buf(),
            CachedImage {
                modified,
                last_used,
                image: image.clone(),
            },
        );
        image
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("cached_images", &self.images.lock().entries.len())
            .finish_non_exhaustive()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[allow(clippy::cast_precision_loss)]
fn text_px(size_pt: u32, scale: f32) -> f32 {
    (size_pt as f32 * scale).max(1.0)
}

#[allow(clippy::cast_precision_loss)]
fn image_factor(scale_percent: u32, scale: f32) -> f32 {
    scale_percent as f32 / 100.0 * scale
}

/// Advance width (with kerning) and line height of `text` at `px`.
fn text_extent(font: &FontArc, text: &str, px: f32) -> (f32, f32) {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut width = 0.0_f32;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            width += scaled.kern(p, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    (width.max(0.0), scaled.height())
}

/// Draw `text` into a transparent sprite. The logical box is advance width by
/// line height with the baseline at the ascent; the raster grows evenly on
/// each side when glyph ink reaches outside that box, so the box stays
/// centered. Glyph coverage multiplies `color.a`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
fn rasterize_text(font: &FontArc, text: &str, px: f32, color: Color) -> Option<Sprite> {
    let (width, height) = text_extent(font, text, px);
    let w = width.ceil() as u32;
    let h = height.ceil() as u32;
    if w == 0 || h == 0 {
        return None;
    }

    let scale = PxScale::from(px);
    let scaled = font.as_scaled(scale);
    let baseline = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor = 0.0_f32;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            cursor += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, point(cursor, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            glyphs.push(outlined);
        }
        cursor += scaled.h_advance(id);
        prev = Some(id);
    }

    // overhang past the logical box on the worse side of each axis
    let (mut pad_x, mut pad_y) = (0.0_f32, 0.0_f32);
    for outlined in &glyphs {
        let b = outlined.px_bounds();
        pad_x = pad_x.max(-b.min.x).max(b.max.x - w as f32);
        pad_y = pad_y.max(-b.min.y).max(b.max.y - h as f32);
    }
    let (pad_x, pad_y) = (pad_x.ceil() as u32, pad_y.ceil() as u32);
    let (sw, sh) = (w + 2 * pad_x, h + 2 * pad_y);
    let mut sprite = RgbaImage::new(sw, sh);

    for outlined in &glyphs {
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = gx as i32 + bounds.min.x as i32 + pad_x as i32;
            let y = gy as i32 + bounds.min.y as i32 + pad_y as i32;
            if x < 0 || y < 0 || x >= sw as i32 || y >= sh as i32 {
                return;
            }
            let alpha = (coverage.clamp(0.0, 1.0) * f32::from(color.a)).round() as u8;
            let dst = sprite.get_pixel_mut(x as u32, y as u32);
            // same color everywhere, so overlapping glyphs keep the stronger coverage
            if alpha > dst[3] {
                *dst = Rgba([color.r, color.g, color.b, alpha]);
            }
        });
    }
    Some(Sprite {
        pixels: sprite,
        content: (width, height),
    })
}
