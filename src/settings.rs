//! Watermark settings: style, placement, preset anchors and colors.
//!
//! A [`WatermarkSettings`] value is replaced wholesale on every change. Its
//! persisted form is a flat key/value map (see [`FlatSettings`]) so that
//! templates stay readable and forward compatible.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{self, Point, Size};

/// Maximum number of characters kept in a text watermark.
pub const MAX_TEXT_CHARS: usize = 100;

/// Accepted font size range in points.
pub const FONT_SIZE_RANGE: (u32, u32) = (1, 200);

/// Accepted image watermark scale range in percent.
pub const IMAGE_SCALE_RANGE: (u32, u32) = (1, 200);

/// An 8-bit straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Rgba {
    /// Create an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColor`] for a missing `#`, a bad length or a
    /// non-hex digit.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor(hex.to_string());
        let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.is_ascii() {
            return Err(invalid());
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                let r = byte(&digits[0..1])?;
                let g = byte(&digits[1..2])?;
                let b = byte(&digits[2..3])?;
                Ok(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => Ok(Self::rgb(
                byte(&digits[0..2])?,
                byte(&digits[2..4])?,
                byte(&digits[4..6])?,
            )),
            8 => Ok(Self {
                r: byte(&digits[0..2])?,
                g: byte(&digits[2..4])?,
                b: byte(&digits[4..6])?,
                a: byte(&digits[6..8])?,
            }),
            _ => Err(invalid()),
        }
    }

    /// Format as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    #[must_use]
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

/// One of the nine preset grid positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetAnchor {
    /// Top-left corner.
    TopLeft,
    /// Middle of the top edge.
    TopCenter,
    /// Top-right corner.
    TopRight,
    /// Middle of the left edge.
    CenterLeft,
    /// Image center.
    Center,
    /// Middle of the right edge.
    CenterRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Middle of the bottom edge.
    BottomCenter,
    /// Bottom-right corner.
    BottomRight,
}

impl PresetAnchor {
    /// All anchors in grid order (row by row).
    pub const ALL: [Self; 9] = [
        Self::TopLeft,
        Self::TopCenter,
        Self::TopRight,
        Self::CenterLeft,
        Self::Center,
        Self::CenterRight,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
    ];

    /// Canonical snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::TopCenter => "top_center",
            Self::TopRight => "top_right",
            Self::CenterLeft => "center_left",
            Self::Center => "center",
            Self::CenterRight => "center_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomCenter => "bottom_center",
            Self::BottomRight => "bottom_right",
        }
    }

    /// Parse an anchor name, falling back to [`PresetAnchor::Center`] for
    /// anything unrecognized.
    ///
    /// Accepts snake_case, kebab-case and space separated names in any case,
    /// plus the legacy names written by older versions of the settings panel.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "top_left" | "左上角" => Self::TopLeft,
            "top_center" | "top" => Self::TopCenter,
            "top_right" | "右上角" => Self::TopRight,
            "center_left" | "left" => Self::CenterLeft,
            "center_right" | "right" => Self::CenterRight,
            "bottom_left" | "左下角" => Self::BottomLeft,
            "bottom_center" | "bottom" => Self::BottomCenter,
            "bottom_right" | "右下角" => Self::BottomRight,
            _ => Self::Center,
        }
    }
}

impl fmt::Display for PresetAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetAnchor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Which content a watermark draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkKind {
    /// Draw [`TextStyle`] content.
    Text,
    /// Draw [`ImageStyle`] content.
    Image,
}

/// Font request for a text watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Family name, matched against font file stems.
    pub family: String,
    /// Size in points; one point is one image pixel at scale 1.0.
    pub size_pt: u32,
    /// Request a bold face.
    pub bold: bool,
    /// Request an italic face.
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Arial".to_string(),
            size_pt: 36,
            bold: false,
            italic: false,
        }
    }
}

/// Text watermark content.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// The string to draw.
    pub content: String,
    /// Requested font.
    pub font: FontSpec,
    /// Fill color; its alpha is replaced by the watermark opacity when drawn.
    pub color: Rgba,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            content: "水印文字".to_string(),
            font: FontSpec::default(),
            color: Rgba::WHITE,
        }
    }
}

/// Image watermark content.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStyle {
    /// Path of the watermark raster; `None` draws nothing.
    pub source_path: Option<PathBuf>,
    /// Size relative to the raster's native size, in percent.
    pub scale_percent: u32,
}

impl Default for ImageStyle {
    fn default() -> Self {
        Self {
            source_path: None,
            scale_percent: 100,
        }
    }
}

/// Visual appearance of the watermark.
///
/// Both content parts are always kept; `kind` selects the one that is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    /// Content selector.
    pub kind: WatermarkKind,
    /// Text content and font.
    pub text: TextStyle,
    /// Image content.
    pub image: ImageStyle,
    /// Opacity in percent, `0..=100`.
    pub opacity_percent: u8,
    /// Clockwise rotation in degrees, `0..=359`.
    pub rotation_degrees: u16,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: TextStyle::default(),
            image: ImageStyle::default(),
            opacity_percent: 80,
            rotation_degrees: 0,
        }
    }
}

impl WatermarkStyle {
    /// Clamp every field into its accepted range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.opacity_percent = self.opacity_percent.min(100);
        self.rotation_degrees %= 360;
        self.text.font.size_pt = self
            .text
            .font
            .size_pt
            .clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
        self.image.scale_percent = self
            .image
            .scale_percent
            .clamp(IMAGE_SCALE_RANGE.0, IMAGE_SCALE_RANGE.1);
        if self.text.content.chars().count() > MAX_TEXT_CHARS {
            self.text.content = self.text.content.chars().take(MAX_TEXT_CHARS).collect();
        }
        self
    }
}

/// Where the watermark center sits, in image-space pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Last preset chosen.
    pub anchor: PresetAnchor,
    /// Watermark center in image-space.
    pub position: Point,
    /// `true` once the user dragged the watermark; the position is then frozen.
    pub is_custom: bool,
}

impl Placement {
    /// A placement locked to `anchor`; call [`Placement::resolved`] before use.
    #[must_use]
    pub fn anchored(anchor: PresetAnchor) -> Self {
        Self {
            anchor,
            position: Point::default(),
            is_custom: false,
        }
    }

    /// A custom placement at `position`.
    #[must_use]
    pub fn custom(position: Point) -> Self {
        Self {
            anchor: PresetAnchor::Center,
            position,
            is_custom: true,
        }
    }

    /// Recompute the position from the anchor for `image_size`, unless custom.
    #[must_use]
    pub fn resolved(self, image_size: Size) -> Self {
        if self.is_custom {
            return self;
        }
        Self {
            position: geometry::resolve_anchor(self.anchor, image_size, 1.0),
            ..self
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::anchored(PresetAnchor::BottomRight)
    }
}

/// A complete watermark description: style plus placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "FlatSettings", from = "FlatSettings")]
pub struct WatermarkSettings {
    /// Appearance.
    pub style: WatermarkStyle,
    /// Position.
    pub placement: Placement,
}

impl WatermarkSettings {
    /// The built-in default template.
    #[must_use]
    pub fn default_template() -> Self {
        Self::default()
    }

    /// Replace the placement, keeping the style.
    #[must_use]
    pub fn with_placement(&self, placement: Placement) -> Self {
        Self {
            style: self.style.clone(),
            placement,
        }
    }

    /// Re-resolve a non-custom placement against `image_size`.
    #[must_use]
    pub fn resolved_for(&self, image_size: Size) -> Self {
        self.with_placement(self.placement.resolved(image_size))
    }
}

/// Persisted flat-map representation of [`WatermarkSettings`].
///
/// Missing keys take the default template's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatSettings {
    /// `"text"` or `"image"`.
    pub watermark_type: String,
    /// Text content.
    pub text: String,
    /// Font family.
    pub font_family: String,
    /// Font size in points.
    pub font_size: u32,
    /// Bold flag.
    pub font_bold: bool,
    /// Italic flag.
    pub font_italic: bool,
    /// Hex color.
    pub color: String,
    /// Opacity percent.
    pub opacity: u8,
    /// Anchor name.
    pub position: String,
    /// Custom placement flag.
    pub position_custom: bool,
    /// Custom x in image-space.
    pub custom_x: f32,
    /// Custom y in image-space.
    pub custom_y: f32,
    /// Rotation in degrees.
    pub rotation: u16,
    /// Watermark image path, empty for none.
    pub image_path: String,
    /// Image scale percent.
    pub image_size: u32,
}

impl Default for FlatSettings {
    fn default() -> Self {
        WatermarkSettings::default_template().into()
    }
}

impl From<WatermarkSettings> for FlatSettings {
    fn from(settings: WatermarkSettings) -> Self {
        let WatermarkSettings { style, placement } = settings;
        Self {
            watermark_type: match style.kind {
                WatermarkKind::Text => "text",
                WatermarkKind::Image => "image",
            }
            .to_string(),
            text: style.text.content,
            font_family: style.text.font.family,
            font_size: style.text.font.size_pt,
            font_bold: style.text.font.bold,
            font_italic: style.text.font.italic,
            color: style.text.color.to_hex(),
            opacity: style.opacity_percent,
            position: placement.anchor.as_str().to_string(),
            position_custom: placement.is_custom,
            custom_x: placement.position.x,
            custom_y: placement.position.y,
            rotation: style.rotation_degrees,
            image_path: style
                .image
                .source_path
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            image_size: style.image.scale_percent,
        }
    }
}

impl From<FlatSettings> for WatermarkSettings {
    fn from(flat: FlatSettings) -> Self {
        let kind = if flat.watermark_type.eq_ignore_ascii_case("image") {
            WatermarkKind::Image
        } else {
            WatermarkKind::Text
        };
        let color = Rgba::from_hex(&flat.color).unwrap_or_else(|e| {
            tracing::warn!("{e}, using white");
            Rgba::WHITE
        });
        let style = WatermarkStyle {
            kind,
            text: TextStyle {
                content: flat.text,
                font: FontSpec {
                    family: flat.font_family,
                    size_pt: flat.font_size,
                    bold: flat.font_bold,
                    italic: flat.font_italic,
                },
                color,
            },
            image: ImageStyle {
                source_path: (!flat.image_path.is_empty()).then(|| PathBuf::from(flat.image_path)),
                scale_percent: flat.image_size,
            },
            opacity_percent: flat.opacity,
            rotation_degrees: flat.rotation,
        }
        .normalized();

        Self {
            style,
            placement: Placement {
                anchor: PresetAnchor::from_name(&flat.position),
                position: Point::new(flat.custom_x, flat.custom_y),
                is_custom: flat.position_custom,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_forms() {
        assert_eq!(Rgba::from_hex("#FFF").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::from_hex("#ff0000").unwrap(), Rgba::rgb(255, 0, 0));
        assert_eq!(
            Rgba::from_hex("#11223344").unwrap(),
            Rgba {
                r: 0x11,
                g: 0x22,
                b: 0x33,
                a: 0x44
            }
        );
        assert_eq!(Rgba::from_hex("#ABC").unwrap(), Rgba::rgb(170, 187, 204));
    }

    #[test]
    fn hex_color_rejects_garbage() {
        assert!(Rgba::from_hex("FFFFFF").is_err());
        assert!(Rgba::from_hex("#FFFF").is_err());
        assert!(Rgba::from_hex("#GGGGGG").is_err());
        assert!(Rgba::from_hex("#水印").is_err());
    }

    #[test]
    fn hex_color_formats_alpha_only_when_needed() {
        assert_eq!(Rgba::WHITE.to_hex(), "#FFFFFF");
        let translucent = Rgba { a: 0x80, ..Rgba::BLACK };
        assert_eq!(translucent.to_hex(), "#00000080");
    }

    #[test]
    fn anchor_names_parse_with_center_fallback() {
        for anchor in PresetAnchor::ALL {
            assert_eq!(PresetAnchor::from_name(anchor.as_str()), anchor);
        }
        assert_eq!(PresetAnchor::from_name("Bottom-Right"), PresetAnchor::BottomRight);
        assert_eq!(PresetAnchor::from_name("右上角"), PresetAnchor::TopRight);
        assert_eq!(PresetAnchor::from_name("nowhere"), PresetAnchor::Center);
        assert_eq!("".parse::<PresetAnchor>().unwrap(), PresetAnchor::Center);
    }

    #[test]
    fn default_template_values() {
        let s = WatermarkSettings::default_template();
        assert_eq!(s.style.kind, WatermarkKind::Text);
        assert_eq!(s.style.text.content, "水印文字");
        assert_eq!(s.style.text.font.family, "Arial");
        assert_eq!(s.style.text.font.size_pt, 36);
        assert_eq!(s.style.text.color, Rgba::WHITE);
        assert_eq!(s.style.opacity_percent, 80);
        assert_eq!(s.style.rotation_degrees, 0);
        assert_eq!(s.placement.anchor, PresetAnchor::BottomRight);
        assert!(!s.placement.is_custom);
    }

    #[test]
    fn normalized_clamps_ranges() {
        let mut style = WatermarkStyle::default();
        style.opacity_percent = 250;
        style.rotation_degrees = 370;
        style.text.font.size_pt = 0;
        style.image.scale_percent = 999;
        style.text.content = "x".repeat(150);
        let style = style.normalized();
        assert_eq!(style.opacity_percent, 100);
        assert_eq!(style.rotation_degrees, 10);
        assert_eq!(style.text.font.size_pt, 1);
        assert_eq!(style.image.scale_percent, 200);
        assert_eq!(style.text.content.chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn flat_map_round_trip_is_lossless() {
        let mut settings = WatermarkSettings::default_template();
        settings.style.kind = WatermarkKind::Image;
        settings.style.image.source_path = Some(PathBuf::from("/tmp/logo.png"));
        settings.style.image.scale_percent = 40;
        settings.style.text.color = Rgba { a: 10, ..Rgba::rgb(1, 2, 3) };
        settings.style.rotation_degrees = 45;
        settings.placement = Placement::custom(Point::new(12.5, 99.0));

        let json = serde_json::to_string(&settings).unwrap();
        let back: WatermarkSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn flat_map_uses_original_keys_and_defaults() {
        let value = serde_json::to_value(WatermarkSettings::default_template()).unwrap();
        assert_eq!(value["watermark_type"], "text");
        assert_eq!(value["position"], "bottom_right");
        assert_eq!(value["color"], "#FFFFFF");
        assert_eq!(value["image_path"], "");

        let partial: WatermarkSettings =
            serde_json::from_str(r#"{"text": "hi", "position": "左上角", "color": "bogus"}"#)
                .unwrap();
        assert_eq!(partial.style.text.content, "hi");
        assert_eq!(partial.placement.anchor, PresetAnchor::TopLeft);
        assert_eq!(partial.style.text.color, Rgba::WHITE);
        assert_eq!(partial.style.opacity_percent, 80);
    }

    #[test]
    fn resolved_respects_custom_flag() {
        let size = Size::new(400, 300);
        let anchored = Placement::anchored(PresetAnchor::Center).resolved(size);
        assert_eq!(anchored.position, Point::new(200.0, 150.0));

        let custom = Placement::custom(Point::new(1.0, 2.0)).resolved(size);
        assert_eq!(custom.position, Point::new(1.0, 2.0));
    }
}
