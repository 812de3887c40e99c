//! Composite text or image watermarks onto photos, with interactive placement.
//!
//! A watermark is described by a [`WatermarkSettings`] value: a style (text
//! with font and color, or a raster image with a scale) plus a placement (one
//! of nine preset anchors or a custom point). Positions are always stored in
//! image-space, the pixel grid of the full-resolution source, so the same
//! settings render identically on a scaled-down preview and on the exported
//! file.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use photo_watermark::{ExportSettings, Exporter, Renderer, WatermarkSettings};
//!
//! let renderer = Arc::new(Renderer::with_system_fonts());
//! let settings = ExportSettings {
//!     watermark: Some(WatermarkSettings::default_template()),
//!     ..ExportSettings::default()
//! };
//! let results = Exporter::new(renderer).export_all(
//!     &[PathBuf::from("photo.jpg")],
//!     Path::new("out"),
//!     &settings,
//! );
//! assert!(results.iter().all(|r| r.success));
//! ```
//!
//! # Interactive preview
//!
//! [`PreviewSession`] fits the source into a viewport, forwards pointer events
//! to an [`InteractionController`] and keeps a composited frame up to date.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use photo_watermark::{Point, PointerButton, PreviewSession, Renderer, Size, WatermarkSettings};
//!
//! let renderer = Arc::new(Renderer::with_system_fonts());
//! let mut session = PreviewSession::open(
//!     renderer,
//!     Path::new("photo.jpg"),
//!     WatermarkSettings::default_template(),
//!     Size::new(800, 600),
//! )
//! .unwrap();
//! session.on_settings_changed(|s| println!("now at {:?}", s.placement.position));
//! session.pointer_down(Point::new(700.0, 500.0), PointerButton::Left);
//! session.pointer_move(Point::new(400.0, 300.0));
//! session.pointer_up(Point::new(400.0, 300.0), PointerButton::Left);
//! ```

#![deny(missing_docs)]

pub mod blending;
pub mod config;
pub mod error;
pub mod export;
pub mod font;
pub mod geometry;
pub mod interaction;
pub mod preview;
pub mod render;
pub mod settings;
pub mod store;

pub use config::{default_config_dir, AppConfig};
pub use error::{Error, Result};
pub use export::{
    collect_images, is_supported_image, is_supported_watermark_image, output_file_name,
    save_image, ExportResult, ExportSettings, Exporter, OutputFormat,
};
pub use font::{FontBook, FontHandle, FontResolver};
pub use geometry::{Point, Rect, ScaleContext, Size};
pub use interaction::{
    BoundsSource, Cursor, DragState, InteractionController, PointerButton, RenderRequest,
};
pub use preview::PreviewSession;
pub use render::{DetailLevel, Overlay, Renderer};
pub use settings::{
    FontSpec, ImageStyle, Placement, PresetAnchor, Rgba, TextStyle, WatermarkKind,
    WatermarkSettings, WatermarkStyle,
};
pub use store::{TemplateStore, TemplateSummary};
