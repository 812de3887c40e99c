//! Batch export: load, watermark, encode, write.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};
use crate::geometry::Size;
use crate::render::{DetailLevel, Renderer};
use crate::settings::WatermarkSettings;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 85;

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Lossy, no alpha channel.
    #[default]
    Jpeg,
    /// Lossless, keeps alpha.
    Png,
}

impl OutputFormat {
    /// File extension including the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
        }
    }
}

/// Options for one export batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Encoded format.
    pub format: OutputFormat,
    /// JPEG quality 1-100; ignored for PNG.
    pub quality: u8,
    /// Prepended to the input stem.
    pub name_prefix: String,
    /// Appended to the input stem.
    pub name_suffix: String,
    /// Watermark to draw; `None` re-encodes the input unchanged.
    pub watermark: Option<WatermarkSettings>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: DEFAULT_QUALITY,
            name_prefix: String::new(),
            name_suffix: String::new(),
            watermark: None,
        }
    }
}

/// Outcome of exporting a single file.
#[derive(Debug)]
pub struct ExportResult {
    /// Input path.
    pub path: PathBuf,
    /// Written file, on success.
    pub output: Option<PathBuf>,
    /// Whether the file was written.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

impl ExportResult {
    fn failed(path: &Path, message: String) -> Self {
        tracing::warn!("{}: {message}", path.display());
        Self {
            path: path.to_path_buf(),
            output: None,
            success: false,
            message,
        }
    }
}

/// Renders and writes watermarked copies of source images.
///
/// Create once and reuse for every batch; the renderer's caches are shared
/// across files and worker threads.
#[derive(Debug, Clone)]
pub struct Exporter {
    renderer: Arc<Renderer>,
}

impl Exporter {
    /// Create an exporter drawing with `renderer`.
    #[must_use]
    pub fn new(renderer: Arc<Renderer>) -> Self {
        Self { renderer }
    }

    /// Export a single file into `output_dir`, which must already exist.
    #[must_use]
    pub fn export_file(&self, input: &Path, output_dir: &Path, settings: &ExportSettings) -> ExportResult {
        if !is_supported_image(input) {
            let ext = input
                .extension()
                .map_or_else(|| "no extension".to_string(), |e| e.to_string_lossy().into_owned());
            return ExportResult::failed(input, Error::UnsupportedFormat(ext).to_string());
        }
        let Some(name) = output_file_name(input, settings) else {
            return ExportResult::failed(input, "Input has no file name".to_string());
        };
        let output = output_dir.join(name);

        let source = match image::open(input) {
            Ok(img) => img.to_rgba8(),
            Err(e) => return ExportResult::failed(input, format!("Failed to load: {e}")),
        };

        let rendered = match &settings.watermark {
            Some(watermark) => {
                let resolved = watermark.resolved_for(Size::of(&source));
                self.renderer
                    .render(&source, &resolved, 1.0, DetailLevel::Final)
            }
            None => source,
        };

        match save_image(&rendered, &output, settings.format, settings.quality) {
            Ok(()) => {
                tracing::debug!("{} -> {}", input.display(), output.display());
                ExportResult {
                    path: input.to_path_buf(),
                    output: Some(output),
                    success: true,
                    message: "Exported".to_string(),
                }
            }
            Err(e) => ExportResult::failed(input, format!("Failed to save: {e}")),
        }
    }

    /// Export every path in `inputs` into `output_dir`.
    ///
    /// The output directory is created if needed. Each file succeeds or fails
    /// on its own; results are in input order. Uses parallel iteration when the
    /// `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn export_all(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        settings: &ExportSettings,
    ) -> Vec<ExportResult> {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            let message = format!("Failed to create output directory: {e}");
            return inputs
                .iter()
                .map(|input| ExportResult::failed(input, message.clone()))
                .collect();
        }
        tracing::info!(
            "exporting {} file(s) to {}",
            inputs.len(),
            output_dir.display()
        );

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            inputs
                .par_iter()
                .map(|input| self.export_file(input, output_dir, settings))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            inputs
                .iter()
                .map(|input| self.export_file(input, output_dir, settings))
                .collect()
        }
    }
}

/// `prefix + stem + suffix + extension` for `input`, or `None` when the path
/// has no file stem.
#[must_use]
pub fn output_file_name(input: &Path, settings: &ExportSettings) -> Option<String> {
    let stem = input.file_stem()?.to_string_lossy();
    Some(format!(
        "{}{stem}{}{}",
        settings.name_prefix,
        settings.name_suffix,
        settings.format.extension()
    ))
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allowed.contains(&ext.to_lowercase().as_str()))
}

/// Check if a file has a supported source image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, &["jpg", "jpeg", "png", "bmp", "tiff", "tif"])
}

/// Check if a file can be used as an image watermark.
#[must_use]
pub fn is_supported_watermark_image(path: &Path) -> bool {
    has_extension(path, &["png", "jpg", "jpeg", "bmp", "gif"])
}

/// Supported images directly inside `dir` (not recursive), sorted by path.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Encode `img` and write it to `path`.
///
/// JPEG drops the alpha channel and uses `quality` (clamped to 1-100); PNG
/// keeps alpha. The file is only written once encoding has succeeded.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path, format: OutputFormat, quality: u8) -> Result<()> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
    }
    std::fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::font::FontBook;
    use crate::geometry::Point;
    use crate::settings::{Placement, WatermarkKind};

    fn exporter() -> Exporter {
        Exporter::new(Arc::new(Renderer::new(FontBook::empty())))
    }

    fn write_png(path: &Path, w: u32, h: u32, color: [u8; 4]) {
        RgbaImage::from_pixel(w, h, Rgba(color)).save(path).unwrap();
    }

    #[test]
    fn output_name_uses_prefix_stem_suffix() {
        let settings = ExportSettings {
            name_prefix: "wm_".to_string(),
            name_suffix: "_final".to_string(),
            ..ExportSettings::default()
        };
        assert_eq!(
            output_file_name(Path::new("/photos/beach.PNG"), &settings).as_deref(),
            Some("wm_beach_final.jpg")
        );
        let png = ExportSettings {
            format: OutputFormat::Png,
            ..ExportSettings::default()
        };
        assert_eq!(
            output_file_name(Path::new("a.b.jpeg"), &png).as_deref(),
            Some("a.b.png")
        );
    }

    #[test]
    fn default_settings_match_dialog_defaults() {
        let settings = ExportSettings::default();
        assert_eq!(settings.format, OutputFormat::Jpeg);
        assert_eq!(settings.quality, 85);
        assert!(settings.watermark.is_none());
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("a.jpg")));
        assert!(is_supported_image(Path::new("a.JPEG")));
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("a.bmp")));
        assert!(is_supported_image(Path::new("a.Tif")));
        assert!(is_supported_image(Path::new("a.tiff")));
        assert!(!is_supported_image(Path::new("a.gif")));
        assert!(!is_supported_image(Path::new("a.webp")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn watermark_images_allow_gif() {
        assert!(is_supported_watermark_image(Path::new("logo.GIF")));
        assert!(is_supported_watermark_image(Path::new("logo.png")));
        assert!(!is_supported_watermark_image(Path::new("logo.tiff")));
    }

    #[test]
    fn jpeg_drops_alpha_png_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(8, 8, Rgba([10, 200, 30, 128]));

        let jpg = dir.path().join("out.jpg");
        save_image(&img, &jpg, OutputFormat::Jpeg, 95).unwrap();
        let decoded = image::open(&jpg).unwrap();
        assert!(!decoded.color().has_alpha());

        let png = dir.path().join("out.png");
        save_image(&img, &png, OutputFormat::Png, 0).unwrap();
        let decoded = image::open(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3), &Rgba([10, 200, 30, 128]));
    }

    #[test]
    fn export_creates_directory_and_draws_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        write_png(&input, 200, 100, [0, 0, 0, 255]);
        let mark = dir.path().join("mark.png");
        write_png(&mark, 10, 10, [255, 255, 255, 255]);

        let mut watermark =
            WatermarkSettings::default_template().with_placement(Placement::custom(Point::new(100.0, 50.0)));
        watermark.style.kind = WatermarkKind::Image;
        watermark.style.image.source_path = Some(mark);
        watermark.style.opacity_percent = 100;

        let settings = ExportSettings {
            format: OutputFormat::Png,
            watermark: Some(watermark),
            ..ExportSettings::default()
        };
        let out_dir = dir.path().join("nested/out");
        let results = exporter().export_all(&[input], &out_dir, &settings);
        assert_eq!(results.len(), 1);
        assert!(results[0].success, "{}", results[0].message);

        let written = image::open(out_dir.join("photo.png")).unwrap().to_rgba8();
        assert_eq!(written.get_pixel(100, 50), &Rgba([255, 255, 255, 255]));
        assert_eq!(written.get_pixel(5, 5), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn unsupported_and_missing_inputs_fail_alone() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_png(&good, 4, 4, [1, 2, 3, 255]);
        let inputs = vec![
            dir.path().join("notes.txt"),
            good,
            dir.path().join("missing.png"),
        ];
        let results = exporter().export_all(&inputs, &dir.path().join("out"), &ExportSettings::default());

        assert_eq!(results.len(), 3);
        assert!(!results[0].success);
        assert_eq!(results[0].message, "unsupported image format: txt");
        assert!(results[1].success);
        assert_eq!(results[1].path, inputs[1]);
        assert!(!results[2].success);
        assert!(results[2].output.is_none());
    }

    #[test]
    fn unusable_output_directory_fails_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let input = dir.path().join("a.png");
        write_png(&input, 4, 4, [0, 0, 0, 255]);

        let results = exporter().export_all(
            &[input.clone(), input],
            &blocker.join("out"),
            &ExportSettings::default(),
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
    }

    #[test]
    fn collect_images_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 2, 2, [0, 0, 0, 255]);
        write_png(&dir.path().join("a.png"), 2, 2, [0, 0, 0, 255]);
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write_png(&dir.path().join("sub/d.png"), 2, 2, [0, 0, 0, 255]);

        let found = collect_images(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }
}
