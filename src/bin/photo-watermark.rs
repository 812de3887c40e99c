use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use photo_watermark::settings::{FONT_SIZE_RANGE, IMAGE_SCALE_RANGE};
use photo_watermark::{
    collect_images, default_config_dir, is_supported_watermark_image, AppConfig, ExportResult,
    ExportSettings, Exporter, OutputFormat, Placement, Point, PresetAnchor, Renderer, Rgba,
    TemplateStore, WatermarkKind, WatermarkSettings,
};

#[derive(Parser)]
#[command(
    name = "photo-watermark",
    about = "Add text or image watermarks to photos",
    version,
    after_help = "Positions (--x/--y) are in pixels of each source image. Preset anchors\n\
                  are re-resolved per image, custom positions are used as given."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Configuration directory (default: $PHOTO_WATERMARK_HOME or ~/.photo_watermark)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Watermark images and write them to a directory
    Export(ExportArgs),

    /// Manage saved templates
    #[command(subcommand)]
    Templates(TemplateCommand),
}

#[derive(Args)]
struct ExportArgs {
    /// Input image files or directories (directories are not searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Jpeg)]
    format: OutputFormat,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Prefix added to output file names
    #[arg(long, default_value = "")]
    prefix: String,

    /// Suffix added to output file names
    #[arg(long, default_value = "")]
    suffix: String,

    /// Start from a saved template
    #[arg(long, conflicts_with = "last")]
    template: Option<String>,

    /// Start from the last used settings
    #[arg(long)]
    last: bool,

    /// Re-encode without drawing a watermark
    #[arg(long)]
    no_watermark: bool,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// List saved templates, newest first
    List,

    /// Print a template as JSON
    Show {
        /// Template name
        name: String,
    },

    /// Save a template built from the default (or last used) settings
    Save {
        /// Template name
        name: String,

        /// Start from the last used settings instead of the default template
        #[arg(long)]
        from_last: bool,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Delete a template
    Delete {
        /// Template name
        name: String,
    },

    /// Rename a template
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
}

#[derive(Args, Default)]
#[allow(clippy::struct_excessive_bools)]
struct StyleArgs {
    /// Text watermark content
    #[arg(long, conflicts_with = "image")]
    text: Option<String>,

    /// Image watermark file
    #[arg(long)]
    image: Option<PathBuf>,

    /// Preset anchor: top_left, top_center, top_right, center_left, center,
    /// center_right, bottom_left, bottom_center, bottom_right
    #[arg(long, value_parser = parse_anchor, conflicts_with = "x")]
    anchor: Option<PresetAnchor>,

    /// Custom center x in image pixels
    #[arg(long, requires = "y", allow_negative_numbers = true)]
    x: Option<f32>,

    /// Custom center y in image pixels
    #[arg(long, requires = "x", allow_negative_numbers = true)]
    y: Option<f32>,

    /// Opacity in percent (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    opacity: Option<u8>,

    /// Clockwise rotation in degrees (0-359)
    #[arg(long, value_parser = clap::value_parser!(u16).range(0..360))]
    rotation: Option<u16>,

    /// Font family (file name without extension, e.g. DejaVuSans)
    #[arg(long)]
    font: Option<String>,

    /// Font size in points
    #[arg(long, value_parser = clap::value_parser!(u32).range(i64::from(FONT_SIZE_RANGE.0)..=i64::from(FONT_SIZE_RANGE.1)))]
    font_size: Option<u32>,

    /// Bold text
    #[arg(long)]
    bold: bool,

    /// Italic text
    #[arg(long)]
    italic: bool,

    /// Text color as #RGB, #RRGGBB or #RRGGBBAA
    #[arg(long, value_parser = parse_color)]
    color: Option<Rgba>,

    /// Image watermark scale in percent
    #[arg(long, value_parser = clap::value_parser!(u32).range(i64::from(IMAGE_SCALE_RANGE.0)..=i64::from(IMAGE_SCALE_RANGE.1)))]
    scale: Option<u32>,
}

impl StyleArgs {
    fn apply(&self, mut settings: WatermarkSettings) -> WatermarkSettings {
        let style = &mut settings.style;
        if let Some(text) = &self.text {
            style.kind = WatermarkKind::Text;
            style.text.content.clone_from(text);
        }
        if let Some(image) = &self.image {
            if !is_supported_watermark_image(image) {
                tracing::warn!("{} may not be a usable watermark image", image.display());
            }
            style.kind = WatermarkKind::Image;
            style.image.source_path = Some(image.clone());
        }
        if let Some(opacity) = self.opacity {
            style.opacity_percent = opacity;
        }
        if let Some(rotation) = self.rotation {
            style.rotation_degrees = rotation;
        }
        if let Some(font) = &self.font {
            style.text.font.family.clone_from(font);
        }
        if let Some(size) = self.font_size {
            style.text.font.size_pt = size;
        }
        if self.bold {
            style.text.font.bold = true;
        }
        if self.italic {
            style.text.font.italic = true;
        }
        if let Some(color) = self.color {
            style.text.color = color;
        }
        if let Some(scale) = self.scale {
            style.image.scale_percent = scale;
        }

        if let (Some(x), Some(y)) = (self.x, self.y) {
            settings.placement = Placement::custom(Point::new(x, y));
        } else if let Some(anchor) = self.anchor {
            settings.placement = Placement::anchored(anchor);
        }
        settings.style = settings.style.normalized();
        settings
    }
}

fn parse_anchor(s: &str) -> Result<PresetAnchor, String> {
    let key = s.trim().to_lowercase().replace(['-', ' '], "_");
    PresetAnchor::ALL
        .into_iter()
        .find(|a| a.as_str() == key)
        .ok_or_else(|| format!("unknown anchor {s:?}"))
}

fn parse_color(s: &str) -> Result<Rgba, String> {
    Rgba::from_hex(s).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let store = match TemplateStore::open(&config_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: Cannot open {}: {e}", config_dir.display());
            process::exit(1);
        }
    };

    let ok = match &cli.command {
        Command::Export(args) => run_export(args, &store, cli.quiet),
        Command::Templates(cmd) => run_templates(cmd, &store),
    };
    if !ok {
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run_export(args: &ExportArgs, store: &TemplateStore, quiet: bool) -> bool {
    let base = if let Some(name) = &args.template {
        match store.load(name) {
            Some(settings) => settings,
            None => {
                eprintln!("Error: No template named {name:?}");
                return false;
            }
        }
    } else if args.last {
        store.load_last_or_default()
    } else {
        WatermarkSettings::default_template()
    };
    let watermark = (!args.no_watermark).then(|| args.style.apply(base));

    let inputs = match expand_inputs(&args.inputs) {
        Ok(inputs) if !inputs.is_empty() => inputs,
        Ok(_) => {
            eprintln!("Error: No supported images found");
            return false;
        }
        Err(message) => {
            eprintln!("Error: {message}");
            return false;
        }
    };

    let config = AppConfig::load_or_default(store.root());
    let renderer = Arc::new(Renderer::new(config.font_book()));
    let settings = ExportSettings {
        format: args.format,
        quality: args.quality,
        name_prefix: args.prefix.clone(),
        name_suffix: args.suffix.clone(),
        watermark,
    };
    let results = Exporter::new(renderer).export_all(&inputs, &args.output, &settings);

    let mut success_count = 0u32;
    let mut fail_count = 0u32;
    for r in &results {
        print_result(r, quiet);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Exported: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if success_count > 0 {
        if let Some(watermark) = &settings.watermark {
            store.save_last_settings(watermark);
        }
    }
    fail_count == 0
}

/// Files are kept as given; directories contribute their supported images.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = collect_images(input)
                .map_err(|e| format!("Failed to read directory {}: {e}", input.display()))?;
            out.extend(found);
        } else {
            out.push(input.clone());
        }
    }
    Ok(out)
}

fn print_result(result: &ExportResult, quiet: bool) {
    if quiet && result.success {
        return;
    }
    let filename = display_name(&result.path);
    match (&result.output, result.success) {
        (Some(output), true) => eprintln!("[OK] {filename} -> {}", output.display()),
        _ => eprintln!("[FAIL] {filename}: {}", result.message),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn run_templates(cmd: &TemplateCommand, store: &TemplateStore) -> bool {
    match cmd {
        TemplateCommand::List => {
            let templates = store.list();
            if templates.is_empty() {
                eprintln!("No templates saved in {}", store.root().display());
            }
            for t in templates {
                println!(
                    "{}  {}",
                    t.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
                    t.name
                );
            }
            true
        }
        TemplateCommand::Show { name } => {
            let Some(settings) = store.load(name) else {
                eprintln!("Error: No template named {name:?}");
                return false;
            };
            match serde_json::to_string_pretty(&settings) {
                Ok(json) => {
                    println!("{json}");
                    true
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    false
                }
            }
        }
        TemplateCommand::Save {
            name,
            from_last,
            style,
        } => {
            let base = if *from_last {
                store.load_last_or_default()
            } else {
                WatermarkSettings::default_template()
            };
            report(store.save(name, &style.apply(base)), &format!("Saved template {name:?}"))
        }
        TemplateCommand::Delete { name } => {
            report(store.delete(name), &format!("Deleted template {name:?}"))
        }
        TemplateCommand::Rename { old, new } => {
            report(store.rename(old, new), &format!("Renamed {old:?} to {new:?}"))
        }
    }
}

fn report(ok: bool, message: &str) -> bool {
    if ok {
        eprintln!("{message}");
    } else {
        eprintln!("Error: Template operation failed");
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn anchors_parse_in_several_spellings() {
        assert_eq!(parse_anchor("top-left"), Ok(PresetAnchor::TopLeft));
        assert_eq!(parse_anchor("Bottom Right"), Ok(PresetAnchor::BottomRight));
        assert_eq!(parse_anchor("center"), Ok(PresetAnchor::Center));
        assert!(parse_anchor("middle").is_err());
    }

    #[test]
    fn style_flags_override_template() {
        let cli = Cli::parse_from([
            "photo-watermark",
            "export",
            "a.jpg",
            "-o",
            "out",
            "--text",
            "hello",
            "--x",
            "10",
            "--y",
            "20",
            "--opacity",
            "40",
            "--color",
            "#00ff00",
        ]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        let settings = args.style.apply(WatermarkSettings::default_template());
        assert_eq!(settings.style.text.content, "hello");
        assert_eq!(settings.style.opacity_percent, 40);
        assert_eq!(settings.style.text.color, Rgba::rgb(0, 255, 0));
        assert!(settings.placement.is_custom);
        assert_eq!(settings.placement.position, Point::new(10.0, 20.0));
    }

    #[test]
    fn no_flags_keep_base_settings() {
        let base = WatermarkSettings::default_template();
        assert_eq!(StyleArgs::default().apply(base.clone()), base);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let parse = |flag: &str, value: &str| {
            Cli::try_parse_from(["photo-watermark", "export", "a.jpg", "-o", "out", flag, value])
        };
        assert!(parse("--opacity", "101").is_err());
        assert!(parse("--rotation", "360").is_err());
        assert!(parse("--font-size", "0").is_err());
        assert!(parse("--quality", "0").is_err());
        assert!(parse("--anchor", "nowhere").is_err());
    }
}
