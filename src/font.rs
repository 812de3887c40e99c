//! Font resolution for text watermarks.
//!
//! Rendering asks a [`FontResolver`] for a face and gets back either the
//! requested family, a fallback, or nothing at all. Nothing here fails: a
//! missing font degrades to the fallback list and, if that is empty too, to
//! [`FontHandle::Missing`], which draws no text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use parking_lot::Mutex;

use crate::settings::FontSpec;

/// Outcome of a font lookup.
#[derive(Clone)]
pub enum FontHandle {
    /// The requested family (possibly without the requested style).
    Requested(FontArc),
    /// A fallback family was substituted.
    Fallback(FontArc),
    /// No usable font data at all.
    Missing,
}

impl FontHandle {
    /// The font to draw with, if any.
    #[must_use]
    pub fn font(&self) -> Option<&FontArc> {
        match self {
            Self::Requested(f) | Self::Fallback(f) => Some(f),
            Self::Missing => None,
        }
    }

    /// `true` if a fallback was used.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested(_) => f.write_str("FontHandle::Requested"),
            Self::Fallback(_) => f.write_str("FontHandle::Fallback"),
            Self::Missing => f.write_str("FontHandle::Missing"),
        }
    }
}

/// Source of fonts for text rendering.
pub trait FontResolver: Send + Sync {
    /// Resolve `spec` to a font, substituting a fallback when needed.
    fn resolve(&self, spec: &FontSpec) -> FontHandle;
}

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// Font files found under a set of directories, plus fonts registered from
/// memory.
///
/// Families are matched against lowercased file stems, so `Arial` finds
/// `arial.ttf` and `Arial.TTF`.
pub struct FontBook {
    files: HashMap<String, PathBuf>,
    loaded: Mutex<HashMap<String, Option<FontArc>>>,
    fallbacks: Vec<String>,
}

impl FontBook {
    /// An empty book: every lookup returns [`FontHandle::Missing`] until fonts
    /// are registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
            loaded: Mutex::new(HashMap::new()),
            fallbacks: Vec::new(),
        }
    }

    /// Index every font file under `dirs` (recursively) and use `fallbacks`, in
    /// order, when a family is not found.
    #[must_use]
    pub fn scan<P: AsRef<Path>>(dirs: &[P], fallbacks: &[String]) -> Self {
        let mut book = Self::empty();
        for dir in dirs {
            book.index_dir(dir.as_ref());
        }
        book.fallbacks = fallbacks.iter().map(|f| f.to_lowercase()).collect();
        tracing::debug!(
            fonts = book.files.len(),
            fallbacks = ?book.fallbacks,
            "font book indexed"
        );
        book
    }

    /// Index the default platform font directories.
    #[must_use]
    pub fn system() -> Self {
        let config = crate::config::AppConfig::default();
        Self::scan(&config.font_dirs, &config.fallback_families)
    }

    /// Register in-memory font data under `family`. Replaces an existing entry.
    ///
    /// Returns `false` if the data is not a parsable font.
    pub fn register(&self, family: &str, data: Vec<u8>) -> bool {
        match FontArc::try_from_vec(data) {
            Ok(font) => {
                self.loaded.lock().insert(family.to_lowercase(), Some(font));
                true
            }
            Err(e) => {
                tracing::warn!("font data for {family} rejected: {e}");
                false
            }
        }
    }

    /// Number of indexed font files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` if no font files were indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn index_dir(&mut self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            let Ok(ft) = entry.file_type() else { continue };
            if ft.is_dir() {
                self.index_dir(&path);
                continue;
            }
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if !is_font {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                // first hit wins so user directories listed earlier take priority
                self.files.entry(stem.to_lowercase()).or_insert(path);
            }
        }
    }

    /// Load (or fetch from cache) the font registered under a lowercased key.
    fn load(&self, key: &str) -> Option<FontArc> {
        if let Some(cached) = self.loaded.lock().get(key) {
            return cached.clone();
        }
        let path = self.files.get(key)?;
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    tracing::warn!("unusable font file {}: {e}", path.display());
                    None
                }
            },
            Err(e) => {
                tracing::warn!("cannot read font file {}: {e}", path.display());
                None
            }
        };
        self.loaded.lock().insert(key.to_string(), font.clone());
        font
    }

    fn first_loadable<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Option<FontArc> {
        keys.into_iter().find_map(|k| self.load(k))
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::empty()
    }
}

impl FontResolver for FontBook {
    fn resolve(&self, spec: &FontSpec) -> FontHandle {
        let candidates = style_candidates(&spec.family, spec.bold, spec.italic);
        if let Some(font) = self.first_loadable(&candidates) {
            return FontHandle::Requested(font);
        }
        if let Some(font) = self.first_loadable(&self.fallbacks) {
            tracing::debug!("font {} not found, using fallback", spec.family);
            return FontHandle::Fallback(font);
        }
        tracing::warn!("no font available for {}", spec.family);
        FontHandle::Missing
    }
}

/// Lowercased lookup keys for a family with the requested style, most
/// specific first and ending with the plain family.
fn style_candidates(family: &str, bold: bool, italic: bool) -> Vec<String> {
    let base = family.trim().to_lowercase();
    let mut out = Vec::new();
    let suffixes: &[&str] = match (bold, italic) {
        (true, true) => &["-bolditalic", " bold italic", "bolditalic", "-boldoblique", "bi", "z"],
        (true, false) => &["-bold", " bold", "bold", "bd", "b"],
        (false, true) => &["-italic", " italic", "italic", "-oblique", "i"],
        (false, false) => &[],
    };
    for s in suffixes {
        out.push(format!("{base}{s}"));
    }
    out.push(base.clone());
    out.push(format!("{base}-regular"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_reports_missing() {
        let book = FontBook::empty();
        let handle = book.resolve(&FontSpec::default());
        assert!(handle.font().is_none());
        assert!(!handle.is_fallback());
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let book = FontBook::empty();
        assert!(!book.register("bogus", vec![0, 1, 2, 3]));
        assert!(book.resolve(&FontSpec::default()).font().is_none());
    }

    #[test]
    fn unreadable_font_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Arial.ttf"), b"not a font").unwrap();
        let book = FontBook::scan(&[dir.path()], &[]);
        assert_eq!(book.len(), 1);
        assert!(matches!(book.resolve(&FontSpec::default()), FontHandle::Missing));
    }

    #[test]
    fn candidates_prefer_styled_faces() {
        let c = style_candidates("Arial", true, false);
        assert_eq!(c.first().map(String::as_str), Some("arial-bold"));
        assert!(c.contains(&"arialbd".to_string()));
        assert_eq!(c[c.len() - 2], "arial");

        let plain = style_candidates(" DejaVuSans ", false, false);
        assert_eq!(plain, vec!["dejavusans".to_string(), "dejavusans-regular".to_string()]);
    }

    #[test]
    fn system_fallback_resolves_when_fonts_installed() {
        let book = FontBook::system();
        if book.is_empty() {
            return;
        }
        let spec = FontSpec {
            family: "no-such-family-anywhere".to_string(),
            ..FontSpec::default()
        };
        // Any indexed fallback yields a usable face; if none of the fallback
        // families is installed the lookup degrades to Missing.
        match book.resolve(&spec) {
            FontHandle::Fallback(_) | FontHandle::Missing => {}
            FontHandle::Requested(_) => panic!("unknown family cannot be requested"),
        }
    }
}
