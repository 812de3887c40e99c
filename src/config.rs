//! Application configuration: directories and font lookup settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable overriding the configuration directory.
pub const HOME_ENV: &str = "PHOTO_WATERMARK_HOME";

const CONFIG_FILE: &str = "config.json";
const DIR_NAME: &str = ".photo_watermark";

/// Settings read from `config.json` in the configuration directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directories searched (recursively) for font files, in priority order.
    pub font_dirs: Vec<PathBuf>,
    /// Families tried, in order, when a requested family is not installed.
    pub fallback_families: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            font_dirs: default_font_dirs(),
            fallback_families: [
                "msyh",
                "DejaVuSans",
                "LiberationSans-Regular",
                "NotoSans-Regular",
                "Arial",
                "Helvetica",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `dir`, falling back to defaults when the file is
    /// absent or invalid.
    #[must_use]
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Build a [`crate::FontBook`] from these settings.
    #[must_use]
    pub fn font_book(&self) -> crate::FontBook {
        crate::FontBook::scan(&self.font_dirs, &self.fallback_families)
    }
}

/// The configuration directory: `$PHOTO_WATERMARK_HOME`, else
/// `~/.photo_watermark`, else `./.photo_watermark`.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DIR_NAME)
}

fn default_font_dirs() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".fonts"));
        out.push(home.join(".local/share/fonts"));
        out.push(home.join("Library/Fonts"));
    }
    if let Some(windir) = std::env::var_os("WINDIR") {
        out.push(PathBuf::from(windir).join("Fonts"));
    }
    for dir in [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/Library/Fonts",
        "/System/Library/Fonts",
    ] {
        out.push(PathBuf::from(dir));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppConfig::load_or_default(dir.path()), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"fallback_families": ["Custom"]}"#,
        )
        .unwrap();
        let config = AppConfig::load_or_default(dir.path());
        assert_eq!(config.fallback_families, vec!["Custom".to_string()]);
        assert_eq!(config.font_dirs, AppConfig::default().font_dirs);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ nope").unwrap();
        assert_eq!(AppConfig::load_or_default(dir.path()), AppConfig::default());
    }
}
