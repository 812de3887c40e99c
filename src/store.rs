//! Named watermark templates and last-used settings, stored as JSON files.
//!
//! Layout under the configuration directory:
//!
//! ```text
//! <config_dir>/templates/<sanitized name>.json   {name, created_at, settings}
//! <config_dir>/last_settings.json                {settings}
//! ```
//!
//! The public operations report failure as `false`/`None` and log a warning;
//! the `try_*` variants return the underlying [`Error`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::settings::WatermarkSettings;

const TEMPLATES_DIR: &str = "templates";
const LAST_SETTINGS_FILE: &str = "last_settings.json";
const MAX_FILE_STEM: usize = 50;

/// Name and creation time of a stored template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummary {
    /// Template name as given by the user.
    pub name: String,
    /// When the template was (last) saved.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemplateRecord {
    name: String,
    created_at: DateTime<Utc>,
    settings: WatermarkSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct LastSettings {
    settings: WatermarkSettings,
}

/// File-backed template store.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// Open (creating if needed) the store rooted at `config_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates directory cannot be created.
    pub fn open(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            root: config_dir.into(),
        };
        std::fs::create_dir_all(store.templates_dir())?;
        Ok(store)
    }

    /// The configuration directory this store lives in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir()
            .join(format!("{}.json", sanitize_name(name)))
    }

    /// Save `settings` under `name`, replacing a template of the same name.
    pub fn save(&self, name: &str, settings: &WatermarkSettings) -> bool {
        succeeded("save template", self.try_save(name, settings))
    }

    /// Load the template called `name`.
    #[must_use]
    pub fn load(&self, name: &str) -> Option<WatermarkSettings> {
        logged("load template", self.try_load(name)).flatten()
    }

    /// Delete the template called `name`. `false` if it does not exist.
    pub fn delete(&self, name: &str) -> bool {
        logged("delete template", self.try_delete(name)).unwrap_or(false)
    }

    /// Rename `old` to `new`. Fails if `old` is missing or `new` is taken.
    ///
    /// Not atomic: a crash between writing `new` and removing `old` leaves
    /// both.
    pub fn rename(&self, old: &str, new: &str) -> bool {
        succeeded("rename template", self.try_rename(old, new))
    }

    /// All stored templates, newest first. Unreadable files are skipped.
    #[must_use]
    pub fn list(&self) -> Vec<TemplateSummary> {
        let entries = match std::fs::read_dir(self.templates_dir()) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!("cannot list templates: {e}");
                return Vec::new();
            }
        };
        let mut out: Vec<TemplateSummary> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| match read_record(&p) {
                Ok(record) => Some(TemplateSummary {
                    name: record.name,
                    created_at: record.created_at,
                }),
                Err(e) => {
                    tracing::warn!("skipping {}: {e}", p.display());
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    /// Save `settings` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for an empty name or when the name's file is
    /// held by a different template, and I/O or JSON errors otherwise.
    pub fn try_save(&self, name: &str, settings: &WatermarkSettings) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::Template("template name is empty".to_string()));
        }
        let path = self.template_path(name);
        if let Some(other) = existing_name(&path).filter(|other| other != name) {
            return Err(Error::Template(format!(
                "{name:?} would overwrite template {other:?}"
            )));
        }
        self.write_record(&path, name, settings)
    }

    /// Load the template called `name`; `Ok(None)` when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn try_load(&self, name: &str) -> Result<Option<WatermarkSettings>> {
        let path = self.template_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let record = read_record(&path)?;
        if record.name != name {
            tracing::debug!("{} holds {:?}, not {name:?}", path.display(), record.name);
            return Ok(None);
        }
        Ok(Some(record.settings))
    }

    /// Delete the template called `name`; `Ok(false)` when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn try_delete(&self, name: &str) -> Result<bool> {
        let path = self.template_path(name);
        if existing_name(&path).as_deref() != Some(name) {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }

    /// Rename a template: load `old`, save it as `new`, delete `old`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if `old` is missing or `new` already exists.
    pub fn try_rename(&self, old: &str, new: &str) -> Result<()> {
        let settings = self
            .try_load(old)?
            .ok_or_else(|| Error::Template(format!("no template named {old:?}")))?;
        if old == new {
            return Ok(());
        }
        if new.trim().is_empty() {
            return Err(Error::Template("template name is empty".to_string()));
        }

        let old_path = self.template_path(old);
        let new_path = self.template_path(new);
        if old_path == new_path {
            // same file name, e.g. "a/b" -> "a:b"
            return self.write_record(&new_path, new, &settings);
        }
        if new_path.exists() {
            return Err(Error::Template(format!("template {new:?} already exists")));
        }
        self.write_record(&new_path, new, &settings)?;
        std::fs::remove_file(&old_path)?;
        Ok(())
    }

    /// Remember `settings` as the last used ones.
    pub fn save_last_settings(&self, settings: &WatermarkSettings) -> bool {
        succeeded("save last settings", self.try_save_last_settings(settings))
    }

    /// The last used settings, if any were saved and can be read.
    #[must_use]
    pub fn load_last_settings(&self) -> Option<WatermarkSettings> {
        logged("load last settings", self.try_load_last_settings()).flatten()
    }

    /// Write `last_settings.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn try_save_last_settings(&self, settings: &WatermarkSettings) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let body = LastSettings {
            settings: settings.clone(),
        };
        std::fs::write(
            self.root.join(LAST_SETTINGS_FILE),
            serde_json::to_string_pretty(&body)?,
        )?;
        Ok(())
    }

    /// Read `last_settings.json`; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn try_load_last_settings(&self) -> Result<Option<WatermarkSettings>> {
        let path = self.root.join(LAST_SETTINGS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let last: LastSettings = serde_json::from_str(&data)?;
        Ok(Some(last.settings))
    }

    /// The last used settings, or the default template.
    #[must_use]
    pub fn load_last_or_default(&self) -> WatermarkSettings {
        self.load_last_settings()
            .unwrap_or_else(WatermarkSettings::default_template)
    }

    fn write_record(&self, path: &Path, name: &str, settings: &WatermarkSettings) -> Result<()> {
        std::fs::create_dir_all(self.templates_dir())?;
        let record = TemplateRecord {
            name: name.to_string(),
            created_at: Utc::now(),
            settings: settings.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&record)?)?;
        tracing::debug!("template {name:?} written to {}", path.display());
        Ok(())
    }
}

/// Turn a template name into a file stem: each of `<>:"/\|?*` becomes `_`,
/// and the result is cut to 50 characters.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .take(MAX_FILE_STEM)
        .collect()
}

fn read_record(path: &Path) -> Result<TemplateRecord> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn existing_name(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    read_record(path).ok().map(|record| record.name)
}

/// Log a failed store operation; `true` on success.
fn succeeded(what: &str, result: Result<()>) -> bool {
    logged(what, result).is_some()
}

fn logged<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{what} failed: {e}");
            None
        }
    }
}
