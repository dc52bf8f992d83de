//! Configuration management.
//!
//! Loader and dumper options are plain serde structs. An [`ArchiveConfig`]
//! bundles both together with extra file types, and can be read from or
//! written to a JSON file:
//!
//! ```json
//! {
//!   "load": { "base_dir": "journal", "warn_ambiguous_paths": true },
//!   "dump": { "time_zone": "+08:00", "paths": [".", "assets"] },
//!   "types": [{ "name": "org", "text": true, "extensions": [".org"] }]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::{DataEncoding, WarningPolicy};
use crate::error::{Error, Result};
use crate::filetypes::{TypeDef, TypeRegistry};

/// Default candidate limit when generating export names.
pub const DEFAULT_MAX_EXPORT_CANDIDATES: usize = 1000;

fn default_paths() -> Vec<String> {
    vec![".".to_string()]
}

// ── Loader options ────────────────────────────────────────────

/// Options for [`crate::archive::Loader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Directory input paths are resolved against. Required for `input`.
    pub base_dir: Option<PathBuf>,
    pub check_panel_order: bool,
    pub check_entry_order: bool,
    /// Look past the first match of an input path and warn on a second.
    pub warn_ambiguous_paths: bool,
    pub warnings: WarningPolicy,
    /// chrono formats tried after ISO 8601 when parsing panel dates.
    pub date_formats: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            check_panel_order: true,
            check_entry_order: true,
            warn_ambiguous_paths: true,
            warnings: WarningPolicy::default(),
            date_formats: Vec::new(),
        }
    }
}

// ── Dumper options ────────────────────────────────────────────

/// Where exported entries go, relative to the base directory.
///
/// `fixed` is the directory part an input path may drop; `variable` is
/// prefixed to every export name and always stays in the input path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportLayout {
    pub fixed: String,
    pub variable: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            fixed: "assets".to_string(),
            variable: String::new(),
        }
    }
}

/// Options for [`crate::archive::Dumper`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Export directory root. Without one every entry stays inline.
    pub base_dir: Option<PathBuf>,
    /// Fixed offset written as the top-level `tz`.
    pub time_zone: Option<String>,
    /// Lookup path patterns written as the top-level `paths`.
    pub paths: Vec<String>,
    pub export: ExportLayout,
    pub max_export_candidates: usize,
    /// Transport encoding for inline binary data.
    pub data_encoding: DataEncoding,
    /// Pretty-print documents built by [`crate::archive::Dumper::dump_string`].
    pub pretty: bool,
    pub warnings: WarningPolicy,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            time_zone: None,
            paths: default_paths(),
            export: ExportLayout::default(),
            max_export_candidates: DEFAULT_MAX_EXPORT_CANDIDATES,
            data_encoding: DataEncoding::default(),
            pretty: true,
            warnings: WarningPolicy::default(),
        }
    }
}

// ── Archive config ────────────────────────────────────────────

/// Complete configuration for one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub load: LoadOptions,
    pub dump: DumpOptions,
    /// Types registered on top of the built-in registry.
    pub types: Vec<TypeDef>,
}

impl ArchiveConfig {
    /// Set the base directory for both loading and dumping.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        self.load.base_dir = Some(base_dir.clone());
        self.dump.base_dir = Some(base_dir);
        self
    }

    /// The built-in registry extended with [`ArchiveConfig::types`].
    ///
    /// # Errors
    ///
    /// Returns `Registry` if a configured type collides with a registered
    /// name, extension or alias.
    pub fn registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::default();
        for def in &self.types {
            registry.register(def)?;
        }
        Ok(registry)
    }
}

/// Load a configuration file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns `Config` if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<ArchiveConfig> {
    if !path.exists() {
        return Ok(ArchiveConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save a configuration file, creating parent directories.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_config(path: &Path, config: &ArchiveConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}
