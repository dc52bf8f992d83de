//! JSON archive dumper.
//!
//! Each entry is written in one of three forms: inline text, an external
//! file referenced by an input path, or inline transport-encoded data.
//! Without a base directory the dumper never touches the file system and
//! every entry stays inline. With one, everything that cannot be written
//! as inline text is exported beneath it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{FixedOffset, Timelike};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::extension::{ExtensionSet, RecordExtension};
use super::paths::{LookupPaths, check_relpath, compute_input_path, join_rel, normalize, pattern_match, split_path};
use super::warnings::{Warning, WarningKind, WarningLog};
use crate::config::{ArchiveConfig, DumpOptions};
use crate::error::{Error, Result};
use crate::filetypes::InferenceManager;
use crate::filetypes::inference::FieldNeeds;
use crate::model::entry::streams_equal;
use crate::model::text;
use crate::model::{Entry, Panel};
use crate::timeutil::{IsoTimeCodec, TimeCodec};

/// Top-level keys computed by the dumper itself.
const RESERVED_KEYS: [&str; 3] = ["tz", "paths", "data"];

fn insert(out: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    out.insert(key.to_string(), value.into());
}

/// `type-format` when the type has no `-`, else `type` and `format`.
fn write_type_and_format(out: &mut Map<String, Value>, kind: &str, format: Option<&str>) {
    match format {
        Some(format) if !kind.contains('-') => insert(out, "type-format", format!("{kind}-{format}")),
        _ => {
            insert(out, "type", kind);
            if let Some(format) = format {
                insert(out, "format", format);
            }
        }
    }
}

fn write_content_fields(out: &mut Map<String, Value>, entry: &Entry, needs: FieldNeeds) {
    if needs.kind {
        write_type_and_format(out, entry.type_name(), entry.format());
    } else if let Some(format) = entry.format() {
        insert(out, "format", format);
    }
    if needs.encoding {
        insert(out, "encoding", entry.encoding());
    }
}

fn same_content(entry: &Entry, path: &Path) -> Result<bool> {
    Ok(streams_equal(entry.open_raw()?, File::open(path)?)?)
}

/// Serializes panels into archive documents.
pub struct Dumper {
    options: DumpOptions,
    inference: InferenceManager,
    codec: Box<dyn TimeCodec>,
    extensions: ExtensionSet,
    warnings: WarningLog,
}

impl std::fmt::Debug for Dumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumper")
            .field("options", &self.options)
            .field("extensions", &self.extensions)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl Default for Dumper {
    fn default() -> Self {
        Self::new(DumpOptions::default(), InferenceManager::default())
    }
}

impl Dumper {
    #[must_use]
    pub fn new(options: DumpOptions, inference: InferenceManager) -> Self {
        Self {
            options,
            inference,
            codec: Box::new(IsoTimeCodec::new()),
            extensions: ExtensionSet::new(),
            warnings: WarningLog::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `Registry` if the configured types collide.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        let registry = config.registry()?;
        Ok(Self::new(config.dump.clone(), InferenceManager::new(registry)))
    }

    #[must_use]
    pub fn with_codec(mut self, codec: impl TimeCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl RecordExtension + 'static) -> Self {
        self.extensions.push(extension);
        self
    }

    #[must_use]
    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DumpOptions {
        &mut self.options
    }

    #[must_use]
    pub fn inference(&self) -> &InferenceManager {
        &self.inference
    }

    pub fn inference_mut(&mut self) -> &mut InferenceManager {
        &mut self.inference
    }

    #[must_use]
    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.warnings.take()
    }

    fn warn(&mut self, kind: WarningKind, message: impl Into<String>) -> Result<()> {
        self.warnings.raise(&self.options.warnings, kind, message)
    }

    // ── Top level ─────────────────────────────────────────────

    /// Build the document for `panels`.
    ///
    /// `tz` and `paths` are written only when they differ from their
    /// defaults, then `attrs` (e.g. `desc`) are merged in, then `data` if
    /// there is at least one panel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured time zone is invalid, an entry
    /// cannot be read or exported, or a promoted warning fires.
    pub fn dump_value<'a, I>(&mut self, panels: I, attrs: Option<&Map<String, Value>>) -> Result<Value>
    where
        I: IntoIterator<Item = &'a Panel>,
    {
        let tz = match &self.options.time_zone {
            Some(tz) => Some(self.codec.parse_timezone(tz)?),
            None => None,
        };

        let mut document = Map::new();
        if let Some(tz) = tz {
            insert(&mut document, "tz", self.codec.format_timezone(tz));
        }
        if self.options.paths != ["."] {
            insert(&mut document, "paths", self.options.paths.clone());
        }
        for (key, value) in attrs.into_iter().flatten() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                debug!(key = %key, "Skipping reserved top-level attribute");
                continue;
            }
            document.insert(key.clone(), value.clone());
        }

        let mut data = Vec::new();
        for panel in panels {
            data.push(self.wrap_panel(panel, tz)?);
        }
        if !data.is_empty() {
            debug!(panels = data.len(), "Archive dumped");
            insert(&mut document, "data", data);
        }
        Ok(Value::Object(document))
    }

    /// Build the document for `panels` as a JSON string.
    ///
    /// # Errors
    ///
    /// As [`Dumper::dump_value`].
    pub fn dump_string<'a, I>(&mut self, panels: I, attrs: Option<&Map<String, Value>>) -> Result<String>
    where
        I: IntoIterator<Item = &'a Panel>,
    {
        let document = self.dump_value(panels, attrs)?;
        let json = if self.options.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }

    /// Write the document for `panels` to `writer`.
    ///
    /// # Errors
    ///
    /// As [`Dumper::dump_value`], plus `Json` if writing fails.
    pub fn dump_writer<'a, I>(
        &mut self,
        panels: I,
        attrs: Option<&Map<String, Value>>,
        mut writer: impl Write,
    ) -> Result<()>
    where
        I: IntoIterator<Item = &'a Panel>,
    {
        let document = self.dump_value(panels, attrs)?;
        if self.options.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)?;
        } else {
            serde_json::to_writer(&mut writer, &document)?;
        }
        writer.flush()?;
        Ok(())
    }

    // ── Panels and entries ────────────────────────────────────

    fn wrap_panel(&mut self, panel: &Panel, tz: Option<FixedOffset>) -> Result<Value> {
        let mut out = Map::new();
        insert(&mut out, "date", self.codec.format_date(panel.date()));
        if let Some(rating) = panel.rating() {
            insert(&mut out, "rating", rating.as_str());
        }
        let mut entries = Vec::with_capacity(panel.len());
        for entry in panel {
            entries.push(Value::Object(self.wrap_entry(entry, tz)?));
        }
        if !entries.is_empty() {
            insert(&mut out, "entries", entries);
        }
        self.extensions.dump_panel(panel, &mut out)?;
        Ok(Value::Object(out))
    }

    fn wrap_entry(&mut self, entry: &Entry, tz: Option<FixedOffset>) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        let time = entry.time();
        let local = time.naive_local();
        let offset = Some(*time.offset()).filter(|offset| Some(*offset) != tz);
        if entry.panel_date() == Some(local.date()) {
            insert(&mut out, "time", self.codec.format_time(local, offset));
        } else {
            insert(&mut out, "date-time", self.codec.format_datetime(local, offset));
        }
        if entry.is_insight() {
            insert(&mut out, "insight", true);
        }

        let raw = entry.raw_data()?;
        let inline_text = entry.is_text() && text::round_trips(&raw, entry.encoding());
        match self.options.base_dir.clone() {
            _ if inline_text => {
                let needs = FieldNeeds {
                    kind: self.inference.inline_text_needs_type(entry.type_name()),
                    encoding: false,
                };
                write_content_fields(&mut out, entry, needs);
                insert(&mut out, "data", text::decode(&raw, entry.encoding())?.into_owned());
            }
            Some(base_dir) => {
                drop(raw);
                let input = self.export(entry, &base_dir)?;
                let needs = self
                    .inference
                    .input_fields(&input, entry.type_name(), entry.encoding());
                write_content_fields(&mut out, entry, needs);
                insert(&mut out, "input", input);
            }
            None => {
                let needs = self
                    .inference
                    .binary_fields(entry.type_name(), entry.encoding());
                write_content_fields(&mut out, entry, needs);
                let codec = self.options.data_encoding;
                insert(&mut out, "data", codec.encode(&raw));
                insert(&mut out, "data-encoding", codec.as_str());
            }
        }

        if let Some(question) = entry.question() {
            insert(&mut out, "question", question);
        }
        self.extensions.dump_entry(entry, &mut out)?;
        Ok(out)
    }

    // ── Export ────────────────────────────────────────────────

    /// Export `entry` beneath `base_dir` and return its input path.
    fn export(&mut self, entry: &Entry, base_dir: &Path) -> Result<String> {
        let base_dir = std::path::absolute(base_dir)?;
        let layout = self.options.export.clone();

        let local = entry.time().naive_local();
        let mut name = local.format("%Y-%m-%d_%H-%M-%S").to_string();
        let micros = local.nanosecond() / 1_000;
        if micros != 0 {
            name.push_str(&format!(".{micros:06}"));
        }
        if let Some(panel_date) = entry.panel_date().filter(|date| *date != local.date()) {
            name = format!("{}_{name}", self.codec.format_date(panel_date));
        }
        let ext = self
            .inference
            .registry()
            .default_extension(entry.type_name())
            .unwrap_or_default()
            .to_string();

        let name = join_rel(&[layout.variable.as_str(), name.as_str()]);
        let filename = self.generate_export_path(entry, &name, &ext, &layout.fixed, &base_dir)?;
        self.export_entry(entry, &join_rel(&[layout.fixed.as_str(), filename.as_str()]), &base_dir)?;
        let input = compute_input_path(&filename, &layout.fixed, &base_dir, &self.options.paths)?;

        let lookup = LookupPaths::expand(&base_dir, &self.options.paths)?;
        let mut found = lookup.find(&input);
        let first = found
            .next()
            .ok_or_else(|| Error::UnreachableInputPath(input.clone()))?;
        if found.next().is_some() {
            self.warn(
                WarningKind::AmbiguousInputPath,
                format!("more than one path found for input path {input:?}"),
            )?;
        }
        if !same_content(entry, &first)? {
            return Err(Error::ContentMismatch { path: first });
        }
        debug!(input = %input, "Entry exported");
        Ok(input)
    }

    /// Pick a file name for `name` + `ext` under `dirname`.
    ///
    /// A candidate is usable when its target is absent or already holds
    /// the entry's bytes, and when no other file answers to the candidate
    /// (with any extension) through any lookup path, for every trailing
    /// part of `dirname` prefixed to it.
    fn generate_export_path(
        &mut self,
        entry: &Entry,
        name: &str,
        ext: &str,
        dirname: &str,
        base_dir: &Path,
    ) -> Result<String> {
        let exhausted = || Error::ExportNameExhausted {
            name: name.to_string(),
            dirname: dirname.to_string(),
        };
        let mut name_parts = split_path(name);
        let stem = name_parts.pop().ok_or_else(exhausted)?;
        let name_dir = join_rel(&name_parts);

        let dir_parts = split_path(dirname);
        let prefixes: Vec<String> = (0..=dir_parts.len())
            .map(|n| join_rel(&dir_parts[dir_parts.len() - n..]))
            .collect();

        self.check_shadowing(name, dirname, &name_parts)?;

        let lookup = LookupPaths::expand(base_dir, &self.options.paths)?;
        for n in 0..self.options.max_export_candidates {
            let candidate_stem = if n == 0 {
                stem.clone()
            } else {
                format!("{stem}_{n:03}")
            };
            let candidate = join_rel(&[name_dir.as_str(), candidate_stem.as_str()]);
            let filename = format!("{candidate}{ext}");
            let export_path = normalize(&base_dir.join(dirname).join(&filename));

            if export_path.exists() && !same_content(entry, &export_path)? {
                debug!(path = %export_path.display(), "Export target holds other content");
                continue;
            }
            let taken = prefixes.iter().any(|prefix| {
                lookup.finds_other(&export_path, &join_rel(&[prefix.as_str(), candidate.as_str()]))
            });
            if taken {
                debug!(candidate = %candidate, "Export name reachable through lookup paths");
                continue;
            }
            return Ok(filename);
        }
        Err(exhausted())
    }

    /// Warn once when a directory inside `name` is itself a lookup path.
    fn check_shadowing(&mut self, name: &str, dirname: &str, name_dirs: &[String]) -> Result<()> {
        for i in 1..=name_dirs.len() {
            let inner = join_rel(&name_dirs[..i]);
            let long_dir = join_rel(&split_path(&join_rel(&[dirname, inner.as_str()])));
            let matched = self
                .options
                .paths
                .iter()
                .find(|pattern| pattern_match(&long_dir, pattern))
                .cloned();
            if let Some(pattern) = matched {
                let export_path = join_rel(&[dirname, name]);
                return self.warn(
                    WarningKind::ShadowedExport,
                    format!(
                        "{name:?} is not the shortest reachable path for {export_path:?} \
                         (parent directory {long_dir:?} matches the lookup path {pattern:?}); \
                         name collisions may occur"
                    ),
                );
            }
        }
        Ok(())
    }

    /// Write the entry's bytes to `rel` under `base_dir` unless the file
    /// already exists.
    fn export_entry(&self, entry: &Entry, rel: &str, base_dir: &Path) -> Result<()> {
        let path = check_relpath(rel, base_dir)?;
        if path.exists() {
            debug!(path = %path.display(), "Reusing exported file");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        io::copy(&mut entry.open_raw()?, &mut file)?;
        file.sync_all()?;
        info!(path = %path.display(), "Exported entry");
        Ok(())
    }
}
