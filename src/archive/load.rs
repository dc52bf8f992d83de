//! JSON archive loader.
//!
//! [`Loader::load_value`] splits the top level of a document and returns
//! a [`PanelCursor`] that builds one [`Panel`] per `next()` call. The
//! cursor borrows the loader mutably, and reconfiguring the loader through
//! [`PanelCursor::loader_mut`] between calls takes effect on the very next
//! panel. Nothing is snapshotted when the cursor is created.

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};
use tracing::debug;

use super::codec::DataEncoding;
use super::extension::{ExtensionSet, RecordExtension};
use super::fields::{Fields, ignored_keys_message};
use super::paths::LookupPaths;
use super::warnings::{Warning, WarningKind, WarningLog};
use crate::config::{ArchiveConfig, LoadOptions};
use crate::error::{Error, Result};
use crate::filetypes::{ContentSource, InferenceManager};
use crate::model::text::{self, BINARY};
use crate::model::{Entry, Panel};
use crate::timeutil::{self, IsoTimeCodec, TimeCodec};

/// Time zone and lookup paths in effect for a panel or entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Context {
    tz: Option<FixedOffset>,
    paths: Vec<String>,
}

impl Context {
    /// Inner paths are searched before the inherited ones.
    fn push_paths(&mut self, inner: Vec<String>) {
        let outer = std::mem::take(&mut self.paths);
        self.paths = inner;
        self.paths.extend(outer);
    }
}

static ISO_CODEC: IsoTimeCodec = IsoTimeCodec {
    date_formats: Vec::new(),
};

/// Builds panels and entries out of archive documents.
pub struct Loader {
    options: LoadOptions,
    inference: InferenceManager,
    /// `None` parses with [`IsoTimeCodec`] and the current
    /// `options.date_formats`.
    codec: Option<Box<dyn TimeCodec>>,
    extensions: ExtensionSet,
    warnings: WarningLog,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("options", &self.options)
            .field("extensions", &self.extensions)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(LoadOptions::default(), InferenceManager::default())
    }
}

impl Loader {
    /// Create a loader using the ISO codec with the configured fallback
    /// date formats, read afresh for every date.
    #[must_use]
    pub fn new(options: LoadOptions, inference: InferenceManager) -> Self {
        Self {
            options,
            inference,
            codec: None,
            extensions: ExtensionSet::new(),
            warnings: WarningLog::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `Registry` if the configured types collide.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        let registry = config.registry()?;
        Ok(Self::new(config.load.clone(), InferenceManager::new(registry)))
    }

    #[must_use]
    pub fn with_codec(mut self, codec: impl TimeCodec + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl RecordExtension + 'static) -> Self {
        self.extensions.push(extension);
        self
    }

    #[must_use]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut LoadOptions {
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

    /// Split a parsed document and return a cursor over its panels.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object, or if `data`,
    /// `paths` or `tz` have the wrong type or an invalid value.
    pub fn load_value(&mut self, document: Value) -> Result<PanelCursor<'_>> {
        let mut fields = Fields::from_value(document, "archive", "")?;
        let panels = fields.take_object_list("data")?.unwrap_or_default();
        let paths = fields
            .take_str_list("paths")?
            .unwrap_or_else(|| vec![".".to_string()]);
        let tz = match fields.take_str_or_null("tz")? {
            Some(tz) => Some(self.codec().parse_timezone(&tz)?),
            None => None,
        };
        debug!(panels = panels.len(), ?paths, ?tz, "Archive split");
        Ok(PanelCursor {
            loader: self,
            context: Context { tz, paths },
            attrs: fields.into_map(),
            panels: panels.into_iter(),
            index: 0,
            previous: None,
            done: false,
        })
    }

    /// Parse `json` and return a cursor over its panels.
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed documents, then as [`Loader::load_value`].
    pub fn load_str(&mut self, json: &str) -> Result<PanelCursor<'_>> {
        let document: Value = serde_json::from_str(json)?;
        self.load_value(document)
    }

    /// Read a whole document from `reader` and return a cursor over its
    /// panels.
    ///
    /// # Errors
    ///
    /// Returns `Json` for unreadable or malformed documents.
    pub fn load_reader(&mut self, reader: impl Read) -> Result<PanelCursor<'_>> {
        let document: Value = serde_json::from_reader(reader)?;
        self.load_value(document)
    }

    /// Load every panel of a document.
    ///
    /// # Errors
    ///
    /// Returns the first error any panel raised.
    pub fn load_all(&mut self, document: Value) -> Result<Vec<Panel>> {
        self.load_value(document)?.collect()
    }

    fn codec(&self) -> &dyn TimeCodec {
        self.codec.as_deref().unwrap_or(&ISO_CODEC)
    }

    fn parse_date(&self, s: &str) -> Result<NaiveDate> {
        match &self.codec {
            Some(codec) => codec.parse_date(s),
            None => timeutil::parse_date_with_formats(s, &self.options.date_formats),
        }
    }

    // ── Panels ────────────────────────────────────────────────

    fn make_panel(&mut self, map: Map<String, Value>, context: &Context) -> Result<Panel> {
        let mut fields = Fields::new(map, " in panel");
        let date_str = fields.require_str("date", "panel")?;
        let date = self.parse_date(&date_str)?;

        let mut context = Cow::Borrowed(context);
        if let Some(tz) = fields.take_str("tz")? {
            context.to_mut().tz = Some(self.codec().parse_timezone(&tz)?);
        }
        if let Some(paths) = fields.take_str_list("paths")? {
            context.to_mut().push_paths(paths);
        }

        let mut panel = Panel::new(date);
        if let Some(rating) = fields.take_str_or_null("rating")? {
            panel.set_rating(rating.parse()?);
        }
        let entries = fields.take_object_list("entries")?.unwrap_or_default();
        self.extensions.load_panel(fields.map_mut(), &mut panel)?;

        let ignored = fields.remaining_keys();
        if !ignored.is_empty() {
            self.warn(
                WarningKind::IgnoredKeys,
                format!("{} (panel on {date})", ignored_keys_message("panel", &ignored)),
            )?;
        }

        for map in entries {
            let entry = self.make_entry(map, date, &context)?;
            panel.add_entry(entry)?;
        }
        if self.options.check_entry_order {
            self.check_entry_order(&panel)?;
        }
        debug!(date = %date, entries = panel.len(), "Panel loaded");
        Ok(panel)
    }

    /// Main entries, then insight entries (or the reverse), each group
    /// non-decreasing in time.
    fn check_entry_order(&mut self, panel: &Panel) -> Result<()> {
        let date = panel.date();
        let Some(first) = panel.entries().first() else {
            return Ok(());
        };
        let mut expected_insight = first.is_insight();
        let mut has_switched = false;
        let mut last_main: Option<(usize, DateTime<FixedOffset>)> = None;
        let mut last_insight: Option<(usize, DateTime<FixedOffset>)> = None;

        for (i, entry) in panel.iter().enumerate() {
            if entry.is_insight() != expected_insight {
                if has_switched {
                    let article = |insight: bool| if insight { "an insight" } else { "a main" };
                    self.warn(
                        WarningKind::EntryPlacement,
                        format!(
                            "expected entry {i} to be {} entry, got {} entry (panel on {date})",
                            article(expected_insight),
                            article(entry.is_insight()),
                        ),
                    )?;
                    continue;
                }
                has_switched = true;
                expected_insight = entry.is_insight();
            }

            let (group, last) = if entry.is_insight() {
                ("insight", &mut last_insight)
            } else {
                ("main", &mut last_main)
            };
            let previous = last.replace((i, entry.time()));
            if let Some((j, time)) = previous {
                if time > entry.time() {
                    self.warn(
                        WarningKind::EntryOrder,
                        format!(
                            "inconsistent order in {group} entries in panel on {date} \
                             (entry {i} precedes entry {j} in time)"
                        ),
                    )?;
                }
            }
        }
        Ok(())
    }

    // ── Entries ───────────────────────────────────────────────

    fn make_entry(
        &mut self,
        map: Map<String, Value>,
        panel_date: NaiveDate,
        context: &Context,
    ) -> Result<Entry> {
        let mut fields = Fields::new(map, " in entry");

        let mut context = Cow::Borrowed(context);
        if let Some(tz) = fields.take_str("tz")? {
            context.to_mut().tz = Some(self.codec().parse_timezone(&tz)?);
        }
        if let Some(paths) = fields.take_str_list("paths")? {
            context.to_mut().push_paths(paths);
        }

        let time = self.entry_time(&mut fields, panel_date, context.tz)?;
        let insight = fields.take_bool("insight")?.unwrap_or(false);
        let mut entry = Entry::new(time).with_insight(insight);

        let (kind, format) = match fields.take_str("type-format")? {
            Some(type_format) => match type_format.split_once('-') {
                Some((kind, format)) => (Some(kind.to_string()), Some(format.to_string())),
                None => (Some(type_format), None),
            },
            None => (fields.take_str("type")?, fields.take_str("format")?),
        };
        let kind = kind.map(|k| self.inference.alias_check(&k).to_string());
        let encoding = fields.take_str("encoding")?;

        let (kind, encoding) = (kind.as_deref(), encoding.as_deref());
        let inferred = match (fields.contains("data"), fields.contains("input")) {
            (true, true) => {
                return Err(Error::ConflictingFields {
                    first: "data",
                    second: "input",
                });
            }
            (false, false) => {
                return Err(Error::MissingOneOf {
                    context: "entry",
                    first: "data",
                    second: "input",
                });
            }
            (true, false) => {
                let data = fields.take_text("data")?.unwrap_or_default();
                match fields.take_str("data-encoding")? {
                    Some(name) => {
                        let codec: DataEncoding = name.parse()?;
                        entry.set_raw_data(codec.decode(&data)?);
                        self.inference
                            .infer(ContentSource::TransportData, kind, encoding)
                    }
                    None => {
                        entry.set_raw_data(data.into_bytes());
                        self.inference.infer(ContentSource::InlineText, kind, encoding)
                    }
                }
            }
            (false, true) => {
                let input = fields.require_str("input", "entry")?;
                let found = self.find_path(&input, &context.paths)?;
                entry.set_source(found);
                self.inference
                    .infer(ContentSource::InputPath(&input), kind, encoding)
            }
        };
        if let Some(declared) = &inferred.overridden_encoding {
            self.warn(
                WarningKind::EncodingOverride,
                format!("'data': encoding {declared:?} treated as 'utf-8'"),
            )?;
        }
        if inferred.encoding != BINARY && !text::is_known(&inferred.encoding) {
            return Err(Error::UnknownEncoding(inferred.encoding));
        }
        entry.set_type(inferred.kind);
        entry.set_format(format);
        entry.set_encoding(inferred.encoding);

        if let Some(question) = fields.take_str("question")? {
            entry.set_question(question);
        }
        self.extensions.load_entry(fields.map_mut(), &mut entry)?;

        let ignored = fields.remaining_keys();
        if !ignored.is_empty() {
            self.warn(
                WarningKind::IgnoredKeys,
                format!("{} (entry at {time})", ignored_keys_message("entry", &ignored)),
            )?;
        }
        Ok(entry)
    }

    /// Exactly one of `date-time` and `time`; `date` only goes with `time`.
    fn entry_time(
        &self,
        fields: &mut Fields,
        panel_date: NaiveDate,
        tz: Option<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>> {
        match (fields.take_str("date-time")?, fields.take_str("time")?) {
            (Some(_), Some(_)) => Err(Error::ConflictingFields {
                first: "date-time",
                second: "time",
            }),
            (Some(date_time), None) => {
                let (naive, embedded) = self.codec().parse_datetime(&date_time)?;
                timeutil::resolve(naive, embedded, tz, &date_time)
            }
            (None, Some(time)) => {
                let date = match fields.take_str("date")? {
                    Some(date) => self.parse_date(&date)?,
                    None => panel_date,
                };
                let (clock, embedded) = self.codec().parse_time(&time)?;
                timeutil::resolve(date.and_time(clock), embedded, tz, &time)
            }
            (None, None) => Err(Error::MissingOneOf {
                context: "entry",
                first: "time",
                second: "date-time",
            }),
        }
    }

    /// First file `input` reaches through `patterns`.
    fn find_path(&mut self, input: &str, patterns: &[String]) -> Result<std::path::PathBuf> {
        let base_dir = self
            .options
            .base_dir
            .clone()
            .ok_or(Error::BaseDirNotSet("resolve input paths"))?;
        if Path::new(input).is_absolute() {
            return Err(Error::AbsolutePath(input.to_string()));
        }
        let lookup = LookupPaths::expand(&base_dir, patterns)?;
        let mut found = lookup.find(input);
        let first = found.next().ok_or_else(|| Error::PathNotFound {
            path: input.to_string(),
            base_dir: base_dir.clone(),
        })?;
        if self.options.warn_ambiguous_paths && found.next().is_some() {
            self.warn(
                WarningKind::AmbiguousPath,
                format!(
                    "found more than one path for {input:?}; using the first path found {}",
                    first.display()
                ),
            )?;
        }
        Ok(first)
    }
}

// ── Cursor ────────────────────────────────────────────────────

/// Lazy sequence of the panels of one document.
///
/// Yields `Err` at most once; the cursor is exhausted afterwards and no
/// partially built panel is ever produced.
pub struct PanelCursor<'a> {
    loader: &'a mut Loader,
    context: Context,
    attrs: Map<String, Value>,
    panels: std::vec::IntoIter<Map<String, Value>>,
    index: usize,
    previous: Option<(usize, NaiveDate)>,
    done: bool,
}

impl PanelCursor<'_> {
    /// The loader producing the panels.
    ///
    /// Changes made here are seen by the next `next()` call: loading the
    /// rest of the document with different options or policies is allowed
    /// but the resulting panels may not be consistent with earlier ones.
    pub fn loader_mut(&mut self) -> &mut Loader {
        self.loader
    }

    /// Document-level time zone.
    #[must_use]
    pub fn time_zone(&self) -> Option<FixedOffset> {
        self.context.tz
    }

    /// Document-level lookup path patterns.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.context.paths
    }

    /// Top-level keys the loader does not interpret, such as `desc`.
    #[must_use]
    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Panels not yet produced.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.done { 0 } else { self.panels.len() }
    }

    fn check_panel_order(&mut self, date: NaiveDate) -> Result<()> {
        let index = self.index;
        if let Some((prev_index, prev_date)) = self.previous.replace((index, date)) {
            if !self.loader.options.check_panel_order {
                return Ok(());
            }
            if prev_date > date {
                self.loader.warn(
                    WarningKind::PanelOrder,
                    format!("panel #{prev_index} ({prev_date}) is after panel #{index} ({date})"),
                )?;
            } else if prev_date == date {
                self.loader.warn(
                    WarningKind::DuplicateDate,
                    format!("panel #{index} has the same date as panel #{prev_index} ({date})"),
                )?;
            }
        }
        Ok(())
    }

    fn advance(&mut self, map: Map<String, Value>) -> Result<Panel> {
        let panel = self.loader.make_panel(map, &self.context)?;
        self.check_panel_order(panel.date())?;
        Ok(panel)
    }
}

impl Iterator for PanelCursor<'_> {
    type Item = Result<Panel>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let map = self.panels.next()?;
        let result = self.advance(map);
        self.index += 1;
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::extension::tests::Caption;
    use crate::archive::warnings::WarningPolicy;
    use crate::model::Rating;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> Loader {
        Loader::default()
    }

    fn loader_in(base_dir: &Path) -> Loader {
        let options = LoadOptions {
            base_dir: Some(base_dir.to_path_buf()),
            ..LoadOptions::default()
        };
        Loader::new(options, InferenceManager::default())
    }

    fn one_entry(entry: Value) -> Value {
        json!({"tz": "UTC", "data": [{"date": "2024-03-01", "entries": [entry]}]})
    }

    fn offset_hours(entry: &Entry) -> i32 {
        entry.time().offset().local_minus_utc() / 3600
    }

    #[test]
    fn test_inline_text_entry() {
        let mut loader = loader();
        let doc = json!({
            "tz": "+08:00",
            "desc": "my journal",
            "data": [{
                "date": "2024-03-01",
                "rating": ":)",
                "entries": [{"time": "10:00", "data": ["Hello, ", "world"], "question": "How?"}]
            }]
        });
        let mut cursor = loader.load_value(doc).unwrap();
        assert_eq!(cursor.attrs()["desc"], "my journal");
        assert_eq!(cursor.paths(), ["."]);
        let panel = cursor.next().unwrap().unwrap();
        assert!(cursor.next().is_none());

        assert_eq!(panel.rating(), Some(Rating::Good));
        let entry = &panel.entries()[0];
        assert_eq!(entry.type_name(), "plain");
        assert_eq!(entry.encoding(), "utf-8");
        assert_eq!(entry.text().unwrap(), "Hello, world");
        assert_eq!(entry.question(), Some("How?"));
        assert_eq!(offset_hours(entry), 8);
        assert_eq!(entry.panel_date(), Some(panel.date()));
        assert!(loader.warnings().is_empty());
    }

    #[test]
    fn test_time_zone_precedence() {
        let mut loader = loader();
        let doc = json!({
            "tz": "UTC",
            "data": [
                {"date": "2024-03-01", "tz": "UTC+01:00", "entries": [
                    {"time": "06:00", "data": "panel"},
                    {"time": "09:00", "tz": "+03:00", "data": "entry"},
                    {"time": "09:00-05:00", "tz": "+03:00", "data": "embedded"}
                ]},
                {"date": "2024-03-02", "entries": [{"time": "06:00", "data": "global"}]}
            ]
        });
        let panels = loader.load_all(doc).unwrap();
        let hours: Vec<i32> = panels[0].iter().map(offset_hours).collect();
        assert_eq!(hours, vec![1, 3, -5]);
        assert_eq!(offset_hours(&panels[1].entries()[0]), 0);
        assert!(loader.warnings().is_empty());
    }

    #[test]
    fn test_naive_time_is_fatal() {
        let mut loader = loader();
        let doc = json!({"data": [{"date": "2024-03-01", "entries": [{"time": "09:00", "data": "x"}]}]});
        let err = loader.load_all(doc).unwrap_err();
        assert!(matches!(err, Error::TimeZoneNotProvided(_)));

        let doc = json!({"data": [{"date": "2024-03-01", "entries": [{"time": "09:00+02:00", "data": "x"}]}]});
        let panels = loader.load_all(doc).unwrap();
        assert_eq!(offset_hours(&panels[0].entries()[0]), 2);
    }

    #[test]
    fn test_structural_errors() {
        let mut loader = loader();

        let err = loader.load_all(json!({"data": [{"rating": ":("}]})).unwrap_err();
        assert_eq!(err.to_string(), "panel must provide date");

        let err = loader
            .load_all(one_entry(json!({"time": "09:00", "date-time": "2024-03-01 09:00", "data": ""})))
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingFields { first: "date-time", .. }));

        let err = loader.load_all(one_entry(json!({"data": "x"}))).unwrap_err();
        assert!(matches!(err, Error::MissingOneOf { first: "time", .. }));

        let err = loader.load_all(one_entry(json!({"time": "09:00"}))).unwrap_err();
        assert!(matches!(err, Error::MissingOneOf { first: "data", .. }));

        let err = loader
            .load_all(one_entry(json!({"time": "09:00", "data": "x", "input": "x.txt"})))
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingFields { first: "data", .. }));

        let err = loader
            .load_all(json!({"tz": "UTC", "data": [{"date": "2024-03-01", "rating": "great"}]}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_type_mismatch_errors() {
        let mut loader = loader();
        let err = loader
            .load_all(one_entry(json!({"time": "09:00", "data": "x", "insight": "yes"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "\"insight\" in entry: expected a boolean, got string");

        let err = loader.load_all(json!({"paths": "assets"})).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "a list of strings", .. }));

        assert!(loader.load_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_ignored_keys_warning() {
        let mut loader = loader();
        let doc = json!({"tz": "UTC", "data": [{
            "date": "2024-03-01",
            "weather": "rain",
            "entries": [{"time": "09:00", "data": "x", "mood": 1, "colour": "red"}]
        }]});
        loader.load_all(doc).unwrap();
        let warnings = loader.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].message.starts_with("ignored panel key: weather"));
        assert!(warnings[1].message.starts_with("ignored entry keys: colour, mood"));
    }

    #[test]
    fn test_extension_claims_keys() {
        let mut loader = loader().with_extension(Caption);
        let panels = loader
            .load_all(one_entry(json!({"time": "09:00", "data": "x", "caption": "dawn"})))
            .unwrap();
        let entry = &panels[0].entries()[0];
        assert!(entry.has_capability("caption"));
        assert_eq!(entry.attrs().get_str("caption"), Some("dawn"));
        assert!(loader.warnings().is_empty());
    }

    #[test]
    fn test_type_format_and_transport_data() {
        let mut loader = loader();
        let doc = json!({"tz": "UTC", "data": [{"date": "2024-03-01", "entries": [
            {"time": "09:00", "type-format": "markdown-gfm", "data": "# hi"},
            {"time": "09:01", "type": "md", "data": "# alias"},
            {"time": "09:02", "data": "aGk=", "data-encoding": "base64"},
            {"time": "09:03", "data": "//4=", "data-encoding": "base64", "type": "png"}
        ]}]});
        let panels = loader.load_all(doc).unwrap();
        let entries = panels[0].entries();

        assert_eq!(entries[0].type_name(), "markdown");
        assert_eq!(entries[0].format(), Some("gfm"));
        assert_eq!(entries[1].type_name(), "markdown");
        assert_eq!(entries[2].type_name(), "binary");
        assert_eq!(entries[2].encoding(), "binary");
        assert_eq!(entries[2].raw_data().unwrap().as_ref(), b"hi");
        assert_eq!(entries[3].type_name(), "png");
        assert!(!entries[3].is_text());
    }

    #[test]
    fn test_bad_encodings() {
        let mut loader = loader();
        let err = loader
            .load_all(one_entry(json!({"time": "09:00", "data": "x", "data-encoding": "base58"})))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDataEncoding(_)));

        let err = loader
            .load_all(one_entry(
                json!({"time": "09:00", "data": "eA==", "data-encoding": "base64", "encoding": "klingon"}),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEncoding(_)));

        let panels = loader
            .load_all(one_entry(json!({"time": "09:00", "data": "x", "encoding": "latin1"})))
            .unwrap();
        assert_eq!(panels[0].entries()[0].encoding(), "utf-8");
        assert!(loader.warnings().contains(WarningKind::EncodingOverride));
    }

    #[test]
    fn test_ambiguous_input_path_uses_first() {
        let tmp = TempDir::new().unwrap();
        for dir in ["a", "b"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("x.txt"), format!("from {dir}")).unwrap();
        }
        let doc = json!({"tz": "UTC", "paths": ["a", "b"], "data": [
            {"date": "2024-03-01", "entries": [{"time": "09:00", "input": "x.txt"}]}
        ]});

        let mut loader = loader_in(tmp.path());
        let panels = loader.load_all(doc.clone()).unwrap();
        let entry = &panels[0].entries()[0];
        assert_eq!(entry.text().unwrap(), "from a");
        assert_eq!(entry.type_name(), "plain");
        assert_eq!(loader.warnings().count(WarningKind::AmbiguousPath), 1);

        loader.options_mut().warnings =
            WarningPolicy::default().with(WarningKind::AmbiguousPath, crate::archive::Action::Error);
        let err = loader.load_all(doc.clone()).unwrap_err();
        assert!(err.is_promoted_warning());

        loader.options_mut().warn_ambiguous_paths = false;
        assert!(loader.load_all(doc).is_ok());
    }

    #[test]
    fn test_inner_paths_searched_first() {
        let tmp = TempDir::new().unwrap();
        for dir in ["a", "b"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("x.txt"), dir).unwrap();
        }
        let doc = json!({"tz": "UTC", "paths": ["a"], "data": [
            {"date": "2024-03-01", "paths": ["b"], "entries": [{"time": "09:00", "input": "x.txt"}]}
        ]});
        let mut loader = loader_in(tmp.path());
        loader.options_mut().warn_ambiguous_paths = false;
        let panels = loader.load_all(doc).unwrap();
        assert_eq!(panels[0].entries()[0].text().unwrap(), "b");
    }

    #[test]
    fn test_input_path_resource_errors() {
        let doc = one_entry(json!({"time": "09:00", "input": "missing.png"}));
        let err = loader().load_all(doc.clone()).unwrap_err();
        assert!(matches!(err, Error::BaseDirNotSet(_)));

        let tmp = TempDir::new().unwrap();
        let err = loader_in(tmp.path()).load_all(doc).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
    }

    #[test]
    fn test_panel_order_warnings() {
        let mut loader = loader();
        let doc = json!({"data": [{"date": "2024-03-02"}, {"date": "2024-03-01"}, {"date": "2024-03-01"}]});
        let panels = loader.load_all(doc).unwrap();
        assert_eq!(panels.len(), 3);
        assert_eq!(loader.warnings().count(WarningKind::PanelOrder), 1);
        assert_eq!(loader.warnings().count(WarningKind::DuplicateDate), 1);

        loader.take_warnings();
        loader.options_mut().check_panel_order = false;
        let doc = json!({"data": [{"date": "2024-03-02"}, {"date": "2024-03-01"}]});
        loader.load_all(doc).unwrap();
        assert!(loader.warnings().is_empty());
    }

    #[test]
    fn test_entry_order_and_placement() {
        let mut loader = loader();
        let doc = json!({"tz": "UTC", "data": [{"date": "2024-03-01", "entries": [
            {"time": "10:00", "data": "a"},
            {"time": "09:00", "data": "b"},
            {"date-time": "2024-03-05 10:00", "insight": true, "data": "c"},
            {"time": "11:00", "data": "d"}
        ]}]});
        loader.load_all(doc).unwrap();
        let warnings = loader.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::EntryOrder);
        assert!(warnings[0].message.contains("entry 1 precedes entry 0"));
        assert_eq!(warnings[1].kind, WarningKind::EntryPlacement);
        assert!(warnings[1].message.starts_with("expected entry 3 to be an insight entry"));
    }

    #[test]
    fn test_insight_rules_are_fatal() {
        let mut loader = loader();
        let err = loader
            .load_all(one_entry(json!({"time": "10:00", "date": "2024-03-02", "insight": true, "data": "x"})))
            .unwrap_err();
        assert!(matches!(err, Error::InsightTooEarly { .. }));

        let err = loader
            .load_all(one_entry(json!({"date-time": "2024-02-28 10:00", "data": "x"})))
            .unwrap_err();
        assert!(matches!(err, Error::EntryBeforePanel { .. }));
    }

    #[test]
    fn test_cursor_stops_after_error() {
        let mut loader = loader();
        loader.options_mut().warnings = WarningPolicy::strict();
        let doc = json!({"data": [{"date": "2024-03-02"}, {"date": "2024-03-01"}, {"date": "2024-03-03"}]});
        let mut cursor = loader.load_value(doc).unwrap();
        assert_eq!(cursor.remaining(), 3);
        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_reconfiguration_between_panels_is_visible() {
        let mut loader = loader();
        let doc = json!({"data": [{"date": "2024-03-01", "x": 1}, {"date": "2024-03-02", "x": 2}]});
        let mut cursor = loader.load_value(doc).unwrap();
        assert!(cursor.next().unwrap().is_ok());
        cursor.loader_mut().options_mut().warnings = WarningPolicy::strict();
        let err = cursor.next().unwrap().unwrap_err();
        assert!(err.is_promoted_warning());
        assert_eq!(loader.warnings().count(WarningKind::IgnoredKeys), 1);
    }

    #[test]
    fn test_fallback_date_formats() {
        let options = LoadOptions {
            date_formats: vec!["%d/%m/%Y".to_string()],
            ..LoadOptions::default()
        };
        let mut loader = Loader::new(options, InferenceManager::default());
        let panels = loader.load_all(json!({"data": [{"date": "01/03/2024"}]})).unwrap();
        assert_eq!(panels[0].date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_date_formats_changed_between_panels() {
        let mut loader = loader();
        let doc = json!({"data": [{"date": "2024-03-01"}, {"date": "02/03/2024"}]});
        let mut cursor = loader.load_value(doc).unwrap();
        assert!(cursor.next().unwrap().is_ok());
        cursor.loader_mut().options_mut().date_formats = vec!["%d/%m/%Y".to_string()];
        let panel = cursor.next().unwrap().unwrap();
        assert_eq!(panel.date(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_utf8_spellings_on_inline_text() {
        for label in ["UTF8", "utf8", "utf-8"] {
            let mut loader = loader();
            loader.options_mut().warnings = WarningPolicy::strict();
            let panels = loader
                .load_all(one_entry(json!({"time": "09:00", "data": "x", "encoding": label})))
                .unwrap();
            assert_eq!(panels[0].entries()[0].text().unwrap(), "x");
            assert_eq!(loader.warnings().count(WarningKind::EncodingOverride), 0);
        }
    }
}
