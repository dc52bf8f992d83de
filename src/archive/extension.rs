//! Record extension hook.
//!
//! Optional fields such as captions or metadata live outside the core
//! model. An extension claims the keys it understands while a panel or
//! entry is loaded, stores them as attributes, and writes them back on
//! dump. Every record an extension touched carries its tag as a
//! capability, so the dumper only consults the extensions that apply.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::model::{Entry, Panel};

/// One optional record feature.
///
/// All hooks default to doing nothing, so an extension only implements
/// the side (panel or entry) it cares about.
pub trait RecordExtension {
    /// Capability tag added to records this extension touched.
    fn tag(&self) -> &str;

    /// Take the keys this extension understands from a panel object.
    /// Returns whether the panel now carries the extension's state.
    ///
    /// # Errors
    ///
    /// Returns an error if a claimed key holds an invalid value.
    fn load_panel(&self, _fields: &mut Map<String, Value>, _panel: &mut Panel) -> Result<bool> {
        Ok(false)
    }

    /// Take the keys this extension understands from an entry object.
    ///
    /// # Errors
    ///
    /// Returns an error if a claimed key holds an invalid value.
    fn load_entry(&self, _fields: &mut Map<String, Value>, _entry: &mut Entry) -> Result<bool> {
        Ok(false)
    }

    /// Write the extension's keys for a panel carrying its tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel's state cannot be serialized.
    fn dump_panel(&self, _panel: &Panel, _out: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }

    /// Write the extension's keys for an entry carrying its tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry's state cannot be serialized.
    fn dump_entry(&self, _entry: &Entry, _out: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of extensions, applied in registration order.
#[derive(Default)]
pub struct ExtensionSet {
    extensions: Vec<Box<dyn RecordExtension>>,
}

impl std::fmt::Debug for ExtensionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.tag()))
            .finish()
    }
}

impl ExtensionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: impl RecordExtension + 'static) {
        self.extensions.push(Box::new(extension));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|ext| ext.tag())
    }

    pub(crate) fn load_panel(&self, fields: &mut Map<String, Value>, panel: &mut Panel) -> Result<()> {
        for ext in &self.extensions {
            if ext.load_panel(fields, panel)? {
                debug!(tag = ext.tag(), date = %panel.date(), "Panel extended");
                panel.add_capability(ext.tag());
            }
        }
        Ok(())
    }

    pub(crate) fn load_entry(&self, fields: &mut Map<String, Value>, entry: &mut Entry) -> Result<()> {
        for ext in &self.extensions {
            if ext.load_entry(fields, entry)? {
                entry.add_capability(ext.tag());
            }
        }
        Ok(())
    }

    pub(crate) fn dump_panel(&self, panel: &Panel, out: &mut Map<String, Value>) -> Result<()> {
        for ext in &self.extensions {
            if panel.has_capability(ext.tag()) {
                ext.dump_panel(panel, out)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dump_entry(&self, entry: &Entry, out: &mut Map<String, Value>) -> Result<()> {
        for ext in &self.extensions {
            if entry.has_capability(ext.tag()) {
                ext.dump_entry(entry, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    /// Keeps an entry `caption` string as an attribute.
    pub(crate) struct Caption;

    impl RecordExtension for Caption {
        fn tag(&self) -> &str {
            "caption"
        }

        fn load_entry(&self, fields: &mut Map<String, Value>, entry: &mut Entry) -> Result<bool> {
            match fields.remove("caption") {
                Some(caption) => {
                    entry.attrs_mut().set("caption", caption);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn dump_entry(&self, entry: &Entry, out: &mut Map<String, Value>) -> Result<()> {
            if let Some(caption) = entry.attrs().get("caption") {
                out.insert("caption".into(), caption.clone());
            }
            Ok(())
        }
    }

    #[test]
    fn test_claimed_keys_become_capabilities() {
        let mut set = ExtensionSet::new();
        set.push(Caption);
        assert_eq!(set.tags().collect::<Vec<_>>(), vec!["caption"]);

        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .unwrap();
        let mut entry = Entry::new(time);
        let mut fields = Map::new();
        fields.insert("caption".into(), Value::from("sunrise"));
        fields.insert("other".into(), Value::from(1));

        set.load_entry(&mut fields, &mut entry).unwrap();
        assert!(entry.has_capability("caption"));
        assert!(!fields.contains_key("caption"));
        assert!(fields.contains_key("other"));

        let mut out = Map::new();
        set.dump_entry(&entry, &mut out).unwrap();
        assert_eq!(out["caption"], "sunrise");
    }

    #[test]
    fn test_untouched_records_are_skipped() {
        let mut set = ExtensionSet::new();
        set.push(Caption);
        let mut panel = Panel::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let mut fields = Map::new();
        set.load_panel(&mut fields, &mut panel).unwrap();
        assert!(panel.capabilities().is_empty());

        let mut out = Map::new();
        set.dump_panel(&panel, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
