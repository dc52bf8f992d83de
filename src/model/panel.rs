//! Panel model.
//!
//! A panel is a dated container that exclusively owns its entries.
//! Membership is by identity: two equal entries can live side by side,
//! and removing an entry twice fails the second time.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;

use super::attributes::Attributes;
use super::entry::{Entry, EntryId, PanelLink, check_time_and_insight};
use crate::error::{Error, Result};

static NEXT_PANEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a panel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(u64);

impl PanelId {
    fn next() -> Self {
        Self(NEXT_PANEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ── Rating ────────────────────────────────────────────────────

/// Day rating, serialized as one of three emoticon tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    Bad,
    Neutral,
    Good,
}

impl Rating {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bad => ":(",
            Self::Neutral => ":|",
            Self::Good => ":)",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ":(" => Ok(Self::Bad),
            ":|" => Ok(Self::Neutral),
            ":)" => Ok(Self::Good),
            _ => Err(Error::InvalidValue {
                key: "rating".to_string(),
                value: s.to_string(),
                reason: "expected one of ':(', ':|', ':)'".to_string(),
            }),
        }
    }
}

// ── Panel ─────────────────────────────────────────────────────

/// A dated container of entries.
#[derive(Debug)]
pub struct Panel {
    id: PanelId,
    date: NaiveDate,
    entries: Vec<Entry>,
    attrs: Attributes,
    capabilities: Vec<String>,
}

impl Panel {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: PanelId::next(),
            date,
            entries: Vec::new(),
            attrs: Attributes::new(),
            capabilities: Vec::new(),
        }
    }

    /// A new panel with the same date, attributes and capabilities but
    /// no entries.
    #[must_use]
    pub fn copy_without_entries(&self) -> Self {
        Self {
            id: PanelId::next(),
            date: self.date,
            entries: Vec::new(),
            attrs: self.attrs.clone(),
            capabilities: self.capabilities.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PanelId {
        self.id
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn link(&self) -> PanelLink {
        PanelLink {
            panel: self.id,
            date: self.date,
        }
    }

    // ── Entries ───────────────────────────────────────────────

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    /// Attach `entry` and append it, returning its identity.
    ///
    /// # Errors
    ///
    /// Returns `EntryAlreadyAdded` if an entry with the same identity is
    /// already here, or a validation error if the entry's time breaks the
    /// date rules for this panel. On error the entry is dropped.
    pub fn add_entry(&mut self, mut entry: Entry) -> Result<EntryId> {
        if self.contains(entry.id()) {
            return Err(Error::EntryAlreadyAdded);
        }
        entry.attach(self.link())?;
        let id = entry.id();
        self.entries.push(entry);
        Ok(id)
    }

    /// Detach and return the entry with identity `id`.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotInPanel` if no such entry is attached here.
    pub fn remove_entry(&mut self, id: EntryId) -> Result<Entry> {
        let index = self.position(id).ok_or(Error::EntryNotInPanel)?;
        let mut entry = self.entries.remove(index);
        entry.detach();
        Ok(entry)
    }

    /// Detach and return the last entry.
    pub fn pop_entry(&mut self) -> Option<Entry> {
        let mut entry = self.entries.pop()?;
        entry.detach();
        Some(entry)
    }

    /// Move the entry `id` from `from` into this panel.
    ///
    /// The move is atomic: the entry is validated against this panel
    /// before it leaves `from`, so a failure leaves both panels unchanged.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotInPanel` if `from` does not hold `id`, or a
    /// validation error if the entry does not fit this panel's date.
    pub fn transfer_entry(&mut self, from: &mut Panel, id: EntryId) -> Result<EntryId> {
        if from.id == self.id {
            return if self.contains(id) {
                Ok(id)
            } else {
                Err(Error::EntryNotInPanel)
            };
        }
        let entry = from.get(id).ok_or(Error::EntryNotInPanel)?;
        check_time_and_insight(self.date, &entry.time(), entry.is_insight())?;
        let entry = from.remove_entry(id)?;
        self.add_entry(entry)
    }

    /// Mutable access to an attached entry.
    ///
    /// The returned guard re-runs the date rules on every time or insight
    /// change.
    pub fn entry_mut(&mut self, id: EntryId) -> Option<EntryMut<'_>> {
        self.entries
            .iter_mut()
            .find(|e| e.id() == id)
            .map(|entry| EntryMut { entry })
    }

    /// Sort entries in place with a comparator.
    pub fn sort_entries_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Entry, &Entry) -> CmpOrdering,
    {
        self.entries.sort_by(compare);
    }

    // ── Attributes ────────────────────────────────────────────

    #[must_use]
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    /// The day rating, if set to a recognised token.
    #[must_use]
    pub fn rating(&self) -> Option<Rating> {
        self.attrs.get_str("rating").and_then(|s| s.parse().ok())
    }

    pub fn set_rating(&mut self, rating: Rating) {
        self.attrs.set("rating", rating.as_str());
    }

    pub fn delete_rating(&mut self) -> Option<Rating> {
        match self.attrs.remove("rating") {
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_rating(&self) -> bool {
        self.attrs.contains("rating")
    }

    // ── Extension capabilities ────────────────────────────────

    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    pub fn add_capability(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_capability(&tag) {
            self.capabilities.push(tag);
        }
    }
}

impl Clone for Panel {
    /// A deep copy: new panel identity, new entry identities.
    fn clone(&self) -> Self {
        let mut panel = self.copy_without_entries();
        let link = panel.link();
        panel.entries = self
            .entries
            .iter()
            .map(|e| {
                let mut copy = e.clone();
                // already valid against an identical date
                copy.link_unchecked(link);
                copy
            })
            .collect();
        panel
    }
}

impl PartialEq for Panel {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.entries == other.entries && self.attrs == other.attrs
    }
}

impl<'a> IntoIterator for &'a Panel {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ── EntryMut ──────────────────────────────────────────────────

/// Mutable handle to an entry owned by a panel.
///
/// Reads go through `Deref`. Writes go through the forwarding setters so
/// the panel link can never be swapped or cleared from outside.
pub struct EntryMut<'a> {
    entry: &'a mut Entry,
}

impl Deref for EntryMut<'_> {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        self.entry
    }
}

impl EntryMut<'_> {
    /// # Errors
    ///
    /// Returns a validation error if the time breaks the panel's date rules.
    pub fn set_time(&mut self, time: DateTime<FixedOffset>) -> Result<()> {
        self.entry.set_time(time)
    }

    /// # Errors
    ///
    /// Returns `InsightTooEarly` if the entry is too close to the panel date.
    pub fn set_insight(&mut self, insight: bool) -> Result<()> {
        self.entry.set_insight(insight)
    }

    pub fn set_type(&mut self, kind: impl Into<String>) {
        self.entry.set_type(kind);
    }

    pub fn set_format(&mut self, format: Option<String>) {
        self.entry.set_format(format);
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.entry.set_encoding(encoding);
    }

    pub fn set_raw_data(&mut self, raw: Vec<u8>) {
        self.entry.set_raw_data(raw);
    }

    pub fn set_source(&mut self, path: impl Into<PathBuf>) {
        self.entry.set_source(path);
    }

    /// # Errors
    ///
    /// Returns an error if `text` cannot be encoded with `encoding`.
    pub fn set_text(&mut self, text: &str, kind: &str, encoding: &str) -> Result<()> {
        self.entry.set_text(text, kind, encoding)
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        self.entry.attrs_mut()
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.entry.set_question(question);
    }

    pub fn delete_question(&mut self) -> Option<String> {
        self.entry.delete_question()
    }

    pub fn add_capability(&mut self, tag: impl Into<String>) {
        self.entry.add_capability(tag);
    }
}

// ── Panel collections ─────────────────────────────────────────

/// Merge panels into one.
///
/// A single panel is returned unchanged. Otherwise a copy of the first
/// panel (without entries) receives every entry of every panel, in order.
///
/// # Errors
///
/// Returns `InvalidValue` for an empty input, or a validation error if an
/// entry does not fit the first panel's date.
pub fn merge_panels(panels: impl IntoIterator<Item = Panel>) -> Result<Panel> {
    let mut iter = panels.into_iter();
    let Some(first) = iter.next() else {
        return Err(Error::InvalidValue {
            key: "panels".to_string(),
            value: "[]".to_string(),
            reason: "no panels to merge".to_string(),
        });
    };
    let Some(second) = iter.next() else {
        return Ok(first);
    };
    let mut merged = first.copy_without_entries();
    for panel in [first, second].into_iter().chain(iter) {
        for mut entry in panel.entries {
            entry.detach();
            merged.add_entry(entry)?;
        }
    }
    Ok(merged)
}

/// Totals over a sequence of panels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    pub panels: usize,
    pub entries: usize,
    pub bytes: u64,
}

/// Count panels, entries and raw bytes.
///
/// # Errors
///
/// Returns an I/O error if an external entry source cannot be inspected.
pub fn checksum<'a>(panels: impl IntoIterator<Item = &'a Panel>) -> Result<Checksum> {
    let mut sum = Checksum::default();
    for panel in panels {
        sum.panels += 1;
        for entry in panel {
            sum.entries += 1;
            sum.bytes += entry.size()?;
        }
    }
    Ok(sum)
}
