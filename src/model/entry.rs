//! Entry model.
//!
//! An entry is one dated record holding text or binary content. Content
//! lives either in memory (`Content::Raw`) or in an external file
//! (`Content::Source`); setting one always replaces the other.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta, Weekday};
use serde_json::Value;

use super::attributes::Attributes;
use super::panel::PanelId;
use super::text::{self, BINARY};
use crate::error::{Error, Result};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an entry object.
///
/// Equality between entries compares values; membership in a panel
/// compares identities. Cloning an entry yields a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Back-reference from an attached entry to its panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PanelLink {
    pub(crate) panel: PanelId,
    pub(crate) date: NaiveDate,
}

/// Where an entry's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Bytes owned by the entry.
    Raw(Vec<u8>),
    /// Path to an external file holding the bytes.
    Source(PathBuf),
}

/// Decoded entry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Text(String),
    Binary(Vec<u8>),
}

/// Check the date rules an attached entry must satisfy.
///
/// The entry's local date may not precede the panel date. Insight entries
/// must be at least two days later, or one day later when they fall on a
/// Sunday (weekly review).
pub(crate) fn check_time_and_insight(
    panel_date: NaiveDate,
    time: &DateTime<FixedOffset>,
    insight: bool,
) -> Result<()> {
    let entry_date = time.date_naive();
    if entry_date < panel_date {
        return Err(Error::EntryBeforePanel {
            time: time.to_rfc3339(),
            panel_date: panel_date.to_string(),
        });
    }
    if insight
        && entry_date < panel_date + TimeDelta::days(2)
        && !(entry_date.weekday() == Weekday::Sun && entry_date != panel_date)
    {
        return Err(Error::InsightTooEarly {
            time: time.to_rfc3339(),
            panel_date: panel_date.to_string(),
        });
    }
    Ok(())
}

/// Compare two byte streams chunk by chunk.
pub(crate) fn streams_equal(mut a: impl Read, mut b: impl Read) -> io::Result<bool> {
    const BUFSIZE: usize = 8192;
    let mut buf_a = [0u8; BUFSIZE];
    let mut buf_b = [0u8; BUFSIZE];
    loop {
        let n = read_full(&mut a, &mut buf_a)?;
        let m = read_full(&mut b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A single dated record.
#[derive(Debug)]
pub struct Entry {
    id: EntryId,
    link: Option<PanelLink>,
    time: DateTime<FixedOffset>,
    insight: bool,
    kind: String,
    format: Option<String>,
    encoding: String,
    content: Content,
    attrs: Attributes,
    capabilities: Vec<String>,
}

impl Entry {
    /// Create a detached main entry holding empty binary data.
    #[must_use]
    pub fn new(time: DateTime<FixedOffset>) -> Self {
        Self {
            id: EntryId::next(),
            link: None,
            time,
            insight: false,
            kind: BINARY.to_string(),
            format: None,
            encoding: BINARY.to_string(),
            content: Content::Raw(Vec::new()),
            attrs: Attributes::new(),
            capabilities: Vec::new(),
        }
    }

    /// Builder-style insight flag.
    #[must_use]
    pub fn with_insight(mut self, insight: bool) -> Self {
        self.insight = insight;
        self
    }

    /// Builder-style text content.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` cannot be encoded with `encoding`.
    pub fn with_text(mut self, text: &str, kind: &str, encoding: &str) -> Result<Self> {
        self.set_text(text, kind, encoding)?;
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    // ── Time and panel linkage ────────────────────────────────

    #[must_use]
    pub fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    /// Set the entry time, revalidating against the owning panel.
    ///
    /// # Errors
    ///
    /// Returns `EntryBeforePanel` or `InsightTooEarly` if the new time
    /// breaks the panel's date rules. The entry is left unchanged.
    pub fn set_time(&mut self, time: DateTime<FixedOffset>) -> Result<()> {
        if let Some(link) = self.link {
            check_time_and_insight(link.date, &time, self.insight)?;
        }
        self.time = time;
        Ok(())
    }

    #[must_use]
    pub fn is_insight(&self) -> bool {
        self.insight
    }

    /// Set the insight flag, revalidating against the owning panel.
    ///
    /// # Errors
    ///
    /// Returns `InsightTooEarly` if the entry is attached too close to its
    /// panel's date for an insight.
    pub fn set_insight(&mut self, insight: bool) -> Result<()> {
        if let Some(link) = self.link {
            check_time_and_insight(link.date, &self.time, insight)?;
        }
        self.insight = insight;
        Ok(())
    }

    #[must_use]
    pub fn has_panel(&self) -> bool {
        self.link.is_some()
    }

    #[must_use]
    pub fn panel_id(&self) -> Option<PanelId> {
        self.link.map(|l| l.panel)
    }

    /// Date of the owning panel, if attached.
    #[must_use]
    pub fn panel_date(&self) -> Option<NaiveDate> {
        self.link.map(|l| l.date)
    }

    pub(crate) fn attach(&mut self, link: PanelLink) -> Result<()> {
        check_time_and_insight(link.date, &self.time, self.insight)?;
        self.link = Some(link);
        Ok(())
    }

    pub(crate) fn link_unchecked(&mut self, link: PanelLink) {
        self.link = Some(link);
    }

    pub(crate) fn detach(&mut self) {
        self.link = None;
    }

    // ── Content attributes ────────────────────────────────────

    /// The entry's type tag.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.kind
    }

    pub fn set_type(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
    }

    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn set_format(&mut self, format: Option<String>) {
        self.format = format;
    }

    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    /// Whether the content decodes to text (encoding is not `binary`).
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.encoding != BINARY
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Replace the content with in-memory bytes, dropping any source.
    pub fn set_raw_data(&mut self, raw: Vec<u8>) {
        self.content = Content::Raw(raw);
    }

    /// Replace the content with an external file, dropping raw bytes.
    pub fn set_source(&mut self, path: impl Into<PathBuf>) {
        self.content = Content::Source(path.into());
    }

    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        match &self.content {
            Content::Source(path) => Some(path),
            Content::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn has_source(&self) -> bool {
        matches!(self.content, Content::Source(_))
    }

    /// Encode `text` and set it as this entry's content, type and encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if `encoding` is unknown or cannot represent `text`.
    pub fn set_text(&mut self, text: &str, kind: &str, encoding: &str) -> Result<()> {
        let raw = text::encode(text, encoding)?;
        self.set_raw_data(raw);
        self.encoding = encoding.to_string();
        self.kind = kind.to_string();
        Ok(())
    }

    /// Raw bytes, reading the source file if necessary.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source file cannot be read.
    pub fn raw_data(&self) -> Result<Cow<'_, [u8]>> {
        match &self.content {
            Content::Raw(raw) => Ok(Cow::Borrowed(raw)),
            Content::Source(path) => Ok(Cow::Owned(fs::read(path)?)),
        }
    }

    /// Stream the raw bytes. The source file, if any, is opened per call.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source file cannot be opened.
    pub fn open_raw(&self) -> Result<Box<dyn Read + '_>> {
        match &self.content {
            Content::Raw(raw) => Ok(Box::new(raw.as_slice())),
            Content::Source(path) => Ok(Box::new(File::open(path)?)),
        }
    }

    /// Number of bytes of raw data.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source file cannot be inspected.
    pub fn size(&self) -> Result<u64> {
        match &self.content {
            Content::Raw(raw) => Ok(raw.len() as u64),
            Content::Source(path) => Ok(fs::metadata(path)?.len()),
        }
    }

    /// Decoded text content.
    ///
    /// # Errors
    ///
    /// Returns `UndecodableText` for binary entries or malformed bytes.
    pub fn text(&self) -> Result<String> {
        if !self.is_text() {
            return Err(Error::UndecodableText(BINARY.to_string()));
        }
        let raw = self.raw_data()?;
        Ok(text::decode(&raw, &self.encoding)?.into_owned())
    }

    /// Text for text entries, bytes otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or decoded.
    pub fn data(&self) -> Result<Data> {
        if self.is_text() {
            self.text().map(Data::Text)
        } else {
            Ok(Data::Binary(self.raw_data()?.into_owned()))
        }
    }

    // ── Attributes ────────────────────────────────────────────

    #[must_use]
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.attrs.get_str("question")
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.attrs.set("question", Value::String(question.into()));
    }

    pub fn delete_question(&mut self) -> Option<String> {
        match self.attrs.remove("question") {
            Some(Value::String(q)) => Some(q),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_question(&self) -> bool {
        self.attrs.contains("question")
    }

    // ── Extension capabilities ────────────────────────────────

    /// Extension tags this entry was composed with, in application order.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// Add an extension tag; adding the same tag twice is a no-op.
    pub fn add_capability(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_capability(&tag) {
            self.capabilities.push(tag);
        }
    }

    fn content_eq(&self, other: &Self) -> bool {
        if self.is_text() {
            match (self.text(), other.text()) {
                (Ok(a), Ok(b)) => a == b,
                // text that decodes on neither side compares as bytes
                (Err(_), Err(_)) => self.bytes_eq(other),
                _ => false,
            }
        } else {
            self.bytes_eq(other)
        }
    }

    fn bytes_eq(&self, other: &Self) -> bool {
        match (self.open_raw(), other.open_raw()) {
            (Ok(a), Ok(b)) => streams_equal(a, b).unwrap_or(false),
            _ => false,
        }
    }
}

impl Clone for Entry {
    /// A clone is a new, detached entry with equal content.
    fn clone(&self) -> Self {
        Self {
            id: EntryId::next(),
            link: None,
            time: self.time,
            insight: self.insight,
            kind: self.kind.clone(),
            format: self.format.clone(),
            encoding: self.encoding.clone(),
            content: self.content.clone(),
            attrs: self.attrs.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        // DateTime equality compares instants, whatever the offsets
        self.time == other.time
            && self.insight == other.insight
            && self.kind == other.kind
            && self.format == other.format
            && self.is_text() == other.is_text()
            && self.attrs == other.attrs
            && self.content_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_new_entry_defaults() {
        let entry = Entry::new(at(2022, 2, 2, 10));
        assert_eq!(entry.type_name(), "binary");
        assert_eq!(entry.encoding(), "binary");
        assert!(!entry.is_text());
        assert!(!entry.is_insight());
        assert!(!entry.has_panel());
        assert_eq!(entry.raw_data().unwrap().as_ref(), b"");
    }

    #[test]
    fn test_raw_and_source_are_exclusive() {
        let mut entry = Entry::new(at(2022, 2, 2, 10));
        entry.set_source("/tmp/whatever.txt");
        assert!(entry.has_source());
        entry.set_raw_data(b"bytes".to_vec());
        assert!(!entry.has_source());
        assert_eq!(entry.content(), &Content::Raw(b"bytes".to_vec()));
    }

    #[test]
    fn test_source_is_read_lazily() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"from disk").unwrap();

        let mut entry = Entry::new(at(2022, 2, 2, 10));
        entry.set_source(&path);
        entry.set_encoding("utf-8");
        assert_eq!(entry.text().unwrap(), "from disk");
        assert_eq!(entry.size().unwrap(), 9);
    }

    #[test]
    fn test_equal_text_different_encodings() {
        let a = Entry::new(at(2022, 2, 2, 10))
            .with_text("hello", "plain", "utf-8")
            .unwrap();
        let b = Entry::new(at(2022, 2, 2, 10))
            .with_text("hello", "plain", "utf-16le")
            .unwrap();
        assert_ne!(a.raw_data().unwrap(), b.raw_data().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_bytes_different_text() {
        let mut a = Entry::new(at(2022, 2, 2, 10));
        a.set_raw_data("é".as_bytes().to_vec());
        a.set_encoding("utf-8");
        let mut b = Entry::new(at(2022, 2, 2, 10));
        b.set_raw_data("é".as_bytes().to_vec());
        b.set_encoding("latin1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_normalizes_time_zone() {
        let a = Entry::new(at(2022, 2, 2, 10));
        let utc = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2022, 2, 2, 2, 0, 0)
            .unwrap();
        let b = Entry::new(utc);
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_and_binary_never_equal() {
        let mut a = Entry::new(at(2022, 2, 2, 10));
        a.set_raw_data(b"abc".to_vec());
        let mut b = a.clone();
        b.set_encoding("utf-8");
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_is_new_identity() {
        let a = Entry::new(at(2022, 2, 2, 10));
        let b = a.clone();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_undecodable_text_compares_bytes() {
        let mut a = Entry::new(at(2022, 2, 2, 10));
        a.set_raw_data(vec![0xff, 0xfe]);
        a.set_encoding("utf-8");
        assert!(a.text().is_err());
        assert_eq!(a, a.clone());

        let mut b = a.clone();
        b.set_raw_data(vec![0xff, 0xfd]);
        assert_ne!(a, b);

        // decodable on one side only
        let mut c = a.clone();
        c.set_raw_data(b"ok".to_vec());
        assert_ne!(a, c);
    }

    #[test]
    fn test_with_insight_sets_flag() {
        let entry = Entry::new(at(2022, 2, 2, 10)).with_insight(true);
        assert!(entry.is_insight());
    }

    #[test]
    fn test_question_accessors() {
        let mut entry = Entry::new(at(2022, 2, 2, 10));
        assert!(!entry.has_question());
        entry.set_question("What went well?");
        assert_eq!(entry.question(), Some("What went well?"));
        assert_eq!(entry.delete_question().as_deref(), Some("What went well?"));
        assert_eq!(entry.question(), None);
    }

    #[test]
    fn test_insight_rules() {
        // 2022-02-02 is a Wednesday
        let panel = NaiveDate::from_ymd_opt(2022, 2, 2).unwrap();
        assert!(check_time_and_insight(panel, &at(2022, 2, 1, 23), false).is_err());
        assert!(check_time_and_insight(panel, &at(2022, 2, 2, 0), false).is_ok());
        assert!(matches!(
            check_time_and_insight(panel, &at(2022, 2, 3, 10), true),
            Err(Error::InsightTooEarly { .. })
        ));
        assert!(check_time_and_insight(panel, &at(2022, 2, 4, 0), true).is_ok());

        // Saturday panel, Sunday insight
        let saturday = NaiveDate::from_ymd_opt(2022, 2, 5).unwrap();
        assert!(check_time_and_insight(saturday, &at(2022, 2, 6, 9), true).is_ok());
        // Sunday panel, same-day insight is still too early
        let sunday = NaiveDate::from_ymd_opt(2022, 2, 6).unwrap();
        assert!(check_time_and_insight(sunday, &at(2022, 2, 6, 20), true).is_err());
    }

    #[test]
    fn test_streams_equal() {
        assert!(streams_equal(&b"abc"[..], &b"abc"[..]).unwrap());
        assert!(!streams_equal(&b"abc"[..], &b"abd"[..]).unwrap());
        assert!(!streams_equal(&b"abc"[..], &b"abcd"[..]).unwrap());
        let big = vec![7u8; 20_000];
        assert!(streams_equal(big.as_slice(), big.as_slice()).unwrap());
    }
}
