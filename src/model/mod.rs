//! Record model for Perspective archives.
//!
//! This module contains the in-memory journal types:
//! - Panel (one dated container per day)
//! - Entry (a dated text or binary record)
//! - Attributes (open-ended named values on both)

pub mod attributes;
pub mod entry;
pub mod panel;
pub mod text;

pub use attributes::Attributes;
pub use entry::{Content, Data, Entry, EntryId};
pub use panel::{Checksum, EntryMut, Panel, PanelId, Rating, checksum, merge_panels};
