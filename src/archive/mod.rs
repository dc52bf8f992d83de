//! JSON archive format.
//!
//! - [`load`] - Streaming loader producing panels from a document
//! - [`dump`] - Dumper writing panels back, exporting external content
//! - [`file`] - Load and dump archive files on disk
//! - [`paths`] - Lookup path expansion and input path resolution
//! - [`codec`] - Transport encodings for binary data
//! - [`warnings`] - Warning kinds and the policy that handles them
//! - [`extension`] - Hooks for optional record fields

pub mod codec;
pub mod dump;
pub mod extension;
pub(crate) mod fields;
pub mod file;
pub mod load;
pub mod paths;
pub mod warnings;

pub use codec::DataEncoding;
pub use dump::Dumper;
pub use extension::{ExtensionSet, RecordExtension};
pub use file::{atomic_write, dump_json, load_json};
pub use load::{Loader, PanelCursor};
pub use paths::{LookupPaths, compute_input_path, find_paths, get_lookup_paths};
pub use warnings::{Action, Warning, WarningKind, WarningLog, WarningPolicy};
