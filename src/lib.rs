//! PSP archive - journal panels and entries stored as JSON
//!
//! A journal is a sequence of panels, one per day, each holding timed
//! entries of typed content. This crate provides the in-memory model and
//! a JSON archive format with content stored inline or as external files.
//!
//! # Architecture
//!
//! - [`model`] - Panels, entries, attributes and text encodings
//! - [`filetypes`] - Type registry and type/encoding inference
//! - [`timeutil`] - Date and time parsing with offset resolution
//! - [`archive`] - JSON loader, dumper and path resolution
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod error;
pub mod filetypes;
pub mod model;
pub mod timeutil;

pub use archive::{Dumper, Loader, dump_json, load_json};
pub use config::ArchiveConfig;
pub use error::{Error, Result};
pub use model::{Entry, Panel, Rating};
