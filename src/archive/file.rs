//! Archive file convenience API.
//!
//! The archive's directory is the default base directory, so input paths
//! in a document resolve next to the file that holds it.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use super::dump::Dumper;
use super::load::Loader;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::model::Panel;

fn archive_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write content to a file atomically.
///
/// Writes to a sibling temporary file, syncs it to disk, then renames it
/// over `path`. On failure the original file (if any) is untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load an archive file.
///
/// With `date`, only the first panel on that date is returned and the
/// rest of the document is never built.
///
/// # Errors
///
/// Returns `DateNotFound` if no panel has `date`, or any load error.
pub fn load_json(path: &Path, date: Option<NaiveDate>, config: &ArchiveConfig) -> Result<Vec<Panel>> {
    let mut loader = Loader::from_config(config)?;
    if loader.options().base_dir.is_none() {
        loader.options_mut().base_dir = Some(archive_dir(path));
    }
    let reader = BufReader::new(File::open(path)?);
    let cursor = loader.load_reader(reader)?;

    let Some(date) = date else {
        return cursor.collect();
    };
    for panel in cursor {
        let panel = panel?;
        if panel.date() == date {
            return Ok(vec![panel]);
        }
    }
    Err(Error::DateNotFound(date.to_string()))
}

/// Dump panels to an archive file, exporting external content next to it.
///
/// # Errors
///
/// Returns an `AlreadyExists` I/O error when `path` exists and `exist_ok`
/// is false, or any dump error.
pub fn dump_json<'a, I>(panels: I, path: &Path, exist_ok: bool, config: &ArchiveConfig) -> Result<()>
where
    I: IntoIterator<Item = &'a Panel>,
{
    if !exist_ok && path.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    let mut dumper = Dumper::from_config(config)?;
    if dumper.options().base_dir.is_none() {
        dumper.options_mut().base_dir = Some(archive_dir(path));
    }
    let mut json = dumper.dump_string(panels, None)?;
    json.push('\n');
    atomic_write(path, &json)?;
    info!(path = %path.display(), warnings = dumper.warnings().len(), "Archive written");
    Ok(())
}
