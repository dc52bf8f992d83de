//! Lookup path expansion and input path resolution.
//!
//! A *lookup path* is an existing directory obtained by expanding one of
//! the archive's `paths` glob patterns against the base directory. An
//! *input path* is a relative path that, joined to some lookup path,
//! names an existing file. It is *reachable* if at least one lookup path
//! produces a file and *unambiguous* if exactly one does.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::{Error, Result};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Lexically normalize a path: drop `.` and fold `..` where possible.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Components of a relative path, normalized; `.` yields nothing.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    normalize(Path::new(path))
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// Join relative components with `/`, the separator used in documents.
#[must_use]
pub fn join_rel<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Component-wise shell pattern match of a relative path.
#[must_use]
pub fn pattern_match(path: &str, pattern: &str) -> bool {
    let file_parts = split_path(path);
    let pattern_parts = split_path(pattern);
    file_parts.len() == pattern_parts.len()
        && file_parts
            .iter()
            .zip(&pattern_parts)
            .all(|(s, p)| Pattern::new(p).is_ok_and(|pat| pat.matches_with(s, GLOB_OPTIONS)))
}

/// Resolve symlinks when the path exists, else normalize lexically.
fn real_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
}

/// Whether two existing paths name the same file.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Reject absolute paths and paths that leave `base_dir`.
///
/// # Errors
///
/// Returns `AbsolutePath` or `PathEscapesBaseDir`.
pub fn check_relpath(path: &str, base_dir: &Path) -> Result<PathBuf> {
    if Path::new(path).is_absolute() {
        return Err(Error::AbsolutePath(path.to_string()));
    }
    let base = normalize(&std::path::absolute(base_dir)?);
    let joined = normalize(&base.join(path));
    if !joined.starts_with(&base) {
        return Err(Error::PathEscapesBaseDir(path.to_string()));
    }
    Ok(joined)
}

// ── Lookup paths ──────────────────────────────────────────────

/// The expanded, deduplicated lookup directories for one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPaths {
    dirs: Vec<PathBuf>,
}

impl LookupPaths {
    /// Expand every pattern once against `base_dir`, keeping directories
    /// only. A directory reached by several patterns keeps its first slot.
    ///
    /// # Errors
    ///
    /// Returns `Glob` for malformed patterns.
    pub fn expand<S: AsRef<str>>(base_dir: &Path, patterns: &[S]) -> Result<Self> {
        let base = normalize(&std::path::absolute(base_dir)?);
        let escaped_base = Pattern::escape(&base.to_string_lossy());
        let mut dirs: Vec<PathBuf> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let joined = normalize(&Path::new(&escaped_base).join(pattern));
            let full = joined.to_string_lossy();
            for hit in glob::glob_with(&full, GLOB_OPTIONS)? {
                match hit {
                    Ok(dir) if dir.is_dir() => {
                        let dir = normalize(&dir);
                        if !dirs.contains(&dir) {
                            dirs.push(dir);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!(pattern, error = %e, "Skipping unreadable lookup path"),
                }
            }
        }
        Ok(Self { dirs })
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Lazily yield every file `input` reaches, in lookup-path order.
    ///
    /// The iterator owns its copy of `input` and only borrows `self`.
    pub fn find<'a>(&'a self, input: &str) -> impl Iterator<Item = PathBuf> + use<'a> {
        let input = input.to_owned();
        self.dirs
            .iter()
            .map(move |dir| normalize(&dir.join(&input)))
            .filter(|candidate| candidate.is_file())
    }

    /// Whether `prefix` plus any extension reaches a file other than
    /// `target` through any lookup path.
    ///
    /// `prefix` is a relative path without extension, e.g. `assets/1`
    /// matches `assets/1`, `assets/1.txt` and `assets/1.tar.gz` but not
    /// `assets/10.txt`.
    #[must_use]
    pub fn finds_other(&self, target: &Path, prefix: &str) -> bool {
        let prefix_path = Path::new(prefix);
        let Some(stem) = prefix_path.file_name().and_then(|s| s.to_str()) else {
            return false;
        };
        let dirname = prefix_path.parent().unwrap_or_else(|| Path::new(""));
        let target = real_path(target);
        for lookup in &self.dirs {
            let dir = lookup.join(dirname);
            let Ok(listing) = fs::read_dir(&dir) else {
                continue;
            };
            for item in listing.flatten() {
                let name = item.file_name();
                let Some(name) = name.to_str() else { continue };
                let has_stem = name
                    .strip_prefix(stem)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'));
                if has_stem && real_path(&item.path()) != target {
                    return true;
                }
            }
        }
        false
    }
}

/// Expand `patterns` against `base_dir`.
///
/// # Errors
///
/// Returns `Glob` for malformed patterns.
pub fn get_lookup_paths<S: AsRef<str>>(base_dir: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    LookupPaths::expand(base_dir, patterns).map(|lookup| lookup.dirs)
}

/// Every file the input path `path` reaches, in lookup-path order.
///
/// # Errors
///
/// Returns `Glob` for malformed patterns.
pub fn find_paths<S: AsRef<str>>(path: &str, base_dir: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    let lookup = LookupPaths::expand(base_dir, patterns)?;
    Ok(lookup.find(path).collect())
}

/// Shortest unambiguous input path for the existing file `dirname/name`.
///
/// Starts from `name` and prepends directory components of `dirname` one
/// at a time until exactly one file is found and it is the target. Falls
/// back to the full relative path.
///
/// # Errors
///
/// Returns `Glob` for malformed patterns.
pub fn compute_input_path<S: AsRef<str>>(
    name: &str,
    dirname: &str,
    base_dir: &Path,
    patterns: &[S],
) -> Result<String> {
    let lookup = LookupPaths::expand(base_dir, patterns)?;
    let mut parts = split_path(dirname);
    let target = normalize(&std::path::absolute(base_dir)?.join(dirname).join(name));
    let mut input = join_rel(&split_path(name));
    loop {
        let mut finder = lookup.find(&input);
        if let Some(first) = finder.next() {
            if same_file(&target, &first) && finder.next().is_none() {
                break;
            }
        }
        match parts.pop() {
            Some(part) => input = format!("{part}/{input}"),
            None => break,
        }
    }
    Ok(input)
}
