//! File type registry.
//!
//! Maps type names to a text/binary flag, an ordered extension list (the
//! first extension is the default one) and a set of aliases. Registries
//! are plain values: the loader and dumper each receive one explicitly.

pub mod inference;

pub use inference::{ContentSource, InferenceManager, Inferred};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default type for text whose type cannot be inferred.
pub const DEFAULT_TEXT_TYPE: &str = "plain";

/// Default type for binary data whose type cannot be inferred.
pub const DEFAULT_BINARY_TYPE: &str = "binary";

// ── Built-in types ────────────────────────────────────────────

/// (name, is text, extensions, aliases)
type TypeRow = (&'static str, bool, &'static [&'static str], &'static [&'static str]);

const BUILTIN_TYPES: &[TypeRow] = &[
    ("plain", true, &[".txt"], &[]),
    ("binary", false, &[], &[]),
    ("markdown", true, &[".md", ".markdown"], &["md"]),
    ("html", true, &[".html"], &[]),
    ("css", true, &[".css"], &[]),
    ("tex", true, &[".tex", ".sty", ".cls", ".dtx"], &[]),
    ("xml", true, &[".xml"], &[]),
    ("json", true, &[".json"], &[]),
    ("yaml", true, &[".yaml", ".yml"], &["yml"]),
    // archives
    ("zip", false, &[".zip"], &[]),
    ("tar", false, &[".tar"], &[]),
    ("gztar", false, &[".tar.gz", ".tgz"], &["targz"]),
    ("bztar", false, &[".tar.bz2", ".tbz"], &["tarbz"]),
    ("gz", false, &[".gz"], &[]),
    ("bz", false, &[".bz2"], &[]),
    // source code
    ("python", true, &[".py"], &[]),
    ("c", true, &[".c"], &[]),
    ("c++", true, &[".cc", ".cpp"], &[]),
    ("java", true, &[".java"], &[]),
    ("javascript", true, &[".js"], &[]),
    ("perl", true, &[".pl"], &[]),
    // images
    ("png", false, &[".png"], &[]),
    ("jpeg", false, &[".jpg", ".jpeg"], &["jpg"]),
    ("tiff", false, &[".tiff"], &[]),
    ("heif", false, &[".heif", ".heic"], &[]),
    // video
    ("mp4", false, &[".mp4"], &[]),
    ("mov", false, &[".mov"], &[]),
    ("wmv", false, &[".wmv"], &[]),
    ("avi", false, &[".avi"], &[]),
    // audio
    ("mp3", false, &[".mp3"], &[]),
    ("flac", false, &[".flac"], &[]),
    ("wav", false, &[".wav"], &[]),
    ("m4a", false, &[".m4a"], &[]),
    ("aiff", false, &[".aiff"], &[]),
    ("midi", false, &[".midi"], &[]),
    // documents
    ("pdf", false, &[".pdf"], &[]),
    ("docx", false, &[".docx"], &["word", "word_open_xml"]),
    ("doc", false, &[".doc"], &["word_binary"]),
    ("pptx", false, &[".pptx"], &["powerpoint", "powerpoint_open_xml"]),
    ("ppt", false, &[".ppt"], &["powerpoint_binary"]),
    ("xlsx", false, &[".xlsx"], &["excel", "excel_open_xml"]),
    ("xls", false, &[".xls"], &["excel_binary"]),
    // music notation
    ("musescore", false, &[".mscz"], &["musescore_compressed"]),
    ("musescore_uncompressed", true, &[".mscx"], &[]),
    ("lilypond", true, &[".ly"], &[]),
    ("lilypond_tex", true, &[".lytex"], &[]),
];

static DEFAULT_REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(|| {
    let mut registry = TypeRegistry::empty();
    for &(name, is_text, exts, aliases) in BUILTIN_TYPES {
        // the table is consistent, so registration cannot collide
        let _ = registry.add_type(name, is_text, exts, aliases);
    }
    registry
});

// ── Type definitions ──────────────────────────────────────────

/// A full description of one registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub text: bool,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

// ── Registry ──────────────────────────────────────────────────

/// Type ↔ extension ↔ alias lookup tables.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, bool>,
    type_exts: HashMap<String, Vec<String>>,
    ext_to_type: HashMap<String, String>,
    alias_to_type: HashMap<String, String>,
}

impl Default for TypeRegistry {
    /// The built-in registry of common text and binary types.
    fn default() -> Self {
        DEFAULT_REGISTRY.clone()
    }
}

fn registry_err(msg: String) -> Error {
    Error::Registry(msg)
}

fn check_extension(ext: &str) -> Result<()> {
    if !ext.starts_with('.') || ext.len() < 2 || ext.contains(['/', '\\']) {
        return Err(registry_err(format!("invalid file extension: {ext:?}")));
    }
    Ok(())
}

impl TypeRegistry {
    /// A registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
            type_exts: HashMap::new(),
            ext_to_type: HashMap::new(),
            alias_to_type: HashMap::new(),
        }
    }

    /// Register a new type.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the name, any extension or any alias is
    /// already registered, or an extension is malformed. Nothing is
    /// registered on error.
    pub fn add_type<E, A>(&mut self, name: &str, is_text: bool, exts: E, aliases: A) -> Result<()>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let exts: Vec<String> = exts.into_iter().map(|e| e.as_ref().to_string()).collect();
        let aliases: Vec<String> = aliases.into_iter().map(|a| a.as_ref().to_string()).collect();

        if self.has_type(name) {
            return Err(registry_err(format!("file type {name:?} has already been registered")));
        }
        if self.has_alias(name) {
            return Err(registry_err(format!("file type {name:?} is registered as an alias")));
        }
        for ext in &exts {
            check_extension(ext)?;
            if self.has_extension(ext) {
                return Err(registry_err(format!("extension {ext:?} has already been registered")));
            }
        }
        for alias in &aliases {
            if self.has_alias(alias) || self.has_type(alias) || alias == name {
                return Err(registry_err(format!("alias {alias:?} has already been registered")));
            }
        }

        self.types.insert(name.to_string(), is_text);
        for ext in &exts {
            self.ext_to_type.insert(ext.clone(), name.to_string());
        }
        self.type_exts.insert(name.to_string(), exts);
        for alias in aliases {
            self.alias_to_type.insert(alias, name.to_string());
        }
        Ok(())
    }

    /// Register a type from its full definition.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::add_type`].
    pub fn register(&mut self, def: &TypeDef) -> Result<()> {
        self.add_type(&def.name, def.text, &def.extensions, &def.aliases)
    }

    /// Append an extension to a registered type.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the type is unknown or the extension is taken.
    pub fn add_extension(&mut self, ext: &str, name: &str) -> Result<()> {
        check_extension(ext)?;
        if !self.has_type(name) {
            return Err(registry_err(format!("file type {name:?} is not registered")));
        }
        if self.has_extension(ext) {
            return Err(registry_err(format!("extension {ext:?} has already been registered")));
        }
        self.type_exts
            .entry(name.to_string())
            .or_default()
            .push(ext.to_string());
        self.ext_to_type.insert(ext.to_string(), name.to_string());
        Ok(())
    }

    /// Make `ext` the default extension of `name`, registering it if new.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the type is unknown or the extension belongs
    /// to another type.
    pub fn set_default_extension(&mut self, name: &str, ext: &str) -> Result<()> {
        check_extension(ext)?;
        if !self.has_type(name) {
            return Err(registry_err(format!("file type {name:?} is not registered")));
        }
        if let Some(owner) = self.extension_to_type(ext) {
            if owner != name {
                return Err(registry_err(format!(
                    "cannot set default extension for {name:?} to {ext:?} as it is \
                     registered as an extension for {owner:?}"
                )));
            }
        }
        let exts = self.type_exts.entry(name.to_string()).or_default();
        exts.retain(|e| e != ext);
        exts.insert(0, ext.to_string());
        self.ext_to_type.insert(ext.to_string(), name.to_string());
        Ok(())
    }

    /// Register `alias` as another name for `name`.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the type is unknown, or the alias is already a
    /// type or an alias.
    pub fn add_alias(&mut self, alias: &str, name: &str) -> Result<()> {
        if !self.has_type(name) {
            return Err(registry_err(format!("file type {name:?} is not registered")));
        }
        if self.has_type(alias) {
            return Err(registry_err(format!("alias {alias:?} is registered as a file type")));
        }
        if self.has_alias(alias) {
            return Err(registry_err(format!("alias {alias:?} is already registered")));
        }
        self.alias_to_type.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    /// Remove a type along with its extensions and aliases.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the type is not registered.
    pub fn remove_type(&mut self, name: &str) -> Result<TypeDef> {
        let def = self
            .get_type(name)
            .ok_or_else(|| registry_err(format!("file type {name:?} is not registered")))?;
        self.types.remove(name);
        self.type_exts.remove(name);
        for ext in &def.extensions {
            self.ext_to_type.remove(ext);
        }
        for alias in &def.aliases {
            self.alias_to_type.remove(alias);
        }
        Ok(def)
    }

    /// Remove an extension, returning the type it belonged to.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the extension is not registered.
    pub fn remove_extension(&mut self, ext: &str) -> Result<String> {
        let name = self
            .ext_to_type
            .remove(ext)
            .ok_or_else(|| registry_err(format!("extension {ext:?} is not registered")))?;
        if let Some(exts) = self.type_exts.get_mut(&name) {
            exts.retain(|e| e != ext);
        }
        Ok(name)
    }

    /// Remove an alias, returning the type it pointed to.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the alias is not registered.
    pub fn remove_alias(&mut self, alias: &str) -> Result<String> {
        self.alias_to_type
            .remove(alias)
            .ok_or_else(|| registry_err(format!("alias {alias:?} is not registered")))
    }

    // ── Lookups ───────────────────────────────────────────────

    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[must_use]
    pub fn has_extension(&self, ext: &str) -> bool {
        self.ext_to_type.contains_key(ext)
    }

    #[must_use]
    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_to_type.contains_key(alias)
    }

    /// Whether `name` is a text type; `None` if unregistered.
    #[must_use]
    pub fn is_text_type(&self, name: &str) -> Option<bool> {
        self.types.get(name).copied()
    }

    #[must_use]
    pub fn extension_to_type(&self, ext: &str) -> Option<&str> {
        self.ext_to_type.get(ext).map(String::as_str)
    }

    /// First extension registered for `name`.
    #[must_use]
    pub fn default_extension(&self, name: &str) -> Option<&str> {
        self.type_exts
            .get(name)
            .and_then(|exts| exts.first())
            .map(String::as_str)
    }

    /// Resolve an alias to its canonical type name; other names pass
    /// through unchanged.
    #[must_use]
    pub fn alias_check<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias_to_type.get(name).map_or(name, String::as_str)
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<TypeDef> {
        let text = *self.types.get(name)?;
        let mut aliases: Vec<String> = self
            .alias_to_type
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        Some(TypeDef {
            name: name.to_string(),
            text,
            extensions: self.type_exts.get(name).cloned().unwrap_or_default(),
            aliases,
        })
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.ext_to_type.keys().map(String::as_str)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.alias_to_type.keys().map(String::as_str)
    }

    /// Look up the type of a file path by its extension.
    ///
    /// Multi-dot extensions are tried longest first, so `a.tar.gz` is
    /// `gztar` rather than `gz`. The leading dot of a hidden file does not
    /// start an extension.
    #[must_use]
    pub fn type_for_path(&self, path: impl AsRef<Path>) -> Option<&str> {
        let file_name = path.as_ref().file_name()?.to_str()?;
        let stem_start = usize::from(file_name.starts_with('.'));
        let name = &file_name[stem_start..];
        // every '.' after the first character starts a candidate suffix
        name.char_indices()
            .filter(|&(i, c)| c == '.' && i > 0)
            .find_map(|(i, _)| self.extension_to_type(&name[i..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let reg = TypeRegistry::default();
        assert_eq!(reg.is_text_type("plain"), Some(true));
        assert_eq!(reg.is_text_type("binary"), Some(false));
        assert_eq!(reg.is_text_type("nope"), None);
        assert_eq!(reg.default_extension("plain"), Some(".txt"));
        assert_eq!(reg.default_extension("binary"), None);
        assert_eq!(reg.alias_check("md"), "markdown");
        assert_eq!(reg.alias_check("markdown"), "markdown");
        assert_eq!(reg.alias_check("unknown"), "unknown");
    }

    #[test]
    fn test_type_for_path_multi_dot() {
        let reg = TypeRegistry::default();
        assert_eq!(reg.type_for_path("a/b/archive.tar.gz"), Some("gztar"));
        assert_eq!(reg.type_for_path("x.gz"), Some("gz"));
        assert_eq!(reg.type_for_path("notes.v2.md"), Some("markdown"));
        assert_eq!(reg.type_for_path("README"), None);
        // hidden file without extension
        assert_eq!(reg.type_for_path(".txt"), None);
        assert_eq!(reg.type_for_path(".hidden.txt"), Some("plain"));
        assert_eq!(reg.type_for_path("weird.unknown"), None);
    }

    #[test]
    fn test_add_type_conflicts() {
        let mut reg = TypeRegistry::default();
        assert!(reg.add_type("plain", true, [".text"], [] as [&str; 0]).is_err());
        assert!(reg.add_type("notes", true, [".txt"], [] as [&str; 0]).is_err());
        assert!(reg.add_type("notes", true, ["txt"], [] as [&str; 0]).is_err());
        assert!(reg.add_type("notes", true, [".note"], ["md"]).is_err());
        // failed attempts registered nothing
        assert!(!reg.has_type("notes"));

        reg.add_type("notes", true, [".note", ".notes"], ["nt"]).unwrap();
        assert_eq!(reg.type_for_path("today.note"), Some("notes"));
        assert_eq!(reg.alias_check("nt"), "notes");
    }

    #[test]
    fn test_default_extension_and_removal() {
        let mut reg = TypeRegistry::default();
        reg.set_default_extension("jpeg", ".jpeg").unwrap();
        assert_eq!(reg.default_extension("jpeg"), Some(".jpeg"));
        assert!(reg.set_default_extension("jpeg", ".png").is_err());

        assert_eq!(reg.remove_extension(".jpeg").unwrap(), "jpeg");
        assert_eq!(reg.default_extension("jpeg"), Some(".jpg"));

        let def = reg.remove_type("jpeg").unwrap();
        assert_eq!(def.extensions, vec![".jpg".to_string()]);
        assert_eq!(def.aliases, vec!["jpg".to_string()]);
        assert!(!reg.has_extension(".jpg"));
        assert!(!reg.has_alias("jpg"));
        assert!(reg.remove_type("jpeg").is_err());
    }

    #[test]
    fn test_alias_rules() {
        let mut reg = TypeRegistry::default();
        assert!(reg.add_alias("plain", "markdown").is_err());
        assert!(reg.add_alias("md", "plain").is_err());
        assert!(reg.add_alias("x", "missing").is_err());
        reg.add_alias("txt", "plain").unwrap();
        assert_eq!(reg.remove_alias("txt").unwrap(), "plain");
        assert!(reg.remove_alias("txt").is_err());
    }

    #[test]
    fn test_register_typedef() {
        let mut reg = TypeRegistry::empty();
        let def = TypeDef {
            name: "org".into(),
            text: true,
            extensions: vec![".org".into()],
            aliases: vec!["orgmode".into()],
        };
        reg.register(&def).unwrap();
        assert_eq!(reg.get_type("org"), Some(def));
        assert_eq!(reg.types().collect::<Vec<_>>(), vec!["org"]);
    }
}
