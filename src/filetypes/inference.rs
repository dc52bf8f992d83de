//! Type and encoding inference.
//!
//! Three pure lookups (encoding → type, type → encoding, path → type)
//! plus the compound policy the loader applies to every entry, and the
//! reverse rules the dumper uses to decide which fields it can omit.

use std::path::Path;

use super::{DEFAULT_BINARY_TYPE, DEFAULT_TEXT_TYPE, TypeRegistry};
use crate::model::text::{self, BINARY, UTF8};

/// How an entry's content was supplied in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource<'a> {
    /// Inline `data` without `data-encoding`.
    InlineText,
    /// Inline `data` with a transport `data-encoding`.
    TransportData,
    /// An external `input` path.
    InputPath(&'a str),
}

/// Outcome of the compound inference policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inferred {
    pub kind: String,
    pub encoding: String,
    /// Declared encoding that inline text forced to UTF-8.
    pub overridden_encoding: Option<String>,
}

/// Inference rules over an explicit type registry.
#[derive(Debug, Clone, Default)]
pub struct InferenceManager {
    registry: TypeRegistry,
}

impl InferenceManager {
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn alias_check<'a>(&'a self, name: &'a str) -> &'a str {
        self.registry.alias_check(name)
    }

    /// Type implied by an encoding; `None` when no encoding was given.
    #[must_use]
    pub fn type_for_encoding(&self, encoding: Option<&str>) -> Option<&'static str> {
        encoding.map(|enc| {
            if enc == BINARY {
                DEFAULT_BINARY_TYPE
            } else {
                DEFAULT_TEXT_TYPE
            }
        })
    }

    /// Encoding implied by a type; `None` for unregistered types.
    #[must_use]
    pub fn encoding_for_type(&self, kind: &str) -> Option<&'static str> {
        self.registry
            .is_text_type(kind)
            .map(|is_text| if is_text { UTF8 } else { BINARY })
    }

    #[must_use]
    pub fn type_for_path(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.registry.type_for_path(path)
    }

    /// Apply the compound policy to the fields an entry supplied.
    ///
    /// `kind` should already be alias-resolved.
    #[must_use]
    pub fn infer(
        &self,
        source: ContentSource<'_>,
        kind: Option<&str>,
        encoding: Option<&str>,
    ) -> Inferred {
        match source {
            ContentSource::InlineText => {
                let overridden_encoding = encoding
                    .filter(|enc| !text::is_utf8(enc))
                    .map(str::to_string);
                let kind = kind
                    .or_else(|| self.type_for_encoding(Some(UTF8)))
                    .unwrap_or(DEFAULT_TEXT_TYPE);
                Inferred {
                    kind: kind.to_string(),
                    encoding: UTF8.to_string(),
                    overridden_encoding,
                }
            }
            ContentSource::TransportData => {
                let kind = kind
                    .or_else(|| self.type_for_encoding(encoding))
                    .unwrap_or(DEFAULT_BINARY_TYPE);
                self.settle_encoding(kind, encoding)
            }
            ContentSource::InputPath(path) => {
                let kind = kind
                    .or_else(|| self.type_for_path(path))
                    .or_else(|| self.type_for_encoding(encoding))
                    .unwrap_or(DEFAULT_BINARY_TYPE);
                self.settle_encoding(kind, encoding)
            }
        }
    }

    fn settle_encoding(&self, kind: &str, encoding: Option<&str>) -> Inferred {
        let encoding = encoding
            .or_else(|| self.encoding_for_type(kind))
            .unwrap_or(BINARY);
        Inferred {
            kind: kind.to_string(),
            encoding: encoding.to_string(),
            overridden_encoding: None,
        }
    }

    // ── Reverse rules ─────────────────────────────────────────

    /// Whether inline text of type `kind` needs an explicit `type` key.
    #[must_use]
    pub fn inline_text_needs_type(&self, kind: &str) -> bool {
        let implied = self
            .type_for_encoding(Some(UTF8))
            .unwrap_or(DEFAULT_TEXT_TYPE);
        implied != kind
    }

    /// Which of `type` and `encoding` must be written for binary-style
    /// data (transport-encoded, or exported with an unknown extension).
    #[must_use]
    pub fn binary_fields(&self, kind: &str, encoding: &str) -> FieldNeeds {
        let implied_type = self.type_for_encoding(None).unwrap_or(DEFAULT_BINARY_TYPE);
        let implied_enc = self.encoding_for_type(kind).unwrap_or(BINARY);
        if implied_type == kind && implied_enc == encoding {
            return FieldNeeds::default();
        }
        let from_enc = self
            .type_for_encoding(Some(encoding))
            .unwrap_or(DEFAULT_BINARY_TYPE);
        if from_enc == kind {
            FieldNeeds {
                kind: false,
                encoding: true,
            }
        } else {
            FieldNeeds {
                kind: true,
                encoding: implied_enc != encoding,
            }
        }
    }

    /// Which fields an exported entry needs, given its input path.
    #[must_use]
    pub fn input_fields(&self, input_path: &str, kind: &str, encoding: &str) -> FieldNeeds {
        match self.type_for_path(input_path) {
            Some(path_type) => {
                let implied_enc = self.encoding_for_type(kind).unwrap_or(BINARY);
                FieldNeeds {
                    kind: path_type != kind,
                    encoding: implied_enc != encoding,
                }
            }
            None => self.binary_fields(kind, encoding),
        }
    }
}

/// Fields the dumper must write for inference to reproduce an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldNeeds {
    pub kind: bool,
    pub encoding: bool,
}
