//! Error types for Perspective archives.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - A category per code (structural, type mismatch, warning, resource, ...)
//! - Context-aware recovery hints
//! - Structured JSON output for tooling built on top of the crate

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::WarningKind;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Category ────────────────────────────────────────────

/// Broad classes of failure.
///
/// Structural and type-mismatch errors abort the element being loaded.
/// Warnings only surface here once a policy promoted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Structural,
    TypeMismatch,
    Warning,
    Resource,
    Validation,
    Content,
    Registry,
    Io,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Structural => "structural",
            Self::TypeMismatch => "type_mismatch",
            Self::Warning => "warning",
            Self::Resource => "resource",
            Self::Validation => "validation",
            Self::Content => "content",
            Self::Registry => "registry",
            Self::Io => "io",
        }
    }
}

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Structural
    MissingField,
    ConflictingFields,
    MissingOneOf,
    InvalidTimeZone,
    InvalidDate,
    InvalidTime,
    TimeZoneNotProvided,
    InvalidValue,

    // Type mismatch
    TypeMismatch,

    // Promoted warning
    Warning,

    // Resource
    BaseDirNotSet,
    PathEscapesBaseDir,
    PathNotFound,
    UnreachableInputPath,
    ExportNameExhausted,
    ContentMismatch,
    DateNotFound,

    // Model validation
    EntryBeforePanel,
    InsightTooEarly,
    EntryAlreadyAdded,
    EntryNotInPanel,

    // Content
    UnknownEncoding,
    UndecodableText,
    UnknownDataEncoding,
    InvalidTransportData,

    // Registry
    RegistryError,

    // I/O
    IoError,
    JsonError,
    GlobError,
    ConfigError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::ConflictingFields => "CONFLICTING_FIELDS",
            Self::MissingOneOf => "MISSING_ONE_OF",
            Self::InvalidTimeZone => "INVALID_TIME_ZONE",
            Self::InvalidDate => "INVALID_DATE",
            Self::InvalidTime => "INVALID_TIME",
            Self::TimeZoneNotProvided => "TIME_ZONE_NOT_PROVIDED",
            Self::InvalidValue => "INVALID_VALUE",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::Warning => "WARNING",
            Self::BaseDirNotSet => "BASE_DIR_NOT_SET",
            Self::PathEscapesBaseDir => "PATH_ESCAPES_BASE_DIR",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::UnreachableInputPath => "UNREACHABLE_INPUT_PATH",
            Self::ExportNameExhausted => "EXPORT_NAME_EXHAUSTED",
            Self::ContentMismatch => "CONTENT_MISMATCH",
            Self::DateNotFound => "DATE_NOT_FOUND",
            Self::EntryBeforePanel => "ENTRY_BEFORE_PANEL",
            Self::InsightTooEarly => "INSIGHT_TOO_EARLY",
            Self::EntryAlreadyAdded => "ENTRY_ALREADY_ADDED",
            Self::EntryNotInPanel => "ENTRY_NOT_IN_PANEL",
            Self::UnknownEncoding => "UNKNOWN_ENCODING",
            Self::UndecodableText => "UNDECODABLE_TEXT",
            Self::UnknownDataEncoding => "UNKNOWN_DATA_ENCODING",
            Self::InvalidTransportData => "INVALID_TRANSPORT_DATA",
            Self::RegistryError => "REGISTRY_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::GlobError => "GLOB_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }

    /// Category this code belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField
            | Self::ConflictingFields
            | Self::MissingOneOf
            | Self::InvalidTimeZone
            | Self::InvalidDate
            | Self::InvalidTime
            | Self::TimeZoneNotProvided
            | Self::InvalidValue => ErrorCategory::Structural,
            Self::TypeMismatch => ErrorCategory::TypeMismatch,
            Self::Warning => ErrorCategory::Warning,
            Self::BaseDirNotSet
            | Self::PathEscapesBaseDir
            | Self::PathNotFound
            | Self::UnreachableInputPath
            | Self::ExportNameExhausted
            | Self::ContentMismatch
            | Self::DateNotFound => ErrorCategory::Resource,
            Self::EntryBeforePanel
            | Self::InsightTooEarly
            | Self::EntryAlreadyAdded
            | Self::EntryNotInPanel => ErrorCategory::Validation,
            Self::UnknownEncoding
            | Self::UndecodableText
            | Self::UnknownDataEncoding
            | Self::InvalidTransportData => ErrorCategory::Content,
            Self::RegistryError => ErrorCategory::Registry,
            Self::IoError | Self::JsonError | Self::GlobError | Self::ConfigError => {
                ErrorCategory::Io
            }
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while building, loading or dumping archives.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{context} must provide {field}")]
    MissingField { context: &'static str, field: &'static str },

    #[error("exactly one of '{first}' and '{second}' can be provided")]
    ConflictingFields { first: &'static str, second: &'static str },

    #[error("{context} must provide one of '{first}' and '{second}'")]
    MissingOneOf {
        context: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid time zone string: {0:?}")]
    InvalidTimeZone(String),

    #[error("invalid date string: {0:?}")]
    InvalidDate(String),

    #[error("invalid time string: {0:?}")]
    InvalidTime(String),

    #[error("invalid date-time string: {0:?}")]
    InvalidDateTime(String),

    #[error("time zone is not provided for {0:?}")]
    TimeZoneNotProvided(String),

    #[error("{key:?}: invalid value {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("{key:?}{location}: expected {expected}, got {got}")]
    TypeMismatch {
        key: String,
        location: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{kind}: {message}")]
    Warning { kind: WarningKind, message: String },

    #[error("base directory must be set to {0}")]
    BaseDirNotSet(&'static str),

    #[error("{0:?} is absolute")]
    AbsolutePath(String),

    #[error("{0:?} is beyond the base directory")]
    PathEscapesBaseDir(String),

    #[error("cannot find path {path:?} (base directory {base_dir})")]
    PathNotFound { path: String, base_dir: PathBuf },

    #[error("unreachable input path {0:?}")]
    UnreachableInputPath(String),

    #[error("failed to generate a file name for {name:?} (with directory name {dirname:?})")]
    ExportNameExhausted { name: String, dirname: String },

    #[error("entry raw data differs from the content of {path}")]
    ContentMismatch { path: PathBuf },

    #[error("date {0} not found in the archive")]
    DateNotFound(String),

    #[error("entry time ({time}) is earlier than the panel date ({panel_date}) in local time")]
    EntryBeforePanel { time: String, panel_date: String },

    #[error(
        "entry is an insight and its time ({time}) is less than 2 days after \
         the panel date ({panel_date}) in local time"
    )]
    InsightTooEarly { time: String, panel_date: String },

    #[error("entry was already added to this panel")]
    EntryAlreadyAdded,

    #[error("entry is not in this panel")]
    EntryNotInPanel,

    #[error("unknown text encoding: {0:?}")]
    UnknownEncoding(String),

    #[error("data cannot be decoded as {0}")]
    UndecodableText(String),

    #[error("invalid data encoding: {0:?}")]
    UnknownDataEncoding(String),

    #[error("invalid {codec} data: {message}")]
    InvalidTransportData { codec: String, message: String },

    #[error("{0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid lookup path pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::ConflictingFields { .. } => ErrorCode::ConflictingFields,
            Self::MissingOneOf { .. } => ErrorCode::MissingOneOf,
            Self::InvalidTimeZone(_) => ErrorCode::InvalidTimeZone,
            Self::InvalidDate(_) => ErrorCode::InvalidDate,
            Self::InvalidTime(_) | Self::InvalidDateTime(_) => ErrorCode::InvalidTime,
            Self::TimeZoneNotProvided(_) => ErrorCode::TimeZoneNotProvided,
            Self::InvalidValue { .. } => ErrorCode::InvalidValue,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Warning { .. } => ErrorCode::Warning,
            Self::BaseDirNotSet(_) => ErrorCode::BaseDirNotSet,
            Self::AbsolutePath(_) | Self::PathEscapesBaseDir(_) => ErrorCode::PathEscapesBaseDir,
            Self::PathNotFound { .. } => ErrorCode::PathNotFound,
            Self::UnreachableInputPath(_) => ErrorCode::UnreachableInputPath,
            Self::ExportNameExhausted { .. } => ErrorCode::ExportNameExhausted,
            Self::ContentMismatch { .. } => ErrorCode::ContentMismatch,
            Self::DateNotFound(_) => ErrorCode::DateNotFound,
            Self::EntryBeforePanel { .. } => ErrorCode::EntryBeforePanel,
            Self::InsightTooEarly { .. } => ErrorCode::InsightTooEarly,
            Self::EntryAlreadyAdded => ErrorCode::EntryAlreadyAdded,
            Self::EntryNotInPanel => ErrorCode::EntryNotInPanel,
            Self::UnknownEncoding(_) => ErrorCode::UnknownEncoding,
            Self::UndecodableText(_) => ErrorCode::UndecodableText,
            Self::UnknownDataEncoding(_) => ErrorCode::UnknownDataEncoding,
            Self::InvalidTransportData { .. } => ErrorCode::InvalidTransportData,
            Self::Registry(_) => ErrorCode::RegistryError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Glob(_) => ErrorCode::GlobError,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Category of this error, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.error_code().category()
    }

    /// Whether this error is a warning that a policy promoted to fatal.
    #[must_use]
    pub const fn is_promoted_warning(&self) -> bool {
        matches!(self, Self::Warning { .. })
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::TimeZoneNotProvided(_) => Some(
                "Add an offset to the time string, or set 'tz' on the entry, \
                 its panel, or the top level of the archive"
                    .to_string(),
            ),
            Self::InvalidTimeZone(_) => {
                Some("Valid time zones: UTC, GMT, +HH:MM, -HH:MM, UTC+HH:MM".to_string())
            }
            Self::BaseDirNotSet(_) => Some(
                "Configure a base directory so external input paths can be resolved".to_string(),
            ),
            Self::PathNotFound { .. } | Self::UnreachableInputPath(_) => Some(
                "Check the 'paths' lookup list and that the file exists under the base directory"
                    .to_string(),
            ),
            Self::ContentMismatch { path } => Some(format!(
                "{} already exists with different content; it is never overwritten",
                path.display()
            )),
            Self::ExportNameExhausted { .. } => Some(
                "Raise the export candidate limit or clean up the export directory".to_string(),
            ),
            Self::InsightTooEarly { .. } => Some(
                "Insight entries must be at least 2 days after their panel \
                 (1 day when they fall on a Sunday)"
                    .to_string(),
            ),
            Self::UnknownDataEncoding(_) => Some(
                "Valid data encodings: base16, base32, base64, base64_url, ascii85, base85"
                    .to_string(),
            ),
            Self::Warning { .. } => Some(
                "This warning was promoted to an error by the warning policy".to_string(),
            ),
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "category": code.category().as_str(),
                "message": self.to_string(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_categories() {
        let err = Error::MissingField { context: "panel", field: "date" };
        assert_eq!(err.error_code(), ErrorCode::MissingField);
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert_eq!(err.to_string(), "panel must provide date");

        let err = Error::TypeMismatch {
            key: "date".into(),
            location: String::new(),
            expected: "a string",
            got: "number",
        };
        assert_eq!(err.category(), ErrorCategory::TypeMismatch);
        assert_eq!(err.to_string(), "\"date\": expected a string, got number");
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::TimeZoneNotProvided("10:00".into());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "TIME_ZONE_NOT_PROVIDED");
        assert_eq!(json["error"]["category"], "structural");
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_promoted_warning() {
        let err = Error::Warning {
            kind: WarningKind::AmbiguousPath,
            message: "found more than one path".into(),
        };
        assert!(err.is_promoted_warning());
        assert_eq!(err.category(), ErrorCategory::Warning);
        assert!(err.to_string().starts_with("ambiguous path"));
    }
}
