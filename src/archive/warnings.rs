//! Warning policy gate.
//!
//! Every recoverable condition the loader or dumper detects goes through
//! [`WarningLog::raise`], which consults a [`WarningPolicy`] to ignore it,
//! record and log it, or turn it into an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Recoverable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A panel is dated before the previous one.
    PanelOrder,
    /// Two consecutive panels share a date.
    DuplicateDate,
    /// Main or insight entries are out of time order.
    EntryOrder,
    /// Main and insight entries are interleaved.
    EntryPlacement,
    /// Unknown keys in a panel or entry object.
    IgnoredKeys,
    /// Inline text declared a non-UTF-8 encoding.
    EncodingOverride,
    /// An input path matched more than one file.
    AmbiguousPath,
    /// An export name is not the shortest reachable path to its file.
    ShadowedExport,
    /// A computed input path resolves to more than one file.
    AmbiguousInputPath,
}

impl WarningKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PanelOrder => "panel order",
            Self::DuplicateDate => "duplicate date",
            Self::EntryOrder => "entry order",
            Self::EntryPlacement => "entry placement",
            Self::IgnoredKeys => "ignored keys",
            Self::EncodingOverride => "encoding override",
            Self::AmbiguousPath => "ambiguous path",
            Self::ShadowedExport => "shadowed export",
            Self::AmbiguousInputPath => "ambiguous input path",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with one kind of warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Ignore,
    Warn,
    Error,
}

/// Per-kind warning handling.
///
/// Resolution order: `suppress_all` wins, then a per-kind override, then
/// `error_on_warning`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningPolicy {
    pub suppress_all: bool,
    pub error_on_warning: bool,
    pub overrides: BTreeMap<WarningKind, Action>,
}

impl WarningPolicy {
    /// Policy that turns every warning into an error.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            error_on_warning: true,
            ..Self::default()
        }
    }

    /// Policy that drops every warning.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            suppress_all: true,
            ..Self::default()
        }
    }

    /// Builder-style per-kind override.
    #[must_use]
    pub fn with(mut self, kind: WarningKind, action: Action) -> Self {
        self.overrides.insert(kind, action);
        self
    }

    #[must_use]
    pub fn action(&self, kind: WarningKind) -> Action {
        if self.suppress_all {
            return Action::Ignore;
        }
        if let Some(action) = self.overrides.get(&kind) {
            return *action;
        }
        if self.error_on_warning {
            Action::Error
        } else {
            Action::Warn
        }
    }
}

/// A warning that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

/// Warnings recorded by a loader or dumper.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    records: Vec<Warning>,
}

impl WarningLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a warning through `policy`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Warning` when the policy promotes `kind`.
    pub fn raise(
        &mut self,
        policy: &WarningPolicy,
        kind: WarningKind,
        message: impl Into<String>,
    ) -> Result<()> {
        let message = message.into();
        match policy.action(kind) {
            Action::Ignore => {
                debug!(kind = %kind, message = %message, "Warning suppressed");
                Ok(())
            }
            Action::Warn => {
                warn!(kind = %kind, "{message}");
                self.records.push(Warning { kind, message });
                Ok(())
            }
            Action::Error => Err(Error::Warning { kind, message }),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn count(&self, kind: WarningKind) -> usize {
        self.records.iter().filter(|w| w.kind == kind).count()
    }

    #[must_use]
    pub fn contains(&self, kind: WarningKind) -> bool {
        self.count(kind) > 0
    }

    /// Drain the recorded warnings.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.records)
    }
}
