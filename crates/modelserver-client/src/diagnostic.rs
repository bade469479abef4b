//! Validation diagnostics as severity-bitmask trees.
//!
//! A [`Diagnostic`] mirrors the tree the model server returns from
//! validation: each node carries a [`Severity`] bitmask, and problem nodes
//! without children are the leaves reported to users. Merging several
//! results produces a fresh tree whose ids are rewritten path-style.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{self, DecodeError, TypeGuard};

/// Severity bitmask. Flags combine with `|` and are tested independently.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Severity(u8);

impl Severity {
    /// No problem.
    pub const OK: Self = Self(0);
    /// Informational.
    pub const INFO: Self = Self(1);
    /// Warning.
    pub const WARNING: Self = Self(2);
    /// Error.
    pub const ERROR: Self = Self(4);
    /// Validation was cancelled; outranks everything else.
    pub const CANCEL: Self = Self(8);

    /// Builds a severity from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `flag` is set. `OK` is never contained.
    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }

    /// Whether no bit is set.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Label of the most significant flag present.
    #[must_use]
    pub const fn label(self) -> SeverityLabel {
        if self.contains(Self::CANCEL) {
            SeverityLabel::Cancel
        } else if self.contains(Self::ERROR) {
            SeverityLabel::Error
        } else if self.contains(Self::WARNING) {
            SeverityLabel::Warning
        } else if self.contains(Self::INFO) {
            SeverityLabel::Info
        } else {
            SeverityLabel::Ok
        }
    }
}

impl BitOr for Severity {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Severity {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Display label for a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityLabel {
    /// No flag set.
    Ok,
    /// [`Severity::INFO`] is the most significant flag.
    Info,
    /// [`Severity::WARNING`] is the most significant flag.
    Warning,
    /// [`Severity::ERROR`] is the most significant flag.
    Error,
    /// [`Severity::CANCEL`] is set.
    Cancel,
}

impl SeverityLabel {
    /// Upper-case label text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validation result tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity bitmask of this node.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Validator that produced the node.
    #[serde(default)]
    pub source: String,
    /// Validator-specific code.
    #[serde(default)]
    pub code: i64,
    /// Objects the diagnostic refers to.
    #[serde(default)]
    pub data: Vec<Value>,
    /// Nested diagnostics.
    #[serde(default)]
    pub children: Vec<Diagnostic>,
    /// Path-style id within the tree.
    #[serde(default)]
    pub id: String,
}

/// Guard for diagnostic payloads.
pub const DIAGNOSTIC: TypeGuard<Diagnostic> = TypeGuard::new("diagnostic", decode::is_diagnostic);

const ROOT_ID: &str = "/";

impl Diagnostic {
    /// Builds a childless diagnostic.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: String::new(),
            code: 0,
            data: Vec::new(),
            children: Vec::new(),
            id: String::from(ROOT_ID),
        }
    }

    /// The canonical zero-severity diagnostic.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Severity::OK, "OK")
    }

    /// Sets the producing validator.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the validator code.
    #[must_use]
    pub const fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Attaches referenced data.
    #[must_use]
    pub fn with_data(mut self, data: Vec<Value>) -> Self {
        self.data = data;
        self
    }

    /// Appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Narrows an untyped payload into a diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the payload is not a diagnostic tree.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        decode::decode(value, &DIAGNOSTIC)
    }

    /// Whether the node reports no problem.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.severity.is_ok()
    }

    /// Label of this node's severity.
    #[must_use]
    pub const fn severity_label(&self) -> SeverityLabel {
        self.severity.label()
    }

    /// Combines several diagnostics into one.
    ///
    /// OK nodes are dropped. No survivors yields [`Diagnostic::ok`]; a single
    /// survivor is returned unchanged. Otherwise a new parent takes severity,
    /// source and code from [`worst_of`] and adopts the survivors in their
    /// original order, with ids rewritten for the new tree.
    #[must_use]
    pub fn merge(diagnostics: impl IntoIterator<Item = Self>) -> Self {
        let mut problems: Vec<Self> = diagnostics
            .into_iter()
            .filter(|diagnostic| !diagnostic.is_ok())
            .collect();

        if problems.len() <= 1 {
            return problems.pop().unwrap_or_else(Self::ok);
        }

        let (severity, source, code) = match worst_of(&problems) {
            Some(worst) => (worst.severity, worst.source.clone(), worst.code),
            None => return Self::ok(),
        };

        let mut merged = Self {
            severity,
            message: String::from("Multiple issues"),
            source,
            code,
            data: Vec::new(),
            children: problems,
            id: String::from(ROOT_ID),
        };
        merged.assign_ids(ROOT_ID);
        merged
    }

    /// Recomputes internal severities bottom-up.
    ///
    /// Each node with children becomes the OR of its children's recomputed
    /// severities; childless nodes keep their own. Returns the root's new
    /// severity.
    pub fn recompute_severity(&mut self) -> Severity {
        if self.children.is_empty() {
            return self.severity;
        }
        let mut severity = Severity::OK;
        for child in &mut self.children {
            severity |= child.recompute_severity();
        }
        self.severity = severity;
        severity
    }

    /// Collects problem nodes without children, depth-first, left to right.
    #[must_use]
    pub fn collect_leaves(&self) -> Vec<&Self> {
        let mut leaves = Vec::new();
        self.push_leaves(&mut leaves);
        leaves
    }

    fn push_leaves<'a>(&'a self, leaves: &mut Vec<&'a Self>) {
        if self.children.is_empty() {
            if !self.is_ok() {
                leaves.push(self);
            }
            return;
        }
        for child in &self.children {
            child.push_leaves(leaves);
        }
    }

    fn assign_ids(&mut self, id: &str) {
        self.id = id.to_owned();
        for (index, child) in self.children.iter_mut().enumerate() {
            let child_id = if id == ROOT_ID {
                format!("/@children.{index}")
            } else {
                format!("{id}/@children.{index}")
            };
            child.assign_ids(&child_id);
        }
    }
}

impl Default for Diagnostic {
    fn default() -> Self {
        Self::ok()
    }
}

/// Returns the most severe diagnostic.
///
/// Ties keep the first occurrence; the first node carrying
/// [`Severity::CANCEL`] ends the scan. Returns `None` for an empty slice.
#[must_use]
pub fn worst_of(diagnostics: &[Diagnostic]) -> Option<&Diagnostic> {
    let mut worst: Option<&Diagnostic> = None;
    for diagnostic in diagnostics {
        if diagnostic.severity.contains(Severity::CANCEL) {
            return Some(diagnostic);
        }
        if worst.is_none_or(|current| diagnostic.severity.bits() > current.severity.bits()) {
            worst = Some(diagnostic);
        }
    }
    worst
}
