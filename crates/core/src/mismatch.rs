//! Content divergence between a reference snapshot and a fresh capture
//!
//! A [`Mismatch`] is the payload of a MismatchError: the database answered
//! every request, but what it answered differs from what was recorded.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::json::FieldDiff;

/// Which part of the collection diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Normalized collection statistics differ
    Metadata,
    /// Index lists differ
    Indexes,
    /// Documents differ
    Data,
}

impl MismatchKind {
    /// Diagnostic headline for this kind
    pub fn headline(&self) -> &'static str {
        match self {
            MismatchKind::Metadata => "collection metadata not equal",
            MismatchKind::Indexes => "indexes not equal",
            MismatchKind::Data => "data not equal",
        }
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.headline())
    }
}

/// Where inside the compared part the divergence sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchSite {
    /// The whole value (metadata mapping)
    Whole,
    /// Sequences have different lengths
    Length {
        /// Entries in the reference
        expected: usize,
        /// Entries in the fresh capture
        actual: usize,
    },
    /// Entries at this position differ
    Position(usize),
}

/// A single detected divergence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Diverging part
    pub kind: MismatchKind,
    /// Location within that part
    pub site: MismatchSite,
    /// Reference value (`null` when the reference has no entry here)
    pub expected: Value,
    /// Fresh value (`null` when the fresh capture has no entry here)
    pub actual: Value,
    /// Field-level differences between `expected` and `actual`
    pub fields: Vec<FieldDiff>,
}

impl Mismatch {
    /// Whole-value mismatch with its field diffs
    pub fn whole(
        kind: MismatchKind,
        expected: Value,
        actual: Value,
        fields: Vec<FieldDiff>,
    ) -> Self {
        Self {
            kind,
            site: MismatchSite::Whole,
            expected,
            actual,
            fields,
        }
    }

    /// Positional mismatch with its field diffs
    pub fn at(
        kind: MismatchKind,
        position: usize,
        expected: Value,
        actual: Value,
        fields: Vec<FieldDiff>,
    ) -> Self {
        Self {
            kind,
            site: MismatchSite::Position(position),
            expected,
            actual,
            fields,
        }
    }

    /// Length mismatch; `expected`/`actual` hold the first unpaired entry
    pub fn length(
        kind: MismatchKind,
        expected_len: usize,
        actual_len: usize,
        expected: Value,
        actual: Value,
    ) -> Self {
        Self {
            kind,
            site: MismatchSite::Length {
                expected: expected_len,
                actual: actual_len,
            },
            expected,
            actual,
            fields: Vec::new(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.site {
            MismatchSite::Whole => write!(f, "{}", self.kind)?,
            MismatchSite::Length { expected, actual } => write!(
                f,
                "{}: expected {} entries, got {}",
                self.kind, expected, actual
            )?,
            MismatchSite::Position(i) => write!(f, "{} at position {}", self.kind, i)?,
        }
        write!(f, ": expected {}, got {}", self.expected, self.actual)?;
        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", fields.join("; "))?;
        }
        Ok(())
    }
}
