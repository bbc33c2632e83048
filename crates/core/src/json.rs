//! Field paths and structural JSON diffs
//!
//! This module defines:
//! - PathSegment / FieldPath: location of a value inside a document
//!   (`a.b[2].c`)
//! - FieldDiff: one differing location with the expected and actual values
//! - diff_values / diff_documents: recursive comparison producing FieldDiffs
//!
//! Diffs are diagnostics only. Equality decisions are always made with
//! `PartialEq` on the whole value; the diff explains *where* two values
//! disagree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::Document;

// =============================================================================
// FieldPath
// =============================================================================

/// A single path component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Location of a value inside a JSON document
///
/// The empty path denotes the document root and displays as `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The document root
    pub fn root() -> Self {
        Self::default()
    }

    /// Path with one more key segment
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Path with one more index segment
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render as `a.b[2].c`
    pub fn to_path_string(&self) -> String {
        if self.segments.is_empty() {
            return "$".to_string();
        }
        let mut result = String::new();
        for seg in &self.segments {
            result.push_str(&seg.to_string());
        }
        if result.starts_with('.') {
            result.remove(0);
        }
        result
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_string())
    }
}

// =============================================================================
// FieldDiff
// =============================================================================

/// One location where two values disagree
///
/// `None` on a side means the field is absent there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Where the values disagree
    pub path: FieldPath,
    /// Value in the reference
    pub expected: Option<Value>,
    /// Value in the fresh capture
    pub actual: Option<Value>,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(v: &Option<Value>) -> String {
            v.as_ref()
                .map_or_else(|| "<absent>".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "{}: expected {}, got {}",
            self.path,
            side(&self.expected),
            side(&self.actual)
        )
    }
}

fn diff_into(path: &FieldPath, expected: &Value, actual: &Value, out: &mut Vec<FieldDiff>) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => diff_maps_into(path, e, a, out),
        (Value::Array(e), Value::Array(a)) => {
            let longest = e.len().max(a.len());
            for i in 0..longest {
                match (e.get(i), a.get(i)) {
                    (Some(ev), Some(av)) => diff_into(&path.index(i), ev, av, out),
                    (ev, av) => out.push(FieldDiff {
                        path: path.index(i),
                        expected: ev.cloned(),
                        actual: av.cloned(),
                    }),
                }
            }
        }
        (e, a) if e == a => {}
        (e, a) => out.push(FieldDiff {
            path: path.clone(),
            expected: Some(e.clone()),
            actual: Some(a.clone()),
        }),
    }
}

fn diff_maps_into(
    path: &FieldPath,
    expected: &Document,
    actual: &Document,
    out: &mut Vec<FieldDiff>,
) {
    for (key, ev) in expected {
        match actual.get(key) {
            Some(av) => diff_into(&path.key(key.as_str()), ev, av, out),
            None => out.push(FieldDiff {
                path: path.key(key.as_str()),
                expected: Some(ev.clone()),
                actual: None,
            }),
        }
    }
    for (key, av) in actual {
        if !expected.contains_key(key) {
            out.push(FieldDiff {
                path: path.key(key.as_str()),
                expected: None,
                actual: Some(av.clone()),
            });
        }
    }
}

/// Every location where `actual` differs from `expected`
///
/// Objects are compared key by key (key order is irrelevant), arrays
/// position by position. Leaves that differ, including `1` vs `1.0`, are
/// reported with both values. Equal inputs produce an empty list.
pub fn diff_values(expected: &Value, actual: &Value) -> Vec<FieldDiff> {
    let mut out = Vec::new();
    diff_into(&FieldPath::root(), expected, actual, &mut out);
    out
}

/// [`diff_values`] for two documents
pub fn diff_documents(expected: &Document, actual: &Document) -> Vec<FieldDiff> {
    let mut out = Vec::new();
    diff_maps_into(&FieldPath::root(), expected, actual, &mut out);
    out
}
