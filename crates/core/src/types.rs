//! Core types for the fidelity harness
//!
//! This module defines the shapes exchanged with a document database:
//! - Document / Metadata: JSON objects
//! - Namespace: `db.collection` pair
//! - CollectionOptions: creation options (capped, size, max)
//! - IndexSpec / IndexOptions: what a generator asks the database to build
//! - IndexDescriptor: what the database reports back from `list_indexes`
//! - CommandReply: `{ok, errmsg}` acknowledgement of a command

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Collection statistics as reported by the database (`collStats` shape).
pub type Metadata = Map<String, Value>;

/// Primary-key field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// Default field used as the synthetic ordering key.
pub const ORDERING_KEY: &str = ID_FIELD;

/// Name of the implicit primary-key index every collection carries.
pub const PRIMARY_INDEX_NAME: &str = "_id_";

/// Index format version reported in descriptors.
pub const INDEX_FORMAT_VERSION: i64 = 1;

// =============================================================================
// Namespace
// =============================================================================

/// Fully qualified collection name: `database.collection`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Create a new namespace
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

// =============================================================================
// Sort order
// =============================================================================

/// Direction of a sort or an index key component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first (`1`)
    Ascending,
    /// Largest first (`-1`)
    Descending,
}

impl SortOrder {
    /// Interpret an index/sort direction value (`1`, `-1`).
    ///
    /// Any negative number is descending; everything else ascending.
    pub fn from_direction(direction: &Value) -> Self {
        match direction.as_f64() {
            Some(d) if d < 0.0 => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }
}

// =============================================================================
// Collection options
// =============================================================================

/// Options passed to `createCollection`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Fixed-size collection with insertion-order eviction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub capped: bool,
    /// Maximum size in bytes (required when capped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Maximum number of documents (capped only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl CollectionOptions {
    /// Options for a capped collection of `size` bytes
    pub fn capped(size: u64) -> Self {
        Self {
            capped: true,
            size: Some(size),
            max: None,
        }
    }

    /// Render as the JSON object a shell command would carry
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Index specs and descriptors
// =============================================================================

/// Options accompanying an index key pattern
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOptions {
    /// Explicit index name; generated from the key pattern when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reject documents with a duplicate key
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    /// Skip documents lacking the indexed field
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sparse: bool,
    /// TTL in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

/// A request to build one index: key pattern plus options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Key pattern, e.g. `{"a": 1, "b": -1}`
    pub key: Document,
    /// Build options
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexSpec {
    /// Create a spec with default options
    pub fn new(key: Document) -> Self {
        Self {
            key,
            options: IndexOptions::default(),
        }
    }

    /// Set an explicit name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Mark the index unique
    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// Name the database will give this index
    ///
    /// An explicit name wins; otherwise each `field: direction` pair is
    /// rendered as `field_direction` and the pairs are joined with `_`.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.options.name {
            return name.clone();
        }
        self.key
            .iter()
            .map(|(field, direction)| match direction {
                Value::String(s) => format!("{}_{}", field, s),
                other => format!("{}_{}", field, other),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// An index as reported by `list_indexes`
///
/// Field names follow the database's wire representation so that a
/// descriptor renders exactly as the server would print it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index format version
    pub v: i64,
    /// Key pattern
    pub key: Document,
    /// Index name
    pub name: String,
    /// Owning namespace (`db.collection`)
    pub ns: String,
    /// Present only for unique indexes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// Present only for sparse indexes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<bool>,
    /// Present only for TTL indexes
    #[serde(
        rename = "expireAfterSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expire_after_seconds: Option<u64>,
}

impl IndexDescriptor {
    /// Descriptor for the implicit `_id_` index of a namespace
    pub fn primary(ns: &Namespace) -> Self {
        let mut key = Document::new();
        key.insert(ORDERING_KEY.to_string(), Value::from(1));
        Self {
            v: INDEX_FORMAT_VERSION,
            key,
            name: PRIMARY_INDEX_NAME.to_string(),
            ns: ns.to_string(),
            unique: None,
            sparse: None,
            expire_after_seconds: None,
        }
    }

    /// Descriptor the database records after building `spec`
    pub fn from_spec(ns: &Namespace, spec: &IndexSpec) -> Self {
        Self {
            v: INDEX_FORMAT_VERSION,
            key: spec.key.clone(),
            name: spec.resolved_name(),
            ns: ns.to_string(),
            unique: spec.options.unique.then_some(true),
            sparse: spec.options.sparse.then_some(true),
            expire_after_seconds: spec.options.expire_after_seconds,
        }
    }

    /// Whether this is the implicit primary-key index
    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_INDEX_NAME
    }

    /// Render as JSON for diagnostics
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Command replies
// =============================================================================

/// Acknowledgement returned by administrative commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Whether the command succeeded
    pub ok: bool,
    /// Server-provided reason when `ok` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<String>,
}

impl CommandReply {
    /// Successful reply
    pub fn ok() -> Self {
        Self {
            ok: true,
            errmsg: None,
        }
    }

    /// Failed reply carrying a reason
    pub fn failed(errmsg: impl Into<String>) -> Self {
        Self {
            ok: false,
            errmsg: Some(errmsg.into()),
        }
    }
}
