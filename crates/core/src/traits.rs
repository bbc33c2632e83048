//! Collaborator traits
//!
//! The harness never talks to a concrete database. It sees:
//! - [`DocumentDatabase`]: create collections and hand out handles
//! - [`DocumentCollection`]: the handle the persistence helper writes through
//!   and snapshot capture reads through
//! - [`DataGenerator`]: the source of collection metadata, index specs and
//!   documents consumed by the persistence helper
//! - [`CollectionMutator`]: the perturbations a round-trip scenario applies
//!   between recording and validating
//!
//! Any backend (a live server driver, an embedded engine, the in-memory
//! reference database) plugs in by implementing the first two.

use serde_json::Value;

use crate::cursor::Cursor;
use crate::error::StoreResult;
use crate::types::{
    CollectionOptions, CommandReply, Document, IndexDescriptor, IndexSpec, Metadata, Namespace,
};

/// A database that owns named collections
pub trait DocumentDatabase {
    /// Handle type for one collection
    type Collection: DocumentCollection;

    /// Handle to the named collection
    ///
    /// Never fails: the collection may not exist yet, in which case reads
    /// through the handle report `NamespaceNotFound`.
    fn collection(&self, name: &str) -> Self::Collection;

    /// Create a collection
    ///
    /// A reply with `ok == false` means the server refused the command
    /// (e.g. it already exists or the options are invalid).
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be issued at all.
    fn create_collection(&self, name: &str, options: &CollectionOptions)
        -> StoreResult<CommandReply>;
}

/// Live handle to one collection
pub trait DocumentCollection {
    /// Collection name
    fn name(&self) -> &str;

    /// Fully qualified name
    fn namespace(&self) -> Namespace;

    /// Drop the collection with all its documents and indexes
    ///
    /// Returns `false` when there was nothing to drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the drop command fails.
    fn drop_collection(&self) -> StoreResult<bool>;

    /// Build an index unless an identical one exists
    ///
    /// # Errors
    ///
    /// Returns the index build error reported by the database.
    fn ensure_index(&self, spec: &IndexSpec) -> StoreResult<()>;

    /// All indexes, including the implicit `_id_` index, in storage order
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` for a missing collection.
    fn list_indexes(&self) -> StoreResult<Vec<IndexDescriptor>>;

    /// All documents in natural order
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` for a missing collection.
    fn find(&self) -> StoreResult<Cursor>;

    /// Number of documents
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` for a missing collection.
    fn count(&self) -> StoreResult<u64>;

    /// Insert one document
    ///
    /// # Errors
    ///
    /// Returns the write error reported by the database (duplicate key,
    /// missing collection, ...).
    fn insert(&self, document: Document) -> StoreResult<()>;

    /// Collection statistics (`collStats`)
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` for a missing collection.
    fn stats(&self) -> StoreResult<Metadata>;
}

/// Source of a synthetic collection
///
/// The index and document streams are finite, forward-only and one-shot:
/// [`into_streams`](DataGenerator::into_streams) consumes the generator, so
/// they cannot be restarted.
pub trait DataGenerator {
    /// Index spec stream
    type Indexes: Iterator<Item = IndexSpec>;
    /// Document stream
    type Data: Iterator<Item = Document>;

    /// Options to create the collection with
    fn collection_metadata(&self) -> CollectionOptions;

    /// Hand out the index and document streams
    fn into_streams(self) -> (Self::Indexes, Self::Data);
}

/// Writes a round-trip scenario issues to perturb a recorded collection
pub trait CollectionMutator: DocumentCollection {
    /// Drop a secondary index by name
    ///
    /// # Errors
    ///
    /// Returns an error if no such index exists or it cannot be dropped.
    fn drop_index(&self, name: &str) -> StoreResult<()>;

    /// Replace the document whose `key` field equals `id`
    ///
    /// The replacement keeps the matched document's `_id` and `key` fields.
    ///
    /// # Errors
    ///
    /// Returns an error if no document matches or the write is refused.
    fn update_one(&self, key: &str, id: &Value, replacement: Document) -> StoreResult<()>;

    /// Remove the document whose `key` field equals `id`
    ///
    /// # Errors
    ///
    /// Returns an error if no document matches or the write is refused.
    fn remove_one(&self, key: &str, id: &Value) -> StoreResult<()>;
}
