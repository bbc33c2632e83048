//! Core types and traits for Strata fidelity
//!
//! This crate defines the vocabulary shared by the harness and any database
//! it drives:
//! - Document / Metadata: JSON objects
//! - IndexSpec / IndexDescriptor: requested vs reported indexes
//! - CollectionOptions / CommandReply: collection creation
//! - Cursor: materialized `find()` result with sort
//! - Value ordering: total order over JSON values
//! - FieldPath / FieldDiff: field-level diagnostics
//! - Mismatch: detected divergence
//! - Error: StoreError (database) and FidelityError (harness)
//! - Traits: DocumentDatabase, DocumentCollection, DataGenerator, CollectionMutator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod error;
pub mod json;
pub mod mismatch;
pub mod traits;
pub mod types;
pub mod value;

pub use cursor::Cursor;
pub use error::{ErrorKind, FidelityError, Result, StoreError, StoreResult};
pub use json::{diff_documents, diff_values, FieldDiff, FieldPath, PathSegment};
pub use mismatch::{Mismatch, MismatchKind, MismatchSite};
pub use traits::{CollectionMutator, DataGenerator, DocumentCollection, DocumentDatabase};
pub use types::{
    CollectionOptions, CommandReply, Document, IndexDescriptor, IndexOptions, IndexSpec, Metadata,
    Namespace, SortOrder, ID_FIELD, INDEX_FORMAT_VERSION, ORDERING_KEY, PRIMARY_INDEX_NAME,
};
pub use value::{compare_fields, compare_values, is_default_value, type_name};
