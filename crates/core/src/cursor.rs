//! Materialized query cursor
//!
//! A `find()` returns every document of a collection in the database's
//! natural order. The cursor can be re-ordered by a field, counted, or
//! drained into a vector. Results are fully in memory: the harness works on
//! test fixtures, not production datasets.

use crate::types::{Document, SortOrder};
use crate::value::compare_fields;

/// Result set of a `find()`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    documents: Vec<Document>,
}

impl Cursor {
    /// Wrap documents in natural order
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Re-order by `field`
    ///
    /// The sort is stable: documents with equal (or equally missing) keys
    /// keep their natural order.
    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.documents.sort_by(|a, b| {
            let ord = compare_fields(a.get(field), b.get(field));
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
        self
    }

    /// Number of documents in the result set
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Borrow the documents in cursor order
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    /// Drain into a vector (`toArray()`)
    pub fn to_vec(self) -> Vec<Document> {
        self.documents
    }
}

impl IntoIterator for Cursor {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
