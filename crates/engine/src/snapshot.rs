//! Snapshot capture
//!
//! A [`CollectionSnapshot`] is everything a client can observe about one
//! collection at one instant: its statistics, its index catalog and its
//! documents. Capture imposes a deterministic order on the parts whose order
//! the database does not guarantee (indexes by name, documents by the ordering
//! key) so two captures of the same state are equal value for value.
//!
//! Statistics are read last, after indexes and documents.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use strata_fidelity_core::{
    DocumentCollection, Document, FidelityError, IndexDescriptor, Metadata, Namespace, Result,
    SortOrder,
};

use crate::normalize::NormalizationRuleSet;

/// Immutable record of a collection's observable state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    namespace: Namespace,
    metadata: Metadata,
    indexes: Vec<IndexDescriptor>,
    documents: Vec<Document>,
}

impl CollectionSnapshot {
    /// Capture the current state of `collection`
    ///
    /// `capture_rules` are applied to the statistics before they are stored.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Collaborator`] when any read fails, including
    /// when the collection does not exist.
    pub fn capture<C>(
        collection: &C,
        capture_rules: &NormalizationRuleSet,
        ordering_key: &str,
    ) -> Result<Self>
    where
        C: DocumentCollection + ?Sized,
    {
        let mut indexes = collection
            .list_indexes()
            .map_err(|e| FidelityError::collaborator("listIndexes", e))?;
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        let documents = collection
            .find()
            .map_err(|e| FidelityError::collaborator("find", e))?
            .sort(ordering_key, SortOrder::Ascending)
            .to_vec();

        let mut metadata = collection
            .stats()
            .map_err(|e| FidelityError::collaborator("stats", e))?;
        capture_rules.apply(&mut metadata);

        let snapshot = Self {
            namespace: collection.namespace(),
            metadata,
            indexes,
            documents,
        };
        debug!(
            target: "strata::fidelity::snapshot",
            ns = %snapshot.namespace,
            indexes = snapshot.indexes.len(),
            documents = snapshot.documents.len(),
            "Snapshot captured"
        );
        Ok(snapshot)
    }

    /// Assemble a snapshot from parts already in capture order
    pub fn from_parts(
        namespace: Namespace,
        metadata: Metadata,
        indexes: Vec<IndexDescriptor>,
        documents: Vec<Document>,
    ) -> Self {
        Self {
            namespace,
            metadata,
            indexes,
            documents,
        }
    }

    /// Collection the snapshot was taken from
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Statistics, after capture rules
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Index catalog, sorted by name
    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    /// Documents, sorted by the ordering key
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Render as JSON for diagnostics
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_fidelity_core::{CollectionOptions, DocumentDatabase, IndexSpec};
    use strata_fidelity_storage::{MemoryDatabase, ShardingContext, StatsProfile};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn populated(db: &MemoryDatabase) -> strata_fidelity_storage::MemoryCollection {
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        let c = db.collection("c");
        c.ensure_index(&IndexSpec::new(doc(json!({"z": 1})))).unwrap();
        c.ensure_index(&IndexSpec::new(doc(json!({"b": 1})))).unwrap();
        for id in [2, 0, 1] {
            c.insert(doc(json!({"_id": id, "b": id * 10, "z": "x"}))).unwrap();
        }
        c
    }

    #[test]
    fn test_capture_orders_indexes_and_documents() {
        let db = MemoryDatabase::new("test");
        let c = populated(&db);
        let snap = CollectionSnapshot::capture(&c, &NormalizationRuleSet::new(), "_id").unwrap();

        let names: Vec<&str> = snap.indexes().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["_id_", "b_1", "z_1"]);
        let ids: Vec<&Value> = snap.documents().iter().map(|d| &d["_id"]).collect();
        assert_eq!(ids, vec![&json!(0), &json!(1), &json!(2)]);
        assert_eq!(snap.metadata()["count"], json!(3));
        assert_eq!(snap.namespace().to_string(), "test.c");
    }

    #[test]
    fn test_capture_applies_rules() {
        let db = MemoryDatabase::with_profile("test", StatsProfile::V2_4);
        db.set_sharding(Some(ShardingContext::default()));
        let c = populated(&db);

        let raw = c.stats().unwrap();
        assert!(raw["avgObjSize"].is_f64());
        assert!(raw.contains_key("sharded"));

        let snap =
            CollectionSnapshot::capture(&c, &NormalizationRuleSet::capture_defaults(), "_id")
                .unwrap();
        assert!(snap.metadata()["avgObjSize"].is_i64());
        assert!(!snap.metadata().contains_key("sharded"));
        assert!(!snap.metadata().contains_key("primary"));
    }

    #[test]
    fn test_capture_of_missing_collection_fails() {
        let db = MemoryDatabase::new("test");
        let err = CollectionSnapshot::capture(
            &db.collection("missing"),
            &NormalizationRuleSet::capture_defaults(),
            "_id",
        )
        .unwrap_err();
        assert_eq!(err.kind(), strata_fidelity_core::ErrorKind::Collaborator);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_writes() {
        let db = MemoryDatabase::new("test");
        let c = populated(&db);
        let snap = CollectionSnapshot::capture(&c, &NormalizationRuleSet::new(), "_id").unwrap();
        c.insert(doc(json!({"_id": 3}))).unwrap();
        assert_eq!(snap.documents().len(), 3);
    }

    #[test]
    fn test_to_json() {
        let db = MemoryDatabase::new("test");
        let c = populated(&db);
        let snap = CollectionSnapshot::capture(&c, &NormalizationRuleSet::new(), "_id").unwrap();
        let value = snap.to_json();
        assert_eq!(value["namespace"], json!({"database": "test", "collection": "c"}));
        assert_eq!(value["indexes"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["documents"][0]["_id"], json!(0));
    }
}
