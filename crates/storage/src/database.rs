//! MemoryDatabase: in-memory reference implementation of the collaborator traits
//!
//! Shared state lives behind `Arc<parking_lot::RwLock<..>>`, so a
//! [`MemoryDatabase`] and every [`MemoryCollection`] handle are cheap clones
//! pointing at the same data, the way driver handles point at one server.
//!
//! Collection handles also implement [`CollectionMutator`], the writes a
//! round-trip scenario uses to perturb state. The database can switch its
//! [`StatsProfile`] in place to simulate an upgrade or downgrade of the
//! serving release.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use strata_fidelity_core::{
    CollectionMutator, CollectionOptions, CommandReply, Cursor, Document, DocumentCollection,
    DocumentDatabase, IndexDescriptor, IndexSpec, Metadata, Namespace, StoreError, StoreResult,
};

use crate::collection::CollectionState;
use crate::profile::{ShardingContext, StatsProfile};

#[derive(Debug)]
struct Inner {
    name: String,
    collections: RwLock<BTreeMap<String, CollectionState>>,
    profile: RwLock<StatsProfile>,
    sharding: RwLock<Option<ShardingContext>>,
}

/// In-memory document database
///
/// # Example
///
/// ```
/// use strata_fidelity_core::{CollectionOptions, DocumentCollection, DocumentDatabase};
/// use strata_fidelity_storage::MemoryDatabase;
///
/// let db = MemoryDatabase::new("test");
/// assert!(db.create_collection("c", &CollectionOptions::default()).unwrap().ok);
/// assert_eq!(db.collection("c").count().unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

impl MemoryDatabase {
    /// Create an empty database serving the default profile
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_profile(name, StatsProfile::default())
    }

    /// Create an empty database serving `profile`
    pub fn with_profile(name: impl Into<String>, profile: StatsProfile) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                collections: RwLock::new(BTreeMap::new()),
                profile: RwLock::new(profile),
                sharding: RwLock::new(None),
            }),
        }
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Release currently emulated by `stats()`
    pub fn profile(&self) -> StatsProfile {
        *self.inner.profile.read()
    }

    /// Switch the emulated release, keeping all data
    pub fn set_profile(&self, profile: StatsProfile) {
        let previous = std::mem::replace(&mut *self.inner.profile.write(), profile);
        info!(
            target: "strata::fidelity::storage",
            db = %self.inner.name,
            from = %previous,
            to = %profile,
            "Stats profile switched"
        );
    }

    /// Report statistics as seen through a router (or not, with `None`)
    pub fn set_sharding(&self, sharding: Option<ShardingContext>) {
        *self.inner.sharding.write() = sharding;
    }

    /// Names of existing collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        self.inner.collections.read().keys().cloned().collect()
    }

    fn namespace(&self, collection: &str) -> Namespace {
        Namespace::new(self.inner.name.clone(), collection)
    }
}

impl DocumentDatabase for MemoryDatabase {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> MemoryCollection {
        MemoryCollection {
            db: self.clone(),
            name: name.to_string(),
        }
    }

    fn create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> StoreResult<CommandReply> {
        let ns = self.namespace(name);
        let mut collections = self.inner.collections.write();
        if collections.contains_key(name) {
            return Ok(CommandReply::failed(
                StoreError::NamespaceExists {
                    namespace: ns.to_string(),
                }
                .to_string(),
            ));
        }
        match CollectionState::new(ns.clone(), options.clone()) {
            Ok(state) => {
                collections.insert(name.to_string(), state);
                debug!(
                    target: "strata::fidelity::storage",
                    ns = %ns,
                    capped = options.capped,
                    "Collection created"
                );
                Ok(CommandReply::ok())
            }
            Err(e) => Ok(CommandReply::failed(e.to_string())),
        }
    }
}

/// Handle to one collection of a [`MemoryDatabase`]
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    db: MemoryDatabase,
    name: String,
}

impl MemoryCollection {
    fn not_found(&self) -> StoreError {
        StoreError::NamespaceNotFound {
            namespace: self.namespace().to_string(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&CollectionState) -> T) -> StoreResult<T> {
        let collections = self.db.inner.collections.read();
        let state = collections.get(&self.name).ok_or_else(|| self.not_found())?;
        Ok(f(state))
    }

    fn write<T>(&self, f: impl FnOnce(&mut CollectionState) -> StoreResult<T>) -> StoreResult<T> {
        let mut collections = self.db.inner.collections.write();
        let state = collections
            .get_mut(&self.name)
            .ok_or_else(|| self.not_found())?;
        f(state)
    }

    /// Options the collection was created with
    pub fn options(&self) -> StoreResult<CollectionOptions> {
        self.read(|state| state.options().clone())
    }
}

impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Namespace {
        self.db.namespace(&self.name)
    }

    fn drop_collection(&self) -> StoreResult<bool> {
        let dropped = self.db.inner.collections.write().remove(&self.name).is_some();
        if dropped {
            debug!(
                target: "strata::fidelity::storage",
                ns = %self.namespace(),
                "Collection dropped"
            );
        }
        Ok(dropped)
    }

    fn ensure_index(&self, spec: &IndexSpec) -> StoreResult<()> {
        let created = self.write(|state| state.ensure_index(spec))?;
        debug!(
            target: "strata::fidelity::storage",
            ns = %self.namespace(),
            index = %spec.resolved_name(),
            created,
            "ensureIndex"
        );
        Ok(())
    }

    fn list_indexes(&self) -> StoreResult<Vec<IndexDescriptor>> {
        self.read(|state| state.indexes().to_vec())
    }

    fn find(&self) -> StoreResult<Cursor> {
        self.read(|state| Cursor::new(state.documents().to_vec()))
    }

    fn count(&self) -> StoreResult<u64> {
        self.read(|state| state.documents().len() as u64)
    }

    fn insert(&self, document: Document) -> StoreResult<()> {
        let evicted = self.write(|state| state.insert(document))?;
        if !evicted.is_empty() {
            debug!(
                target: "strata::fidelity::storage",
                ns = %self.namespace(),
                evicted = evicted.len(),
                "Capped collection evicted documents"
            );
        }
        Ok(())
    }

    fn stats(&self) -> StoreResult<Metadata> {
        let profile = self.db.profile();
        let sharding = self.db.inner.sharding.read().clone();
        self.read(|state| state.stats(profile, sharding.as_ref()))
    }
}

impl CollectionMutator for MemoryCollection {
    /// `IndexNotFound` for an unknown name; the `_id_` index cannot be dropped.
    fn drop_index(&self, name: &str) -> StoreResult<()> {
        let dropped = self.write(|state| state.drop_index(name))?;
        debug!(
            target: "strata::fidelity::storage",
            ns = %self.namespace(),
            index = %dropped.name,
            "Index dropped"
        );
        Ok(())
    }

    /// `DocumentNotFound` when no document matches; capped documents cannot grow.
    fn update_one(&self, key: &str, id: &Value, replacement: Document) -> StoreResult<()> {
        self.write(|state| state.update_one(key, id, replacement))?;
        debug!(
            target: "strata::fidelity::storage",
            ns = %self.namespace(),
            key,
            id = %id,
            "Document replaced"
        );
        Ok(())
    }

    /// `DocumentNotFound` when no document matches; capped collections refuse removal.
    fn remove_one(&self, key: &str, id: &Value) -> StoreResult<()> {
        let removed = self.write(|state| state.remove_one(key, id))?;
        debug!(
            target: "strata::fidelity::storage",
            ns = %self.namespace(),
            key,
            id = %id,
            fields = removed.len(),
            "Document removed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_create_collection_twice_reports_not_ok() {
        let db = MemoryDatabase::new("test");
        assert!(db.create_collection("c", &CollectionOptions::default()).unwrap().ok);
        let reply = db.create_collection("c", &CollectionOptions::default()).unwrap();
        assert!(!reply.ok);
        assert!(reply.errmsg.unwrap().contains("already exists"));
    }

    #[test]
    fn test_invalid_options_report_not_ok() {
        let db = MemoryDatabase::new("test");
        let opts = CollectionOptions {
            capped: true,
            size: None,
            max: None,
        };
        assert!(!db.create_collection("c", &opts).unwrap().ok);
        assert!(db.collection_names().is_empty());
    }

    #[test]
    fn test_reads_on_missing_collection_fail() {
        let db = MemoryDatabase::new("test");
        let c = db.collection("missing");
        assert!(matches!(c.stats(), Err(StoreError::NamespaceNotFound { .. })));
        assert!(c.list_indexes().is_err());
        assert!(c.find().is_err());
        assert!(c.insert(doc(json!({"_id": 0}))).is_err());
        assert!(!c.drop_collection().unwrap());
    }

    #[test]
    fn test_handles_share_state() {
        let db = MemoryDatabase::new("test");
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        let a = db.collection("c");
        let b = db.clone().collection("c");
        a.insert(doc(json!({"_id": 0}))).unwrap();
        assert_eq!(b.count().unwrap(), 1);
    }

    #[test]
    fn test_profile_switch_changes_stats_shape() {
        let db = MemoryDatabase::with_profile("test", StatsProfile::V2_4);
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        let c = db.collection("c");
        c.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        assert!(c.stats().unwrap().contains_key("systemFlags"));

        db.set_profile(StatsProfile::V2_8);
        assert_eq!(db.profile(), StatsProfile::V2_8);
        let stats = c.stats().unwrap();
        assert!(!stats.contains_key("systemFlags"));
        assert_eq!(stats["capped"], json!(false));
    }

    #[test]
    fn test_sharding_context_appears_in_stats() {
        let db = MemoryDatabase::new("test");
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        db.set_sharding(Some(ShardingContext::default()));
        let stats = db.collection("c").stats().unwrap();
        assert_eq!(stats["sharded"], json!(false));
        db.set_sharding(None);
        assert!(!db.collection("c").stats().unwrap().contains_key("sharded"));
    }

    #[test]
    fn test_find_returns_natural_order() {
        let db = MemoryDatabase::new("test");
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        let c = db.collection("c");
        for id in [3, 1, 2] {
            c.insert(doc(json!({"_id": id}))).unwrap();
        }
        let ids: Vec<Value> = c
            .find()
            .unwrap()
            .to_vec()
            .into_iter()
            .map(|d| d["_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(3), json!(1), json!(2)]);
    }

    #[test]
    fn test_mutations_through_handle() {
        let db = MemoryDatabase::new("test");
        db.create_collection("c", &CollectionOptions::default()).unwrap();
        let c = db.collection("c");
        c.ensure_index(&IndexSpec::new(doc(json!({"a": 1})))).unwrap();
        c.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        c.insert(doc(json!({"_id": 1, "a": 2}))).unwrap();

        c.drop_index("a_1").unwrap();
        assert_eq!(c.list_indexes().unwrap().len(), 1);

        c.update_one("_id", &json!(0), doc(json!({"dummy": 1}))).unwrap();
        c.remove_one("_id", &json!(1)).unwrap();
        let docs = c.find().unwrap().to_vec();
        assert_eq!(docs, vec![doc(json!({"_id": 0, "dummy": 1}))]);
        assert_eq!(c.options().unwrap(), CollectionOptions::default());
    }
}
