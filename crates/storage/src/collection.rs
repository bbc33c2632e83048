//! Per-collection state of the in-memory database
//!
//! A [`CollectionState`] owns the documents (in natural, i.e. insertion,
//! order), the index catalog (in creation order, `_id_` first) and the
//! running data size. It enforces the rules a real server enforces on
//! writes:
//! - `_id` uniqueness, plus uniqueness on every unique index
//! - capped collections evict their oldest documents past `size`/`max`
//! - capped documents cannot grow and cannot be removed individually

use serde_json::{Map, Value};

use strata_fidelity_core::{
    CollectionOptions, Document, IndexDescriptor, IndexSpec, Metadata, Namespace, StoreError,
    StoreResult, ID_FIELD, PRIMARY_INDEX_NAME,
};

use crate::profile::{ShardingContext, StatsProfile};

/// Allocation unit for data and index storage
const PAGE_SIZE: u64 = 4096;

/// Fixed per-entry overhead of an index entry
const INDEX_ENTRY_OVERHEAD: u64 = 16;

/// Note reported in place of `paddingFactor` by newer releases
const PADDING_FACTOR_NOTE: &str =
    "paddingFactor is unused and unmaintained in 2.8. It remains hard coded to 1.0 for compatibility only.";

fn round_up(n: u64, unit: u64) -> u64 {
    (n + unit - 1) / unit * unit
}

/// Serialized size of a document
pub(crate) fn document_size(document: &Document) -> u64 {
    serde_json::to_vec(document).map_or(0, |bytes| bytes.len() as u64)
}

/// Key tuple a document contributes to an index; missing fields are null
fn index_key(descriptor: &IndexDescriptor, document: &Document) -> Vec<Value> {
    descriptor
        .key
        .keys()
        .map(|field| lookup_path(document, field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Resolve a dotted path (`c.d`) inside a document
fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_unique(descriptor: &IndexDescriptor) -> bool {
    descriptor.is_primary() || descriptor.unique == Some(true)
}

/// Sparse indexes skip documents that have none of the indexed fields
fn skips(descriptor: &IndexDescriptor, document: &Document) -> bool {
    descriptor.sparse == Some(true)
        && descriptor
            .key
            .keys()
            .all(|field| lookup_path(document, field).is_none())
}

fn render_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(|v| format!(": {}", v)).collect();
    format!("{{ {} }}", parts.join(", "))
}

/// Everything the database knows about one collection
#[derive(Debug, Clone)]
pub(crate) struct CollectionState {
    ns: Namespace,
    options: CollectionOptions,
    indexes: Vec<IndexDescriptor>,
    documents: Vec<Document>,
    data_size: u64,
    auto_id: u64,
}

impl CollectionState {
    /// Validate options and create an empty collection with its `_id_` index
    pub(crate) fn new(ns: Namespace, options: CollectionOptions) -> StoreResult<Self> {
        if options.capped {
            match options.size {
                Some(size) if size > 0 => {}
                _ => {
                    return Err(StoreError::InvalidOptions(
                        "size must be specified for a capped collection".to_string(),
                    ))
                }
            }
        } else if options.max.is_some() {
            return Err(StoreError::InvalidOptions(
                "max is only valid for a capped collection".to_string(),
            ));
        }
        let primary = IndexDescriptor::primary(&ns);
        Ok(Self {
            ns,
            options,
            indexes: vec![primary],
            documents: Vec::new(),
            data_size: 0,
            auto_id: 0,
        })
    }

    pub(crate) fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub(crate) fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub(crate) fn documents(&self) -> &[Document] {
        &self.documents
    }

    fn position_of(&self, key: &str, id: &Value) -> Option<usize> {
        self.documents.iter().position(|d| d.get(key) == Some(id))
    }

    /// First index whose unique constraint `document` would violate,
    /// ignoring the document at `skip` (the one being replaced)
    fn unique_violation(&self, document: &Document, skip: Option<usize>) -> Option<StoreError> {
        for descriptor in self.indexes.iter().filter(|d| is_unique(d)) {
            if skips(descriptor, document) {
                continue;
            }
            let key = index_key(descriptor, document);
            let clash = self.documents.iter().enumerate().any(|(i, existing)| {
                Some(i) != skip
                    && !skips(descriptor, existing)
                    && index_key(descriptor, existing) == key
            });
            if clash {
                return Some(StoreError::DuplicateKey {
                    index: format!("{}.${}", self.ns, descriptor.name),
                    key: render_key(&key),
                });
            }
        }
        None
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Build an index; returns `false` when an identical index already exists
    pub(crate) fn ensure_index(&mut self, spec: &IndexSpec) -> StoreResult<bool> {
        if spec.key.is_empty() {
            return Err(StoreError::command("createIndexes", "index key pattern cannot be empty"));
        }
        let descriptor = IndexDescriptor::from_spec(&self.ns, spec);
        if let Some(existing) = self.indexes.iter().find(|d| d.name == descriptor.name) {
            if existing.key == descriptor.key && existing.unique == descriptor.unique {
                return Ok(false);
            }
            return Err(StoreError::IndexConflict {
                name: descriptor.name,
            });
        }
        if let Some(existing) = self.indexes.iter().find(|d| d.key == descriptor.key) {
            return Err(StoreError::IndexConflict {
                name: existing.name.clone(),
            });
        }
        if is_unique(&descriptor) {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            for document in self.documents.iter().filter(|d| !skips(&descriptor, d)) {
                let key = index_key(&descriptor, document);
                if seen.contains(&key) {
                    return Err(StoreError::DuplicateKey {
                        index: format!("{}.${}", self.ns, descriptor.name),
                        key: render_key(&key),
                    });
                }
                seen.push(key);
            }
        }
        self.indexes.push(descriptor);
        Ok(true)
    }

    /// Drop a secondary index by name
    pub(crate) fn drop_index(&mut self, name: &str) -> StoreResult<IndexDescriptor> {
        if name == PRIMARY_INDEX_NAME {
            return Err(StoreError::command("dropIndexes", "cannot drop _id index"));
        }
        let position = self
            .indexes
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| StoreError::IndexNotFound {
                name: name.to_string(),
            })?;
        Ok(self.indexes.remove(position))
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Insert a document, assigning an `_id` when it has none
    ///
    /// Returns the documents a capped collection evicted to make room.
    pub(crate) fn insert(&mut self, mut document: Document) -> StoreResult<Vec<Document>> {
        if !document.contains_key(ID_FIELD) {
            self.auto_id += 1;
            let mut oid = Map::new();
            oid.insert("$oid".to_string(), Value::from(format!("{:024x}", self.auto_id)));
            document.insert(ID_FIELD.to_string(), Value::Object(oid));
        }
        let size = document_size(&document);
        if let Some(capacity) = self.options.size.filter(|_| self.options.capped) {
            if size > capacity {
                return Err(StoreError::command(
                    "insert",
                    format!("document of {} bytes exceeds capped size {}", size, capacity),
                ));
            }
        }
        if let Some(err) = self.unique_violation(&document, None) {
            return Err(err);
        }
        self.documents.push(document);
        self.data_size += size;
        Ok(self.evict())
    }

    /// Evict oldest documents until a capped collection fits its limits
    fn evict(&mut self) -> Vec<Document> {
        let mut evicted = Vec::new();
        if !self.options.capped {
            return evicted;
        }
        let max_docs = self.options.max.unwrap_or(u64::MAX);
        let max_size = self.options.size.unwrap_or(u64::MAX);
        while self.documents.len() > 1
            && (self.documents.len() as u64 > max_docs || self.data_size > max_size)
        {
            let oldest = self.documents.remove(0);
            self.data_size -= document_size(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    /// Replace the document with `key == id`, keeping its `_id` and `key`
    pub(crate) fn update_one(
        &mut self,
        key: &str,
        id: &Value,
        mut replacement: Document,
    ) -> StoreResult<()> {
        let position = self
            .position_of(key, id)
            .ok_or_else(|| StoreError::DocumentNotFound { id: id.to_string() })?;
        if let Some(primary) = self.documents[position].get(ID_FIELD) {
            replacement.insert(ID_FIELD.to_string(), primary.clone());
        }
        replacement.insert(key.to_string(), id.clone());
        let old_size = document_size(&self.documents[position]);
        let new_size = document_size(&replacement);
        if self.options.capped && new_size > old_size {
            return Err(StoreError::command("update", "objects in a capped ns cannot grow"));
        }
        if let Some(err) = self.unique_violation(&replacement, Some(position)) {
            return Err(err);
        }
        self.documents[position] = replacement;
        self.data_size = self.data_size - old_size + new_size;
        Ok(())
    }

    /// Remove the document with `key == id`
    pub(crate) fn remove_one(&mut self, key: &str, id: &Value) -> StoreResult<Document> {
        if self.options.capped {
            return Err(StoreError::command("remove", "cannot remove from a capped collection"));
        }
        let position = self
            .position_of(key, id)
            .ok_or_else(|| StoreError::DocumentNotFound { id: id.to_string() })?;
        let removed = self.documents.remove(position);
        self.data_size -= document_size(&removed);
        Ok(removed)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    fn index_size(&self, descriptor: &IndexDescriptor) -> u64 {
        let entries: u64 = self
            .documents
            .iter()
            .filter(|d| !skips(descriptor, d))
            .map(|d| {
                let key = Value::Array(index_key(descriptor, d));
                serde_json::to_vec(&key).map_or(0, |b| b.len() as u64) + INDEX_ENTRY_OVERHEAD
            })
            .sum();
        round_up(entries.max(1), PAGE_SIZE) + PAGE_SIZE
    }

    fn storage_size(&self) -> u64 {
        match self.options.size.filter(|_| self.options.capped) {
            Some(size) => round_up(size, PAGE_SIZE),
            None => round_up(self.data_size.max(1), PAGE_SIZE) + 2 * PAGE_SIZE,
        }
    }

    /// Render `collStats` as the given release would
    pub(crate) fn stats(
        &self,
        profile: StatsProfile,
        sharding: Option<&ShardingContext>,
    ) -> Metadata {
        let count = self.documents.len() as u64;
        let storage_size = self.storage_size();
        let mut stats = Metadata::new();

        if let Some(ctx) = sharding {
            stats.insert("sharded".to_string(), Value::from(ctx.sharded));
            stats.insert("primary".to_string(), Value::from(ctx.primary.clone()));
        }
        stats.insert("ns".to_string(), Value::from(self.ns.to_string()));
        stats.insert("count".to_string(), Value::from(count));
        stats.insert("size".to_string(), Value::from(self.data_size));
        if count > 0 {
            let avg = if profile.fractional_avg_obj_size() {
                Value::from(self.data_size as f64 / count as f64)
            } else {
                Value::from(self.data_size / count)
            };
            stats.insert("avgObjSize".to_string(), avg);
        }
        stats.insert("storageSize".to_string(), Value::from(storage_size));
        stats.insert("numExtents".to_string(), Value::from(1));
        stats.insert("nindexes".to_string(), Value::from(self.indexes.len() as u64));
        stats.insert("lastExtentSize".to_string(), Value::from(storage_size));
        if profile.reports_padding_factor() {
            stats.insert("paddingFactor".to_string(), Value::from(1.0));
        } else {
            stats.insert("paddingFactorNote".to_string(), Value::from(PADDING_FACTOR_NOTE));
        }
        if profile.reports_system_flags() {
            stats.insert("systemFlags".to_string(), Value::from(1));
        }
        stats.insert("userFlags".to_string(), Value::from(1));

        let mut total_index_size = 0;
        let mut index_sizes = Map::new();
        let mut index_details = Map::new();
        for descriptor in &self.indexes {
            let size = self.index_size(descriptor);
            total_index_size += size;
            index_sizes.insert(descriptor.name.clone(), Value::from(size));
            index_details.insert(descriptor.name.clone(), Value::Object(Map::new()));
        }
        stats.insert("totalIndexSize".to_string(), Value::from(total_index_size));
        stats.insert("indexSizes".to_string(), Value::Object(index_sizes));
        if profile.reports_index_details() {
            stats.insert("indexDetails".to_string(), Value::Object(index_details));
        }

        if self.options.capped {
            stats.insert("capped".to_string(), Value::from(true));
            if let Some(max) = self.options.max {
                stats.insert("max".to_string(), Value::from(max));
            }
            if profile.reports_max_size() {
                stats.insert("maxSize".to_string(), Value::from(self.options.size.unwrap_or(0)));
            }
        } else if profile.reports_capped_false() {
            stats.insert("capped".to_string(), Value::from(false));
        }
        stats.insert("ok".to_string(), Value::from(1));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn state(options: CollectionOptions) -> CollectionState {
        CollectionState::new(Namespace::new("test", "c"), options).unwrap()
    }

    #[test]
    fn test_capped_requires_size() {
        let opts = CollectionOptions {
            capped: true,
            size: None,
            max: None,
        };
        let err = CollectionState::new(Namespace::new("test", "c"), opts).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOptions(_)));
    }

    #[test]
    fn test_max_requires_capped() {
        let opts = CollectionOptions {
            capped: false,
            size: None,
            max: Some(5),
        };
        assert!(CollectionState::new(Namespace::new("test", "c"), opts).is_err());
    }

    #[test]
    fn test_new_collection_has_primary_index() {
        let s = state(CollectionOptions::default());
        assert_eq!(s.indexes().len(), 1);
        assert!(s.indexes()[0].is_primary());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        let err = s.insert(doc(json!({"_id": 0, "a": 2}))).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(s.documents().len(), 1);
    }

    #[test]
    fn test_missing_id_is_assigned() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"a": 1}))).unwrap();
        s.insert(doc(json!({"a": 1}))).unwrap();
        assert!(s.documents().iter().all(|d| d.contains_key("_id")));
        assert_ne!(s.documents()[0].get("_id"), s.documents()[1].get("_id"));
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let mut s = state(CollectionOptions::default());
        let spec = IndexSpec::new(doc(json!({"a": 1}))).unique();
        assert!(s.ensure_index(&spec).unwrap());
        s.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        assert!(s.insert(doc(json!({"_id": 1, "a": 1}))).is_err());
    }

    #[test]
    fn test_unique_index_build_over_duplicates_fails() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        s.insert(doc(json!({"_id": 1, "a": 1}))).unwrap();
        let spec = IndexSpec::new(doc(json!({"a": 1}))).unique();
        assert!(matches!(s.ensure_index(&spec), Err(StoreError::DuplicateKey { .. })));
        assert_eq!(s.indexes().len(), 1);
    }

    #[test]
    fn test_ensure_index_is_idempotent() {
        let mut s = state(CollectionOptions::default());
        let spec = IndexSpec::new(doc(json!({"a": 1})));
        assert!(s.ensure_index(&spec).unwrap());
        assert!(!s.ensure_index(&spec).unwrap());
        assert_eq!(s.indexes().len(), 2);
    }

    #[test]
    fn test_index_name_conflict() {
        let mut s = state(CollectionOptions::default());
        s.ensure_index(&IndexSpec::new(doc(json!({"a": 1}))).named("idx"))
            .unwrap();
        let err = s
            .ensure_index(&IndexSpec::new(doc(json!({"b": 1}))).named("idx"))
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexConflict { .. }));
    }

    #[test]
    fn test_drop_index() {
        let mut s = state(CollectionOptions::default());
        s.ensure_index(&IndexSpec::new(doc(json!({"a": 1})))).unwrap();
        assert_eq!(s.drop_index("a_1").unwrap().name, "a_1");
        assert!(matches!(s.drop_index("a_1"), Err(StoreError::IndexNotFound { .. })));
        assert!(s.drop_index("_id_").is_err());
    }

    #[test]
    fn test_capped_evicts_oldest_past_max() {
        let mut s = state(CollectionOptions {
            capped: true,
            size: Some(1 << 20),
            max: Some(2),
        });
        for i in 0..3 {
            s.insert(doc(json!({"_id": i}))).unwrap();
        }
        let ids: Vec<&Value> = s.documents().iter().filter_map(|d| d.get("_id")).collect();
        assert_eq!(ids, vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn test_capped_document_cannot_grow_or_be_removed() {
        let mut s = state(CollectionOptions::capped(1 << 20));
        s.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        assert!(s
            .update_one("_id", &json!(0), doc(json!({"a": "a much longer value"})))
            .is_err());
        assert!(s.update_one("_id", &json!(0), doc(json!({"b": 1}))).is_ok());
        assert!(s.remove_one("_id", &json!(0)).is_err());
    }

    #[test]
    fn test_update_keeps_id_and_tracks_size() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"_id": 0, "a": 1}))).unwrap();
        s.update_one("_id", &json!(0), doc(json!({"dummy": 1}))).unwrap();
        assert_eq!(s.documents()[0], doc(json!({"_id": 0, "dummy": 1})));
        assert_eq!(s.data_size, document_size(&s.documents()[0]));
    }

    #[test]
    fn test_remove_one() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"_id": 0}))).unwrap();
        s.insert(doc(json!({"_id": 1}))).unwrap();
        s.remove_one("_id", &json!(0)).unwrap();
        assert_eq!(s.documents().len(), 1);
        assert!(matches!(s.remove_one("_id", &json!(0)), Err(StoreError::DocumentNotFound { .. })));
    }

    #[test]
    fn test_stats_shape_per_profile() {
        let mut s = state(CollectionOptions::default());
        s.insert(doc(json!({"_id": 0, "a": "xyz"}))).unwrap();
        s.insert(doc(json!({"_id": 1, "a": "xy"}))).unwrap();

        let v24 = s.stats(StatsProfile::V2_4, None);
        assert!(v24["avgObjSize"].is_f64());
        assert!(v24.contains_key("systemFlags"));
        assert!(!v24.contains_key("capped"));

        let v26 = s.stats(StatsProfile::V2_6, None);
        assert!(v26["avgObjSize"].is_u64());
        assert!(v26.contains_key("paddingFactor"));

        let v28 = s.stats(StatsProfile::V2_8, None);
        assert_eq!(v28["capped"], json!(false));
        assert!(v28.contains_key("indexDetails"));
        assert!(v28.contains_key("paddingFactorNote"));
        assert!(!v28.contains_key("systemFlags"));
        assert_eq!(v28["count"], json!(2));
        assert_eq!(v28["nindexes"], json!(1));
    }

    #[test]
    fn test_stats_capped_and_sharded() {
        let s = state(CollectionOptions::capped(10_000));
        let stats = s.stats(StatsProfile::V2_8, Some(&ShardingContext::default()));
        assert_eq!(stats["capped"], json!(true));
        assert_eq!(stats["maxSize"], json!(10_000));
        assert_eq!(stats["sharded"], json!(false));
        assert_eq!(stats["primary"], json!("shard0000"));
        assert!(!stats.contains_key("avgObjSize"));
    }

    #[test]
    fn test_lookup_dotted_path() {
        let d = doc(json!({"c": {"d": 5}}));
        assert_eq!(lookup_path(&d, "c.d"), Some(&json!(5)));
        assert_eq!(lookup_path(&d, "c.e"), None);
        assert_eq!(lookup_path(&d, "x"), None);
    }

    proptest! {
        #[test]
        fn test_capped_limits_hold_after_any_inserts(
            sizes in proptest::collection::vec(0usize..200, 1..60),
            max in 1u64..20,
        ) {
            let mut s = state(CollectionOptions {
                capped: true,
                size: Some(2048),
                max: Some(max),
            });
            for (i, len) in sizes.iter().enumerate() {
                s.insert(doc(json!({"_id": i, "pad": "x".repeat(*len)}))).unwrap();
            }
            prop_assert!(s.documents().len() as u64 <= max);
            prop_assert!(s.data_size <= 2048);
            let total: u64 = s.documents().iter().map(document_size).sum();
            prop_assert_eq!(total, s.data_size);
            // Survivors are the newest documents, still in insertion order
            let last = sizes.len() - 1;
            prop_assert_eq!(&s.documents().last().unwrap()["_id"], &json!(last));
        }
    }
}
