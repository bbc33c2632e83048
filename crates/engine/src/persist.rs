//! Persistence helper
//!
//! Materializes a generated collection: drop, create, build indexes, insert
//! documents. Each issued operation is traced at `info` as the shell command
//! that would perform it, so a failing run can be replayed by hand.
//!
//! Documents get a fresh ordering key (`0, 1, 2, ...`) in insertion order,
//! overwriting whatever the generator put there. Snapshots sort by that key,
//! which makes document order deterministic across captures.

use serde_json::Value;
use tracing::{debug, info};

use strata_fidelity_core::{
    DataGenerator, DocumentCollection, DocumentDatabase, FidelityError, Result, StoreError,
    ORDERING_KEY,
};

const TARGET: &str = "strata::fidelity::persist";

/// Create `name` in `db` from `generator`, keyed by `_id`
///
/// See [`create_collection_with_data_keyed`].
///
/// # Errors
///
/// As for [`create_collection_with_data_keyed`].
pub fn create_collection_with_data<D, G>(db: &D, name: &str, generator: G) -> Result<D::Collection>
where
    D: DocumentDatabase + ?Sized,
    G: DataGenerator,
{
    create_collection_with_data_keyed(db, name, generator, ORDERING_KEY)
}

/// Create `name` in `db` from `generator`, assigning `ordering_key`
///
/// Any existing collection named `name` is dropped first, without
/// confirmation.
///
/// # Errors
///
/// [`FidelityError::Collaborator`] when the database rejects a drop, create,
/// index build or insert; [`FidelityError::Persistence`] when the index or
/// document count read back disagrees with what was issued.
pub fn create_collection_with_data_keyed<D, G>(
    db: &D,
    name: &str,
    generator: G,
    ordering_key: &str,
) -> Result<D::Collection>
where
    D: DocumentDatabase + ?Sized,
    G: DataGenerator,
{
    let collection = db.collection(name);
    info!(target: TARGET, "db.{}.drop();", name);
    collection
        .drop_collection()
        .map_err(|e| FidelityError::collaborator("drop", e))?;

    let options = generator.collection_metadata();
    let quoted = Value::from(name);
    info!(target: TARGET, "db.createCollection({}, {});", quoted, options.to_json());
    let reply = db
        .create_collection(name, &options)
        .map_err(|e| FidelityError::collaborator("createCollection", e))?;
    if !reply.ok {
        let message = reply
            .errmsg
            .unwrap_or_else(|| "createCollection returned ok: 0".to_string());
        return Err(FidelityError::collaborator(
            "createCollection",
            StoreError::command("createCollection", message),
        ));
    }

    let (indexes, documents) = generator.into_streams();

    let mut created: u64 = 0;
    for spec in indexes {
        let key = Value::Object(spec.key.clone());
        let index_options = serde_json::to_value(&spec.options).unwrap_or(Value::Null);
        info!(target: TARGET, "collection.ensureIndex({}, {});", key, index_options);
        collection
            .ensure_index(&spec)
            .map_err(|e| FidelityError::collaborator("ensureIndex", e))?;
        created += 1;
    }

    let live = collection
        .list_indexes()
        .map_err(|e| FidelityError::collaborator("getIndexes", e))?
        .len() as u64;
    if live != created + 1 {
        return Err(FidelityError::Persistence {
            check: "index count",
            expected: created + 1,
            actual: live,
        });
    }

    let mut inserted: u64 = 0;
    for mut document in documents {
        document.insert(ordering_key.to_string(), Value::from(inserted));
        let rendered = Value::Object(document.clone());
        info!(target: TARGET, "collection.insert({});", rendered);
        collection
            .insert(document)
            .map_err(|e| FidelityError::collaborator("insert", e))?;
        inserted += 1;
    }

    let count = collection
        .count()
        .map_err(|e| FidelityError::collaborator("count", e))?;
    if count != inserted {
        return Err(FidelityError::Persistence {
            check: "counts not equal after inserts",
            expected: inserted,
            actual: count,
        });
    }

    debug!(
        target: TARGET,
        ns = %collection.namespace(),
        indexes = created,
        documents = inserted,
        "Collection persisted"
    );
    Ok(collection)
}
