//! Shared helpers for engine integration tests.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::Once;

use serde_json::Value;
use strata_fidelity_core::{
    CollectionOptions, Document, DocumentCollection, DocumentDatabase, IndexSpec,
};
use strata_fidelity_storage::{MemoryCollection, MemoryDatabase, StatsProfile};

static INIT_TRACING: Once = Once::new();

/// Route harness logs to the test writer so `--nocapture` shows them.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Unwrap a `json!` object literal into a document.
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// Fresh database named `test` serving `profile`.
pub fn database(profile: StatsProfile) -> MemoryDatabase {
    init_tracing();
    MemoryDatabase::with_profile("test", profile)
}

/// Collection `c` with the given index key patterns and `{_id: i, a: i, s: "value-i"}` documents.
pub fn collection(
    db: &MemoryDatabase,
    options: &CollectionOptions,
    indexes: &[Value],
    documents: usize,
) -> MemoryCollection {
    assert!(db.create_collection("c", options).unwrap().ok);
    let c = db.collection("c");
    for key in indexes {
        c.ensure_index(&IndexSpec::new(doc(key.clone()))).unwrap();
    }
    for i in 0..documents {
        c.insert(doc(serde_json::json!({"_id": i, "a": i, "s": format!("value-{}", i)})))
            .unwrap();
    }
    c
}
