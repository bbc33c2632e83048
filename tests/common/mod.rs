//! Shared test utilities for the end-to-end suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::Once;

use strata_fidelity::{GeneratorOptions, MemoryDatabase, StatsProfile};

static INIT_TRACING: Once = Once::new();

/// Route harness logs (including the persistence trace) to the test writer.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    });
}

/// Fresh database named `test` serving `profile`.
pub fn database(profile: StatsProfile) -> MemoryDatabase {
    init_tracing();
    MemoryDatabase::with_profile("test", profile)
}

/// Generator options for `documents` documents.
pub fn generated(capped: bool, documents: usize) -> GeneratorOptions {
    GeneratorOptions {
        capped,
        documents,
        ..GeneratorOptions::default()
    }
}
