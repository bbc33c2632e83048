//! Strata Fidelity - round-trip data-fidelity harness for document databases
//!
//! Generates a synthetic collection, persists it, records a snapshot of its
//! observable state (statistics, indexes, documents), and after some external
//! process has run (upgrade, downgrade, migration, replication) verifies the
//! collection is unchanged, discounting known version-induced statistics
//! drift.
//!
//! # Quick Start
//!
//! ```
//! use strata_fidelity::{
//!     create_collection_with_data, CollectionDataGenerator, CollectionDataValidator,
//!     GeneratorOptions, MemoryDatabase, StatsProfile,
//! };
//!
//! let db = MemoryDatabase::with_profile("test", StatsProfile::V2_4);
//! let generator = CollectionDataGenerator::new(GeneratorOptions::default());
//! let collection = create_collection_with_data(&db, "test", generator)?;
//!
//! let mut validator = CollectionDataValidator::new();
//! validator.record(&collection)?;
//!
//! // Upgrade the serving release
//! db.set_profile(StatsProfile::V2_8);
//!
//! validator.validate(&collection)?;
//! # Ok::<(), strata_fidelity::FidelityError>(())
//! ```
//!
//! # Architecture
//!
//! The harness talks to a database only through the collaborator traits
//! ([`DocumentDatabase`], [`DocumentCollection`], [`CollectionMutator`]).
//! [`MemoryDatabase`] is the in-memory reference backend.

// Re-export the public API from strata-fidelity-engine
pub use strata_fidelity_engine::*;

pub use strata_fidelity_core::{
    Cursor, Document, FieldDiff, FieldPath, IndexDescriptor, IndexSpec, Metadata, Namespace,
    StoreError,
};
pub use strata_fidelity_storage::{MemoryCollection, MemoryDatabase, ShardingContext, StatsProfile};
