//! Round-trip fidelity engine
//!
//! This crate implements the harness on top of the collaborator traits of
//! `strata-fidelity-core`:
//! - Persistence helper: materialize a generated collection
//! - Snapshot capture: immutable, order-normalized record of a collection
//! - Normalization rules: declarative handling of version-induced stats drift
//! - Validator: record a reference, validate later captures against it
//! - Generator: seeded synthetic collections
//! - Harness: scenarios with expected outcomes
//! - Config: `fidelity.toml`
//!
//! The engine never names a concrete database; any backend implementing
//! `DocumentDatabase` and `DocumentCollection` can be validated.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compare;
pub mod config;
pub mod generator;
pub mod harness;
pub mod normalize;
pub mod persist;
pub mod snapshot;
pub mod validator;

pub use compare::{all_mismatches, first_mismatch};
pub use config::{FidelityConfig, CONFIG_FILE_NAME};
pub use generator::{
    CollectionDataGenerator, GeneratedDocuments, GeneratorOptions, CAPPED_SIZE, COMPOUND_INDEX,
    SINGLE_FIELD_INDEX,
};
pub use harness::{
    run_scenario, run_scenarios, standard_scenarios, Expectation, Mutation, Outcome, RoundTrip,
    Scenario, ScenarioReport,
};
pub use normalize::{NormalizationRule, NormalizationRuleSet, RuleAction, ValueType};
pub use persist::{create_collection_with_data, create_collection_with_data_keyed};
pub use snapshot::CollectionSnapshot;
pub use validator::{CollectionDataValidator, Validated};

pub use strata_fidelity_core::{
    CollectionMutator, DataGenerator, DocumentCollection, DocumentDatabase, ErrorKind,
    FidelityError, Mismatch, MismatchKind, MismatchSite, Result,
};
