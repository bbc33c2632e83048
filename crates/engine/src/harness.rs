//! Round-trip scenario driver
//!
//! A round trip is: persist a generated collection, record it, let something
//! happen, validate. [`RoundTrip`] runs that sequence with an arbitrary step
//! in the middle; [`Scenario`] describes the step as data
//! ([`Mutation`]) together with the outcome it should produce, and
//! [`run_scenario`] turns it into a [`ScenarioReport`].
//!
//! Statistics move together with indexes and data: dropping an index changes
//! `nindexes`, replacing a document changes `size`. The fail-fast validation
//! of such a scenario therefore reports the metadata first. An expected
//! [`Expectation::Mismatch`] is met when validation fails and the full list
//! of mismatches contains the expected kind.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use strata_fidelity_core::{
    CollectionMutator, Document, DocumentDatabase, FidelityError, Mismatch, MismatchKind,
    Result, StoreResult,
};

use crate::config::FidelityConfig;
use crate::generator::{CollectionDataGenerator, GeneratorOptions, SINGLE_FIELD_INDEX};
use crate::persist::create_collection_with_data_keyed;
use crate::validator::{CollectionDataValidator, Validated};

const TARGET: &str = "strata::fidelity::harness";

// ============================================================================
// RoundTrip
// ============================================================================

/// What a round trip observed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Validation succeeded
    Valid(Validated),
    /// Validation failed
    Mismatch {
        /// Mismatch the fail-fast validation stopped at
        first: Box<Mismatch>,
        /// Every mismatch, in comparison order
        all: Vec<Mismatch>,
    },
}

impl Outcome {
    /// Whether validation succeeded
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }

    /// Kinds of every mismatch, in comparison order
    pub fn mismatch_kinds(&self) -> Vec<MismatchKind> {
        match self {
            Outcome::Valid(_) => Vec::new(),
            Outcome::Mismatch { all, .. } => all.iter().map(|m| m.kind).collect(),
        }
    }
}

/// Persist, record, run a step, validate
#[derive(Debug)]
pub struct RoundTrip<'a, D: DocumentDatabase + ?Sized> {
    db: &'a D,
    collection: String,
    config: FidelityConfig,
}

impl<'a, D: DocumentDatabase + ?Sized> RoundTrip<'a, D> {
    /// Round trip over `collection` in `db` with the built-in rules
    pub fn new(db: &'a D, collection: impl Into<String>) -> Self {
        Self::with_config(db, collection, FidelityConfig::default())
    }

    /// Round trip with the given configuration
    pub fn with_config(db: &'a D, collection: impl Into<String>, config: FidelityConfig) -> Self {
        Self {
            db,
            collection: collection.into(),
            config,
        }
    }

    /// Run the round trip with `between` executed after recording
    ///
    /// # Errors
    ///
    /// Persistence and capture failures propagate, as does a failing
    /// `between` (reported as a collaborator failure of `operation`).
    /// Mismatches do not: they are the [`Outcome`].
    pub fn execute<F>(
        &self,
        options: GeneratorOptions,
        operation: &str,
        between: F,
    ) -> Result<Outcome>
    where
        F: FnOnce(&D::Collection) -> StoreResult<()>,
    {
        let collection = create_collection_with_data_keyed(
            self.db,
            &self.collection,
            CollectionDataGenerator::new(options),
            &self.config.ordering_key,
        )?;

        let mut validator = CollectionDataValidator::with_config(self.config.clone());
        validator.record(&collection)?;

        between(&collection).map_err(|e| FidelityError::collaborator(operation, e))?;

        match validator.validate(&collection) {
            Ok(validated) => Ok(Outcome::Valid(validated)),
            Err(FidelityError::Mismatch(first)) => {
                let all = validator.diff(&collection)?;
                Ok(Outcome::Mismatch { first, all })
            }
            Err(other) => Err(other),
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// Write issued between recording and validating
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Leave the collection alone
    None,
    /// Drop the named index
    DropIndex(String),
    /// Replace the document with this ordering key value
    ReplaceDocument {
        /// Ordering key of the document
        id: Value,
        /// New content; the ordering key is kept
        replacement: Document,
    },
    /// Insert one more document
    InsertDocument(Document),
    /// Remove the document with this ordering key
    RemoveDocument(Value),
}

impl Mutation {
    /// Shell name of the operation, for logs and errors
    pub fn operation(&self) -> &'static str {
        match self {
            Mutation::None => "none",
            Mutation::DropIndex(_) => "dropIndex",
            Mutation::ReplaceDocument { .. } => "update",
            Mutation::InsertDocument(_) => "insert",
            Mutation::RemoveDocument(_) => "remove",
        }
    }

    /// Issue the write against `collection`, addressing documents by
    /// `ordering_key`
    ///
    /// # Errors
    ///
    /// Returns the database's error for the write.
    pub fn apply<C>(&self, collection: &C, ordering_key: &str) -> StoreResult<()>
    where
        C: CollectionMutator + ?Sized,
    {
        match self {
            Mutation::None => Ok(()),
            Mutation::DropIndex(name) => collection.drop_index(name),
            Mutation::ReplaceDocument { id, replacement } => {
                collection.update_one(ordering_key, id, replacement.clone())
            }
            Mutation::InsertDocument(document) => collection.insert(document.clone()),
            Mutation::RemoveDocument(id) => collection.remove_one(ordering_key, id),
        }
    }
}

/// Outcome a scenario should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Validation succeeds
    Valid,
    /// Validation fails and reports a mismatch of this kind
    Mismatch(MismatchKind),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Valid => write!(f, "valid"),
            Expectation::Mismatch(kind) => write!(f, "{}", kind),
        }
    }
}

/// A round trip with a known perturbation and expected outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Collection to generate
    pub generator: GeneratorOptions,
    /// Write issued between recording and validating
    pub mutation: Mutation,
    /// Outcome the scenario should produce
    pub expected: Expectation,
}

/// Result of running one scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Expected outcome
    pub expected: Expectation,
    /// Observed outcome
    pub outcome: Outcome,
}

impl ScenarioReport {
    /// Whether the observed outcome is the expected one
    pub fn met_expectation(&self) -> bool {
        match (&self.expected, &self.outcome) {
            (Expectation::Valid, Outcome::Valid(_)) => true,
            (Expectation::Mismatch(kind), Outcome::Mismatch { all, .. }) => {
                all.iter().any(|m| m.kind == *kind)
            }
            _ => false,
        }
    }
}

/// Run `scenario` against `collection` in `db`
///
/// # Errors
///
/// Programming and collaborator failures propagate; mismatches are part of
/// the report.
pub fn run_scenario<D>(
    db: &D,
    collection: &str,
    scenario: &Scenario,
    config: &FidelityConfig,
) -> Result<ScenarioReport>
where
    D: DocumentDatabase + ?Sized,
    D::Collection: CollectionMutator,
{
    let outcome = RoundTrip::with_config(db, collection, config.clone()).execute(
        scenario.generator,
        scenario.mutation.operation(),
        |c| scenario.mutation.apply(c, &config.ordering_key),
    )?;
    let report = ScenarioReport {
        name: scenario.name.clone(),
        expected: scenario.expected,
        outcome,
    };
    info!(
        target: TARGET,
        scenario = %report.name,
        expected = %report.expected,
        valid = report.outcome.is_valid(),
        met = report.met_expectation(),
        "Scenario finished"
    );
    Ok(report)
}

/// Run every scenario in order against the same collection name
///
/// # Errors
///
/// Stops at the first scenario that fails with a programming or
/// collaborator error.
pub fn run_scenarios<D>(
    db: &D,
    collection: &str,
    scenarios: &[Scenario],
    config: &FidelityConfig,
) -> Result<Vec<ScenarioReport>>
where
    D: DocumentDatabase + ?Sized,
    D::Collection: CollectionMutator,
{
    scenarios
        .iter()
        .map(|scenario| run_scenario(db, collection, scenario, config))
        .collect()
}

/// The standard round-trip scenarios over `documents` generated documents
///
/// For a capped and then a non-capped collection:
/// - unmodified: validates
/// - generated index dropped: indexes not equal
/// - one document's field changed: data not equal
pub fn standard_scenarios(documents: usize) -> Vec<Scenario> {
    let mut scenarios = Vec::with_capacity(6);
    for capped in [true, false] {
        let label = if capped { "capped" } else { "uncapped" };
        let generator = GeneratorOptions {
            capped,
            documents,
            ..GeneratorOptions::default()
        };

        let mut replacement = Document::new();
        replacement.insert("dummy".to_string(), Value::from(1));

        scenarios.push(Scenario {
            name: format!("{} unmodified", label),
            generator,
            mutation: Mutation::None,
            expected: Expectation::Valid,
        });
        scenarios.push(Scenario {
            name: format!("{} index dropped", label),
            generator,
            mutation: Mutation::DropIndex(SINGLE_FIELD_INDEX.to_string()),
            expected: Expectation::Mismatch(MismatchKind::Indexes),
        });
        scenarios.push(Scenario {
            name: format!("{} document updated", label),
            generator,
            mutation: Mutation::ReplaceDocument {
                id: Value::from(0),
                replacement,
            },
            expected: Expectation::Mismatch(MismatchKind::Data),
        });
    }
    scenarios
}
