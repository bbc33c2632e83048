//! Round-trip validator
//!
//! [`CollectionDataValidator`] records a reference snapshot of a collection
//! and later checks that a fresh capture is equivalent to it:
//!
//! ```text
//! record(c)    -> reference = capture(c)
//!   ... upgrade, downgrade, migration, replication ...
//! validate(c)  -> compare(reference, capture(c))
//! ```
//!
//! Only one reference is held at a time; recording again replaces it.

use serde::Serialize;
use tracing::{info, warn};

use strata_fidelity_core::{DocumentCollection, FidelityError, Mismatch, Result};

use crate::compare::{all_mismatches, first_mismatch};
use crate::config::FidelityConfig;
use crate::snapshot::CollectionSnapshot;

/// Counts of what a successful validation compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validated {
    /// Indexes compared
    pub indexes: usize,
    /// Documents compared
    pub documents: usize,
}

#[derive(Debug, Clone)]
enum ValidatorState {
    Uninitialized,
    Ready(Box<CollectionSnapshot>),
}

/// Records a collection's state and validates later captures against it
///
/// # Example
///
/// ```
/// use strata_fidelity_core::{CollectionOptions, DocumentCollection, DocumentDatabase};
/// use strata_fidelity_engine::CollectionDataValidator;
/// use strata_fidelity_storage::MemoryDatabase;
///
/// let db = MemoryDatabase::new("test");
/// db.create_collection("c", &CollectionOptions::default()).unwrap();
/// let c = db.collection("c");
///
/// let mut validator = CollectionDataValidator::new();
/// validator.record(&c).unwrap();
/// assert!(validator.validate(&c).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CollectionDataValidator {
    state: ValidatorState,
    config: FidelityConfig,
}

impl Default for CollectionDataValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionDataValidator {
    /// Validator with the built-in rules
    pub fn new() -> Self {
        Self::with_config(FidelityConfig::default())
    }

    /// Validator with the given rules and ordering key
    pub fn with_config(config: FidelityConfig) -> Self {
        Self {
            state: ValidatorState::Uninitialized,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &FidelityConfig {
        &self.config
    }

    /// Whether a reference has been recorded
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ValidatorState::Ready(_))
    }

    /// The recorded reference, if any
    pub fn reference(&self) -> Option<&CollectionSnapshot> {
        match &self.state {
            ValidatorState::Ready(snapshot) => Some(snapshot),
            ValidatorState::Uninitialized => None,
        }
    }

    /// Forget the recorded reference
    pub fn reset(&mut self) {
        self.state = ValidatorState::Uninitialized;
    }

    /// Capture `collection` and keep it as the reference
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Collaborator`] if the collection cannot be
    /// read. The previous reference is kept in that case.
    pub fn record<C>(&mut self, collection: &C) -> Result<&CollectionSnapshot>
    where
        C: DocumentCollection + ?Sized,
    {
        let snapshot = self.capture(collection)?;
        info!(
            target: "strata::fidelity::validator",
            ns = %snapshot.namespace(),
            indexes = snapshot.indexes().len(),
            documents = snapshot.documents().len(),
            "Collection data recorded"
        );
        self.state = ValidatorState::Ready(Box::new(snapshot));
        match &self.state {
            ValidatorState::Ready(reference) => Ok(&**reference),
            ValidatorState::Uninitialized => unreachable!(),
        }
    }

    /// Check `collection` against the reference, stopping at the first mismatch
    ///
    /// # Errors
    ///
    /// - [`FidelityError::Uninitialized`] if nothing was recorded
    /// - [`FidelityError::Collaborator`] if the collection cannot be read
    /// - [`FidelityError::Mismatch`] on the first divergence: metadata, then
    ///   index count and indexes, then document count and documents
    pub fn validate<C>(&self, collection: &C) -> Result<Validated>
    where
        C: DocumentCollection + ?Sized,
    {
        let reference = self.reference().ok_or(FidelityError::Uninitialized)?;
        let fresh = self.capture(collection)?;
        self.validate_snapshot(reference, &fresh)
    }

    /// Check an already captured snapshot against the reference
    ///
    /// # Errors
    ///
    /// [`FidelityError::Uninitialized`] or [`FidelityError::Mismatch`], as
    /// for [`validate`](Self::validate).
    pub fn validate_against(&self, fresh: &CollectionSnapshot) -> Result<Validated> {
        let reference = self.reference().ok_or(FidelityError::Uninitialized)?;
        self.validate_snapshot(reference, fresh)
    }

    /// Every divergence between `collection` and the reference
    ///
    /// An empty list means [`validate`](Self::validate) would succeed.
    ///
    /// # Errors
    ///
    /// [`FidelityError::Uninitialized`] if nothing was recorded, or
    /// [`FidelityError::Collaborator`] if the collection cannot be read.
    pub fn diff<C>(&self, collection: &C) -> Result<Vec<Mismatch>>
    where
        C: DocumentCollection + ?Sized,
    {
        let reference = self.reference().ok_or(FidelityError::Uninitialized)?;
        let fresh = self.capture(collection)?;
        let mismatches = all_mismatches(reference, &fresh, &self.config.compare);
        for m in &mismatches {
            warn!(
                target: "strata::fidelity::validator",
                ns = %fresh.namespace(),
                kind = %m.kind,
                "{}",
                m
            );
        }
        Ok(mismatches)
    }

    fn capture<C>(&self, collection: &C) -> Result<CollectionSnapshot>
    where
        C: DocumentCollection + ?Sized,
    {
        CollectionSnapshot::capture(collection, &self.config.capture, &self.config.ordering_key)
    }

    fn validate_snapshot(
        &self,
        reference: &CollectionSnapshot,
        fresh: &CollectionSnapshot,
    ) -> Result<Validated> {
        if let Some(mismatch) = first_mismatch(reference, fresh, &self.config.compare) {
            warn!(
                target: "strata::fidelity::validator",
                ns = %fresh.namespace(),
                kind = %mismatch.kind,
                "{}",
                mismatch
            );
            return Err(mismatch.into());
        }
        let validated = Validated {
            indexes: fresh.indexes().len(),
            documents: fresh.documents().len(),
        };
        info!(
            target: "strata::fidelity::validator",
            ns = %fresh.namespace(),
            indexes = validated.indexes,
            documents = validated.documents,
            "Collection data validated"
        );
        Ok(validated)
    }
}
