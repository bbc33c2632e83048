//! In-memory reference database for Strata fidelity
//!
//! This crate implements the collaborator traits of `strata-fidelity-core`
//! without a server:
//! - MemoryDatabase / MemoryCollection: shared-state handles
//! - CollectionState: documents, index catalog, capped eviction, uniqueness
//! - StatsProfile: per-release `collStats` shape (2.4, 2.6, 2.8)
//! - ShardingContext: router-only statistics fields
//!
//! It is the database the harness's own tests and scenarios run against, and
//! the model of what the harness expects from a real backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collection;
pub mod database;
pub mod profile;

pub use database::{MemoryCollection, MemoryDatabase};
pub use profile::{ShardingContext, StatsProfile};
