//! `relief-core`: shared relief-supply building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod supply;

pub use error::{DomainError, DomainResult};
pub use id::{AllocationRunId, ItemId};
pub use supply::{AllocationCandidate, CandidateEntry, Category, RequirementEstimate, RetrievedCandidate};
