//! Deterministic core of the PharmAI assistant: the read-only demo dataset,
//! free-text medication matching, the shared error taxonomy, and layered
//! configuration. Nothing in this crate talks to the network.

pub mod config;
pub mod dataset;
pub mod domain;
pub mod errors;
pub mod matcher;

pub use dataset::Dataset;
pub use domain::medication::{Medication, MedicationId, MedicationSummary};
pub use domain::user::{User, UserId, UserSummary};
pub use errors::{ApplicationError, DomainError, ErrorCode, InterfaceError};
pub use matcher::{normalize_text, MedicationMatcher};
