//! Domain model for the course catalog and learner progress.
//!
//! # Responsibility
//! - Define canonical records used by repositories and services.
//! - Hold pure ordering and aggregation logic with no storage access.
//!
//! # Invariants
//! - Ordered records expose their rank through `ordering::Ranked`.
//! - Aggregations are deterministic functions of their input rows.

pub mod catalog;
pub mod ordering;
pub mod progress;
