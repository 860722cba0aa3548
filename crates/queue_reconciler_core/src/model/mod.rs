//! Domain model for email parties and their audit trail.
//!
//! # Responsibility
//! - Define the records the reconciler reads and writes.
//! - Keep platform naming (`participationtypemask`, `directioncode`) at the
//!   serialization edge only.
//!
//! # Invariants
//! - Party identity for reconciliation is `EntityRef` (type + id).

pub mod party;
pub mod target;
