//! Pure party-list reconciliation.
//!
//! # Responsibility
//! - Derive the audit lookup filter from an email's parties.
//! - Compute which auto-added parties survive, without touching storage.
//!
//! # Invariants
//! - Only `Related` parties are ever candidates for removal.
//! - Output order equals input order minus removed entries.

pub mod plan;
