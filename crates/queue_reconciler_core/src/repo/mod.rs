//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the host contracts the reconciler depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `InvalidData`) in
//!   addition to DB transport errors.

pub mod party_repo;
pub mod sqlite_store;
