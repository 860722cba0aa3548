//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the reconcile use-case.
//! - Keep CLI/host layers decoupled from storage details.

pub mod reconciler;
