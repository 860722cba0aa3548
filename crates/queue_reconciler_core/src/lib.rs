//! Core logic for the email queue reconciler.
//! Prunes auto-added parties whose originating-queue justification is gone.

pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::party::{
    ActivityParty, EmailId, EntityRef, OriginatingQueueRecord, ParticipationType, QUEUE_ENTITY,
};
pub use model::target::{TargetEntity, DIRECTION_CODE_ATTRIBUTE, EMAIL_ENTITY};
pub use reconcile::plan::{audit_filter, plan_reconciliation, AuditFilter, ReconcilePlan};
pub use repo::party_repo::{
    ActivityPartyRepository, EmailRepository, OriginatingQueueRepository, PartyStore, RepoError,
    RepoResult,
};
pub use repo::sqlite_store::{
    EmailFixture, EmailRecord, ImportSummary, SqlitePartyStore, StoreFixture,
};
pub use service::reconciler::{
    QueueReconciler, ReconcileError, ReconcileOutcome, ReconcileResult, SkipReason,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
