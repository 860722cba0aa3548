//! Queue reconciler use-case service.
//!
//! # Responsibility
//! - Apply the email create trigger contract (type + direction checks).
//! - Orchestrate fetch -> plan -> conditional write over a `PartyStore`.
//!
//! # Invariants
//! - Skipped triggers issue no repository calls.
//! - At most one `replace_party_list` call per run, and only on removal.
//! - Repository failures abort the run; nothing is retried here.

use crate::model::party::{ActivityParty, EmailId};
use crate::model::target::TargetEntity;
use crate::reconcile::plan::{audit_filter, plan_reconciliation, ReconcilePlan};
use crate::repo::party_repo::{PartyStore, RepoError};
use log::{debug, error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Fatal failure of a reconcile run.
#[derive(Debug)]
pub enum ReconcileError {
    /// Any fetch or update failure past the trigger checks.
    Failed { email_id: EmailId, source: RepoError },
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { email_id, source } => write!(
                f,
                "unexpected error while reconciling email {email_id}: {source}"
            ),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed { source, .. } => Some(source),
        }
    }
}

/// Why a trigger was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAnEmail,
    InboundDirection,
}

/// What one trigger/reconcile run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Skipped { reason: SkipReason },
    Unchanged { kept: Vec<ActivityParty> },
    Updated {
        kept: Vec<ActivityParty>,
        removed: Vec<ActivityParty>,
    },
}

impl ReconcileOutcome {
    pub fn wrote_update(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

impl From<ReconcilePlan> for ReconcileOutcome {
    fn from(plan: ReconcilePlan) -> Self {
        if plan.requires_update() {
            Self::Updated {
                kept: plan.kept,
                removed: plan.removed,
            }
        } else {
            Self::Unchanged { kept: plan.kept }
        }
    }
}

/// Prunes unjustified auto-added parties from outgoing emails.
pub struct QueueReconciler<R: PartyStore> {
    store: R,
}

impl<R: PartyStore> QueueReconciler<R> {
    pub fn new(store: R) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Entry point for the email create pipeline.
    ///
    /// # Contract
    /// - Non-email targets and `directioncode == true` return `Skipped`
    ///   without touching the store.
    /// - Everything else runs `reconcile(target.id)`.
    pub fn handle_create(&self, target: &TargetEntity) -> ReconcileResult<ReconcileOutcome> {
        if !target.is_email() {
            info!(
                "event=handle_create module=service status=skipped reason=not_an_email entity={} id={}",
                target.logical_name, target.id
            );
            return Ok(ReconcileOutcome::Skipped {
                reason: SkipReason::NotAnEmail,
            });
        }
        if target.direction_code() {
            info!(
                "event=handle_create module=service status=skipped reason=inbound_direction id={}",
                target.id
            );
            return Ok(ReconcileOutcome::Skipped {
                reason: SkipReason::InboundDirection,
            });
        }

        self.reconcile(target.id)
    }

    /// Reconciles the party list of one email.
    ///
    /// # Contract
    /// - Non-`Related` parties are never removed.
    /// - A `Related` party survives iff an originating-queue record names it.
    /// - Writes the kept list once when something was removed, otherwise no write.
    pub fn reconcile(&self, email_id: EmailId) -> ReconcileResult<ReconcileOutcome> {
        let started_at = Instant::now();
        match self.reconcile_inner(email_id) {
            Ok(plan) => {
                info!(
                    "event=reconcile module=service status=ok email_id={} kept={} removed={} duration_ms={}",
                    email_id,
                    plan.kept.len(),
                    plan.removed.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(plan.into())
            }
            Err(source) => {
                error!(
                    "event=reconcile module=service status=error email_id={} duration_ms={} error={}",
                    email_id,
                    started_at.elapsed().as_millis(),
                    source
                );
                Err(ReconcileError::Failed { email_id, source })
            }
        }
    }

    /// Returns the applied plan; the store was written iff it requires an update.
    fn reconcile_inner(&self, email_id: EmailId) -> Result<ReconcilePlan, RepoError> {
        let parties = self.store.list_parties(email_id)?;
        let filter = audit_filter(&parties);
        let audit_records = if filter.is_empty() {
            Vec::new()
        } else {
            self.store.find_originating_queues(&filter)?
        };
        debug!(
            "event=reconcile_fetch module=service email_id={} parties={} audit_records={}",
            email_id,
            parties.len(),
            audit_records.len()
        );

        let plan = plan_reconciliation(&parties, &audit_records);
        if !plan.requires_update() {
            return Ok(plan);
        }

        for party in &plan.removed {
            debug!(
                "event=reconcile_remove module=service email_id={} party={}",
                email_id, party.party_id
            );
        }
        self.store.replace_party_list(email_id, &plan.kept)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReconcileOutcome, ReconcilePlan};
    use crate::model::party::{ActivityParty, EntityRef, ParticipationType};
    use uuid::Uuid;

    fn related() -> ActivityParty {
        ActivityParty::new(
            ParticipationType::Related,
            EntityRef::new("incident", Uuid::new_v4()),
        )
    }

    #[test]
    fn plan_without_removals_maps_to_unchanged() {
        let kept = vec![related()];
        let outcome = ReconcileOutcome::from(ReconcilePlan {
            kept: kept.clone(),
            removed: Vec::new(),
        });
        assert_eq!(outcome, ReconcileOutcome::Unchanged { kept });
        assert!(!outcome.wrote_update());
    }

    #[test]
    fn plan_with_removals_maps_to_updated() {
        let kept = vec![related()];
        let removed = vec![related()];
        let outcome = ReconcileOutcome::from(ReconcilePlan {
            kept: kept.clone(),
            removed: removed.clone(),
        });
        assert_eq!(outcome, ReconcileOutcome::Updated { kept, removed });
        assert!(outcome.wrote_update());
    }
}
