//! Audit filter construction and keep/remove planning.

use crate::model::party::{ActivityParty, OriginatingQueueRecord};
use std::collections::HashSet;
use uuid::Uuid;

/// Two OR-ed filter groups for the originating-queue lookup.
///
/// A record matches when its queue id is in `queue_ids` or its created
/// entity id is in `created_entity_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Queues still addressed as Sender/To/Cc/Bcc.
    pub queue_ids: Vec<Uuid>,
    /// Records currently attached as `Related`.
    pub created_entity_ids: Vec<Uuid>,
}

impl AuditFilter {
    /// An empty filter matches no record.
    pub fn is_empty(&self) -> bool {
        self.queue_ids.is_empty() && self.created_entity_ids.is_empty()
    }
}

/// Result of planning one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// New party list, original relative order.
    pub kept: Vec<ActivityParty>,
    /// `Related` parties with no justifying audit record.
    pub removed: Vec<ActivityParty>,
}

impl ReconcilePlan {
    pub fn requires_update(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Builds the audit lookup filter for the given parties.
///
/// Ids keep first-appearance order and are deduplicated.
pub fn audit_filter(parties: &[ActivityParty]) -> AuditFilter {
    let mut filter = AuditFilter::default();
    let mut seen_queues = HashSet::new();
    let mut seen_entities = HashSet::new();

    for party in parties {
        if party.role.is_addressing() && party.party_id.is_queue() {
            if seen_queues.insert(party.party_id.id) {
                filter.queue_ids.push(party.party_id.id);
            }
        } else if party.is_related() && seen_entities.insert(party.party_id.id) {
            filter.created_entity_ids.push(party.party_id.id);
        }
    }

    filter
}

/// Splits parties into kept and removed sets.
///
/// Non-`Related` parties are kept unconditionally. A `Related` party is kept
/// iff some record in `audit_records` names the same entity type and id.
pub fn plan_reconciliation(
    parties: &[ActivityParty],
    audit_records: &[OriginatingQueueRecord],
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for party in parties {
        if !party.is_related() {
            plan.kept.push(party.clone());
            continue;
        }

        let justified = audit_records
            .iter()
            .any(|record| record.justifies(&party.party_id));
        if justified {
            plan.kept.push(party.clone());
        } else {
            plan.removed.push(party.clone());
        }
    }

    plan
}
