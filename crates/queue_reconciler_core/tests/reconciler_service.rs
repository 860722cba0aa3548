use queue_reconciler_core::db::{open_db_in_memory, DbError};
use queue_reconciler_core::{
    ActivityParty, ActivityPartyRepository, AuditFilter, EmailId, EmailRecord, EmailRepository,
    EntityRef, OriginatingQueueRecord, OriginatingQueueRepository, ParticipationType,
    QueueReconciler, ReconcileError, ReconcileOutcome, RepoError, RepoResult, SkipReason,
    SqlitePartyStore, TargetEntity,
};
use std::cell::RefCell;
use std::error::Error;
use uuid::Uuid;

/// In-memory store that records every call the reconciler makes.
#[derive(Default)]
struct RecordingStore {
    parties: RefCell<Vec<ActivityParty>>,
    audit: Vec<OriginatingQueueRecord>,
    calls: RefCell<Vec<&'static str>>,
    fail_update: bool,
}

impl RecordingStore {
    fn new(parties: Vec<ActivityParty>, audit: Vec<OriginatingQueueRecord>) -> Self {
        Self {
            parties: RefCell::new(parties),
            audit,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn update_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| **call == "replace_party_list")
            .count()
    }
}

impl ActivityPartyRepository for RecordingStore {
    fn list_parties(&self, _email_id: EmailId) -> RepoResult<Vec<ActivityParty>> {
        self.calls.borrow_mut().push("list_parties");
        Ok(self.parties.borrow().clone())
    }
}

impl OriginatingQueueRepository for RecordingStore {
    fn find_originating_queues(
        &self,
        filter: &AuditFilter,
    ) -> RepoResult<Vec<OriginatingQueueRecord>> {
        self.calls.borrow_mut().push("find_originating_queues");
        Ok(self
            .audit
            .iter()
            .filter(|record| {
                filter.queue_ids.contains(&record.originating_queue_id)
                    || filter.created_entity_ids.contains(&record.created_entity_id)
            })
            .cloned()
            .collect())
    }
}

impl EmailRepository for RecordingStore {
    fn replace_party_list(&self, email_id: EmailId, parties: &[ActivityParty]) -> RepoResult<()> {
        self.calls.borrow_mut().push("replace_party_list");
        if self.fail_update {
            return Err(RepoError::NotFound(email_id));
        }
        *self.parties.borrow_mut() = parties.to_vec();
        Ok(())
    }
}

struct Scenario {
    sender: ActivityParty,
    to_queue: ActivityParty,
    related_a: ActivityParty,
    related_b: ActivityParty,
    queue_id: Uuid,
}

impl Scenario {
    fn new() -> Self {
        let queue_id = Uuid::new_v4();
        Self {
            sender: ActivityParty::new(
                ParticipationType::Sender,
                EntityRef::new("systemuser", Uuid::new_v4()),
            ),
            to_queue: ActivityParty::new(ParticipationType::To, EntityRef::queue(queue_id)),
            related_a: ActivityParty::new(
                ParticipationType::Related,
                EntityRef::new("incident", Uuid::new_v4()),
            ),
            related_b: ActivityParty::new(
                ParticipationType::Related,
                EntityRef::new("incident", Uuid::new_v4()),
            ),
            queue_id,
        }
    }

    fn parties(&self) -> Vec<ActivityParty> {
        vec![
            self.sender.clone(),
            self.to_queue.clone(),
            self.related_a.clone(),
            self.related_b.clone(),
        ]
    }

    fn audit_for(&self, party: &ActivityParty) -> OriginatingQueueRecord {
        OriginatingQueueRecord::new(&party.party_id, self.queue_id)
    }
}

#[test]
fn unjustified_related_party_is_removed_with_one_update() {
    let scenario = Scenario::new();
    let store = RecordingStore::new(scenario.parties(), vec![scenario.audit_for(&scenario.related_a)]);
    let reconciler = QueueReconciler::new(store);

    let outcome = reconciler.reconcile(Uuid::new_v4()).unwrap();
    let expected_kept = vec![
        scenario.sender.clone(),
        scenario.to_queue.clone(),
        scenario.related_a.clone(),
    ];
    assert_eq!(
        outcome,
        ReconcileOutcome::Updated {
            kept: expected_kept.clone(),
            removed: vec![scenario.related_b.clone()],
        }
    );
    assert_eq!(reconciler.store().update_count(), 1);
    assert_eq!(*reconciler.store().parties.borrow(), expected_kept);
}

#[test]
fn fully_justified_list_issues_no_update() {
    let scenario = Scenario::new();
    let store = RecordingStore::new(
        scenario.parties(),
        vec![
            scenario.audit_for(&scenario.related_a),
            scenario.audit_for(&scenario.related_b),
        ],
    );
    let reconciler = QueueReconciler::new(store);

    let outcome = reconciler.reconcile(Uuid::new_v4()).unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Unchanged {
            kept: scenario.parties()
        }
    );
    assert!(!outcome.wrote_update());
    assert_eq!(
        reconciler.store().calls(),
        vec!["list_parties", "find_originating_queues"]
    );
}

#[test]
fn second_run_is_a_no_op() {
    let scenario = Scenario::new();
    let store = RecordingStore::new(scenario.parties(), vec![scenario.audit_for(&scenario.related_a)]);
    let reconciler = QueueReconciler::new(store);
    let email_id = Uuid::new_v4();

    assert!(reconciler.reconcile(email_id).unwrap().wrote_update());
    assert!(!reconciler.reconcile(email_id).unwrap().wrote_update());
    assert_eq!(reconciler.store().update_count(), 1);
}

#[test]
fn addressing_parties_are_kept_without_audit_records() {
    let scenario = Scenario::new();
    let parties = vec![scenario.sender.clone(), scenario.to_queue.clone()];
    let reconciler = QueueReconciler::new(RecordingStore::new(parties.clone(), Vec::new()));

    let outcome = reconciler.reconcile(Uuid::new_v4()).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unchanged { kept: parties });
}

#[test]
fn mail_without_queues_or_related_parties_skips_audit_lookup() {
    let parties = vec![
        ActivityParty::new(
            ParticipationType::Sender,
            EntityRef::new("systemuser", Uuid::new_v4()),
        ),
        ActivityParty::new(ParticipationType::To, EntityRef::new("contact", Uuid::new_v4())),
    ];
    let reconciler = QueueReconciler::new(RecordingStore::new(parties, Vec::new()));

    reconciler.reconcile(Uuid::new_v4()).unwrap();
    assert_eq!(reconciler.store().calls(), vec!["list_parties"]);
}

#[test]
fn non_email_target_is_skipped_without_queries() {
    let scenario = Scenario::new();
    let reconciler = QueueReconciler::new(RecordingStore::new(scenario.parties(), Vec::new()));

    let target = TargetEntity::new("task", Uuid::new_v4());
    let outcome = reconciler.handle_create(&target).unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Skipped {
            reason: SkipReason::NotAnEmail
        }
    );
    assert!(reconciler.store().calls().is_empty());
}

#[test]
fn flagged_direction_is_skipped_without_queries() {
    let scenario = Scenario::new();
    let reconciler = QueueReconciler::new(RecordingStore::new(scenario.parties(), Vec::new()));

    let outcome = reconciler
        .handle_create(&TargetEntity::email(Uuid::new_v4(), true))
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Skipped {
            reason: SkipReason::InboundDirection
        }
    );
    assert!(reconciler.store().calls().is_empty());
}

#[test]
fn unflagged_email_target_is_reconciled() {
    let scenario = Scenario::new();
    let reconciler = QueueReconciler::new(RecordingStore::new(scenario.parties(), Vec::new()));

    let outcome = reconciler
        .handle_create(&TargetEntity::new("email", Uuid::new_v4()))
        .unwrap();
    match outcome {
        ReconcileOutcome::Updated { removed, .. } => assert_eq!(removed.len(), 2),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn update_failure_is_fatal_and_wrapped() {
    let scenario = Scenario::new();
    let mut store = RecordingStore::new(scenario.parties(), Vec::new());
    store.fail_update = true;
    let reconciler = QueueReconciler::new(store);
    let email_id = Uuid::new_v4();

    let err = reconciler.reconcile(email_id).unwrap_err();
    let ReconcileError::Failed { email_id: failed_id, .. } = &err;
    assert_eq!(*failed_id, email_id);
    assert!(err.to_string().starts_with("unexpected error while reconciling email"));
    assert!(err.source().is_some());
    assert_eq!(reconciler.store().update_count(), 1);
}

#[test]
fn sqlite_store_reconciles_end_to_end() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartyStore::try_new(&conn).unwrap();
    let scenario = Scenario::new();
    let email = EmailRecord {
        id: Uuid::new_v4(),
        subject: None,
        direction_code: false,
    };
    store.create_email(&email).unwrap();
    for party in scenario.parties() {
        store.append_party(email.id, &party).unwrap();
    }
    store
        .record_originating_queue(&scenario.audit_for(&scenario.related_a))
        .unwrap();

    let reconciler = QueueReconciler::new(store);
    let first = reconciler.handle_create(&email.to_target()).unwrap();
    assert!(first.wrote_update());
    let second = reconciler.handle_create(&email.to_target()).unwrap();
    assert!(!second.wrote_update());

    let stored = reconciler.store().list_parties(email.id).unwrap();
    assert_eq!(
        stored,
        vec![scenario.sender, scenario.to_queue, scenario.related_a]
    );
}

#[test]
fn sqlite_store_failure_surfaces_as_reconcile_error() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartyStore::try_new(&conn).unwrap();
    conn.execute_batch("DROP TABLE originating_queues;").unwrap();

    let email = EmailRecord {
        id: Uuid::new_v4(),
        subject: None,
        direction_code: false,
    };
    store.create_email(&email).unwrap();
    store
        .append_party(
            email.id,
            &ActivityParty::new(
                ParticipationType::Related,
                EntityRef::new("incident", Uuid::new_v4()),
            ),
        )
        .unwrap();

    let reconciler = QueueReconciler::new(store);
    let err = reconciler.reconcile(email.id).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Failed {
            source: RepoError::Db(DbError::Sqlite(_)),
            ..
        }
    ));
}

#[test]
fn audit_row_stored_in_uppercase_still_justifies_related_party() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartyStore::try_new(&conn).unwrap();
    let case = EntityRef::new("incident", Uuid::new_v4());
    conn.execute(
        "INSERT INTO originating_queues (created_entity_id, created_entity_type, queue_id)
         VALUES (?1, 'incident', ?2);",
        [
            case.id.to_string().to_uppercase(),
            Uuid::new_v4().to_string(),
        ],
    )
    .unwrap();

    let email = EmailRecord {
        id: Uuid::new_v4(),
        subject: None,
        direction_code: false,
    };
    store.create_email(&email).unwrap();
    let related = ActivityParty::new(ParticipationType::Related, case);
    store.append_party(email.id, &related).unwrap();

    let reconciler = QueueReconciler::new(store);
    let outcome = reconciler.reconcile(email.id).unwrap();
    assert!(!outcome.wrote_update());
    assert_eq!(
        reconciler.store().list_parties(email.id).unwrap(),
        vec![related]
    );
}
