//! Host-boundary contracts for party reconciliation.
//!
//! # Responsibility
//! - Define the reads the reconciler issues (parties, originating queues).
//! - Hide the platform's "replace whole collection" write behind one call.
//!
//! # Invariants
//! - `list_parties` returns every party of the email, in stored order.
//! - `find_originating_queues` with an empty filter returns no records.
//! - `replace_party_list` is all-or-nothing.

use crate::db::DbError;
use crate::model::party::{ActivityParty, EmailId, OriginatingQueueRecord};
use crate::reconcile::plan::AuditFilter;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for party store reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(EmailId),
    /// Stored identifiers or masks could not be parsed.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "email not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid stored party data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Reads the party list attached to an activity.
pub trait ActivityPartyRepository {
    /// All parties whose activity reference equals `email_id`, all columns.
    fn list_parties(&self, email_id: EmailId) -> RepoResult<Vec<ActivityParty>>;
}

/// Reads the audit trail written by record-creation rules.
pub trait OriginatingQueueRepository {
    /// Records matching `queue_id IN filter.queue_ids OR created_entity_id IN
    /// filter.created_entity_ids`.
    fn find_originating_queues(&self, filter: &AuditFilter)
        -> RepoResult<Vec<OriginatingQueueRecord>>;
}

/// Writes an email's party collection.
pub trait EmailRepository {
    /// Replaces the full party collection of `email_id` with `parties`.
    fn replace_party_list(&self, email_id: EmailId, parties: &[ActivityParty]) -> RepoResult<()>;
}

/// Everything the reconciler needs from its host.
pub trait PartyStore: ActivityPartyRepository + OriginatingQueueRepository + EmailRepository {}

impl<T> PartyStore for T where T: ActivityPartyRepository + OriginatingQueueRepository + EmailRepository
{}
