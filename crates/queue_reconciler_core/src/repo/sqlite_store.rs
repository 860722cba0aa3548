//! SQLite-backed party store.
//!
//! # Responsibility
//! - Implement the reconciler's host contracts over `emails`,
//!   `activity_parties` and `originating_queues`.
//! - Provide seeding/inspection helpers for the CLI and tests.
//!
//! # Invariants
//! - Party order is the `position` column, dense from 0 after every replace.
//! - Read paths reject unparsable ids instead of skipping rows.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::party::{
    ActivityParty, EmailId, EntityRef, OriginatingQueueRecord, ParticipationType,
};
use crate::model::target::TargetEntity;
use crate::reconcile::plan::AuditFilter;
use crate::repo::party_repo::{
    ActivityPartyRepository, EmailRepository, OriginatingQueueRepository, RepoError, RepoResult,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PARTY_SELECT_SQL: &str = "SELECT
    activity_party_id,
    party_type,
    party_id,
    participation_type_mask,
    address_used
FROM activity_parties";

/// Stored email header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    #[serde(default)]
    pub subject: Option<String>,
    /// `true` marks the direction the create handler ignores.
    #[serde(default)]
    pub direction_code: bool,
}

impl EmailRecord {
    /// Builds the create-handler payload for this email.
    pub fn to_target(&self) -> TargetEntity {
        TargetEntity::email(self.id, self.direction_code)
    }
}

/// One email plus its party list, as loaded from a fixture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFixture {
    #[serde(flatten)]
    pub email: EmailRecord,
    #[serde(default)]
    pub parties: Vec<ActivityParty>,
}

/// Bulk seed data for a party store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub emails: Vec<EmailFixture>,
    #[serde(default)]
    pub originating_queues: Vec<OriginatingQueueRecord>,
}

/// Counts written by `import_fixture`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub emails: usize,
    pub parties: usize,
    pub originating_queues: usize,
}

/// SQLite-backed implementation of every party store contract.
pub struct SqlitePartyStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePartyStore<'conn> {
    /// Wraps a connection returned by `open_db` / `open_db_in_memory`.
    ///
    /// # Errors
    /// - `DbError::SchemaNotReady` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let db_version = current_user_version(conn)?;
        let expected = latest_version();
        if db_version != expected {
            return Err(RepoError::Db(DbError::SchemaNotReady {
                db_version,
                expected,
            }));
        }
        Ok(Self { conn })
    }

    pub fn create_email(&self, email: &EmailRecord) -> RepoResult<EmailId> {
        self.conn.execute(
            "INSERT INTO emails (id, subject, direction_code) VALUES (?1, ?2, ?3);",
            params![
                email.id.to_string(),
                email.subject.as_deref(),
                bool_to_int(email.direction_code),
            ],
        )?;
        Ok(email.id)
    }

    pub fn get_email(&self, id: EmailId) -> RepoResult<Option<EmailRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, subject, direction_code FROM emails WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(EmailRecord {
                id,
                subject: row.get("subject")?,
                direction_code: parse_bool(row.get("direction_code")?)?,
            })),
            None => Ok(None),
        }
    }

    /// Appends one party at the end of the email's list.
    pub fn append_party(&self, email_id: EmailId, party: &ActivityParty) -> RepoResult<()> {
        self.ensure_email_exists(email_id)?;
        let next_position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM activity_parties WHERE activity_id = ?1;",
            [email_id.to_string()],
            |row| row.get(0),
        )?;
        insert_party(self.conn, email_id, next_position, party)
    }

    pub fn record_originating_queue(&self, record: &OriginatingQueueRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO originating_queues (created_entity_id, created_entity_type, queue_id)
             VALUES (?1, ?2, ?3);",
            params![
                record.created_entity_id.to_string(),
                record.created_entity_type.as_str(),
                record.originating_queue_id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Loads a fixture in one transaction.
    pub fn import_fixture(&self, fixture: &StoreFixture) -> RepoResult<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for entry in &fixture.emails {
            self.create_email(&entry.email)?;
            summary.emails += 1;
            for party in &entry.parties {
                self.append_party(entry.email.id, party)?;
                summary.parties += 1;
            }
        }
        for record in &fixture.originating_queues {
            self.record_originating_queue(record)?;
            summary.originating_queues += 1;
        }

        tx.commit()?;
        Ok(summary)
    }

    fn ensure_email_exists(&self, email_id: EmailId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM emails WHERE id = ?1);",
            [email_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound(email_id));
        }
        Ok(())
    }
}

impl ActivityPartyRepository for SqlitePartyStore<'_> {
    fn list_parties(&self, email_id: EmailId) -> RepoResult<Vec<ActivityParty>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTY_SELECT_SQL}
             WHERE activity_id = ?1
             ORDER BY position ASC;"
        ))?;
        let mut rows = stmt.query([email_id.to_string()])?;
        let mut parties = Vec::new();
        while let Some(row) = rows.next()? {
            parties.push(parse_party_row(row)?);
        }

        debug!(
            "event=list_parties module=repo status=ok email_id={} count={}",
            email_id,
            parties.len()
        );
        Ok(parties)
    }
}

impl OriginatingQueueRepository for SqlitePartyStore<'_> {
    fn find_originating_queues(
        &self,
        filter: &AuditFilter,
    ) -> RepoResult<Vec<OriginatingQueueRecord>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if !filter.queue_ids.is_empty() {
            clauses.push(format!(
                "{} IN ({})",
                uuid_key_sql("queue_id"),
                placeholders(filter.queue_ids.len())
            ));
            bind_values.extend(filter.queue_ids.iter().map(uuid_key_value));
        }
        if !filter.created_entity_ids.is_empty() {
            clauses.push(format!(
                "{} IN ({})",
                uuid_key_sql("created_entity_id"),
                placeholders(filter.created_entity_ids.len())
            ));
            bind_values.extend(filter.created_entity_ids.iter().map(uuid_key_value));
        }

        let sql = format!(
            "SELECT created_entity_id, created_entity_type, queue_id
             FROM originating_queues
             WHERE {}
             ORDER BY id ASC;",
            clauses.join(" OR ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_originating_queue_row(row)?);
        }

        debug!(
            "event=find_originating_queues module=repo status=ok queues={} entities={} count={}",
            filter.queue_ids.len(),
            filter.created_entity_ids.len(),
            records.len()
        );
        Ok(records)
    }
}

impl EmailRepository for SqlitePartyStore<'_> {
    fn replace_party_list(&self, email_id: EmailId, parties: &[ActivityParty]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.ensure_email_exists(email_id)?;

        tx.execute(
            "DELETE FROM activity_parties WHERE activity_id = ?1;",
            [email_id.to_string()],
        )?;
        for (position, party) in parties.iter().enumerate() {
            let position = i64::try_from(position).map_err(|_| {
                RepoError::InvalidData(format!("party position {position} out of range"))
            })?;
            insert_party(&tx, email_id, position, party)?;
        }
        tx.execute(
            "UPDATE emails
             SET modified_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [email_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn insert_party(
    conn: &Connection,
    email_id: EmailId,
    position: i64,
    party: &ActivityParty,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO activity_parties (
            activity_party_id,
            activity_id,
            position,
            party_type,
            party_id,
            participation_type_mask,
            address_used
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            party.activity_party_id.to_string(),
            email_id.to_string(),
            position,
            party.party_id.logical_name.as_str(),
            party.party_id.id.to_string(),
            party.role.mask(),
            party.address_used.as_deref(),
        ],
    )?;
    Ok(())
}

fn parse_party_row(row: &Row<'_>) -> RepoResult<ActivityParty> {
    let activity_party_id = parse_uuid(row, "activity_party_id")?;
    let party_ref = EntityRef::new(row.get::<_, String>("party_type")?, parse_uuid(row, "party_id")?);
    Ok(ActivityParty {
        activity_party_id,
        party_id: party_ref,
        role: ParticipationType::from_mask(row.get("participation_type_mask")?),
        address_used: row.get("address_used")?,
    })
}

fn parse_originating_queue_row(row: &Row<'_>) -> RepoResult<OriginatingQueueRecord> {
    Ok(OriginatingQueueRecord {
        created_entity_id: parse_uuid(row, "created_entity_id")?,
        created_entity_type: row.get("created_entity_type")?,
        originating_queue_id: parse_uuid(row, "queue_id")?,
    })
}

fn parse_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

fn parse_bool(value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid direction_code value `{other}`"
        ))),
    }
}

/// Folds a stored UUID column to the 32-digit lowercase form, so every
/// spelling `parse_uuid` accepts compares equal to `uuid_key_value`.
fn uuid_key_sql(column: &str) -> String {
    format!(
        "replace(replace(replace(replace(lower({column}), 'urn:uuid:', ''), '-', ''), '{{', ''), '}}', '')"
    )
}

fn uuid_key_value(id: &Uuid) -> Value {
    Value::Text(id.simple().to_string())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
