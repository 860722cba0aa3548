//! Activity-party and originating-queue records.
//!
//! # Responsibility
//! - Define the participant references attached to an email.
//! - Define the audit rows that justify auto-added participants.
//!
//! # Invariants
//! - `EntityRef` equality compares logical name and id, never display data.
//! - Party order inside an email is significant and preserved on write.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of the email activity that owns a party list.
pub type EmailId = Uuid;

/// Logical name of queue records.
pub const QUEUE_ENTITY: &str = "queue";

/// Typed reference to another record (`logical_name` + `id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub logical_name: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
        }
    }

    /// Shorthand for a reference to a queue record.
    pub fn queue(id: Uuid) -> Self {
        Self::new(QUEUE_ENTITY, id)
    }

    pub fn is_queue(&self) -> bool {
        self.logical_name == QUEUE_ENTITY
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.logical_name, self.id)
    }
}

/// Role of a party on an activity (participation type mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ParticipationType {
    Sender,
    To,
    Cc,
    Bcc,
    /// Added automatically by record-creation rules (mask 13).
    Related,
    /// Any other mask the platform defines; never touched by reconciliation.
    Other(i32),
}

impl ParticipationType {
    pub fn from_mask(mask: i32) -> Self {
        match mask {
            1 => Self::Sender,
            2 => Self::To,
            3 => Self::Cc,
            4 => Self::Bcc,
            13 => Self::Related,
            other => Self::Other(other),
        }
    }

    pub fn mask(self) -> i32 {
        match self {
            Self::Sender => 1,
            Self::To => 2,
            Self::Cc => 3,
            Self::Bcc => 4,
            Self::Related => 13,
            Self::Other(mask) => mask,
        }
    }

    /// Sender/To/Cc/Bcc.
    pub fn is_addressing(self) -> bool {
        matches!(self, Self::Sender | Self::To | Self::Cc | Self::Bcc)
    }
}

impl From<i32> for ParticipationType {
    fn from(value: i32) -> Self {
        Self::from_mask(value)
    }
}

impl From<ParticipationType> for i32 {
    fn from(value: ParticipationType) -> Self {
        value.mask()
    }
}

/// One participant entry attached to an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParty {
    /// Row identity of this party entry.
    pub activity_party_id: Uuid,
    /// The referenced participant record.
    pub party_id: EntityRef,
    /// Serialized as `participationtypemask` to match platform naming.
    #[serde(rename = "participationtypemask")]
    pub role: ParticipationType,
    /// Address the message was actually sent to, when known.
    #[serde(default)]
    pub address_used: Option<String>,
}

impl ActivityParty {
    /// Creates a party entry with a generated row identity.
    pub fn new(role: ParticipationType, party_id: EntityRef) -> Self {
        Self {
            activity_party_id: Uuid::new_v4(),
            party_id,
            role,
            address_used: None,
        }
    }

    pub fn is_related(&self) -> bool {
        self.role == ParticipationType::Related
    }
}

/// Audit row written when a record-creation rule auto-attaches an entity.
///
/// `created_entity_type` + `created_entity_id` name the attached record;
/// `originating_queue_id` is the queue whose rule created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginatingQueueRecord {
    pub created_entity_id: Uuid,
    pub created_entity_type: String,
    pub originating_queue_id: Uuid,
}

impl OriginatingQueueRecord {
    pub fn new(created: &EntityRef, originating_queue_id: Uuid) -> Self {
        Self {
            created_entity_id: created.id,
            created_entity_type: created.logical_name.clone(),
            originating_queue_id,
        }
    }

    /// Returns the reference this record justifies.
    pub fn created_entity(&self) -> EntityRef {
        EntityRef::new(self.created_entity_type.clone(), self.created_entity_id)
    }

    /// Whether this record justifies the given party reference.
    pub fn justifies(&self, party_ref: &EntityRef) -> bool {
        self.created_entity_id == party_ref.id && self.created_entity_type == party_ref.logical_name
    }
}
