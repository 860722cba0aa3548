//! Trigger payload for the email create pipeline.
//!
//! # Responsibility
//! - Carry the record being created: logical name, id and attribute bag.
//! - Expose the few attributes the reconciler reads.
//!
//! # Invariants
//! - Missing or non-boolean `directioncode` reads as `false`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Logical name of email activities.
pub const EMAIL_ENTITY: &str = "email";
/// Boolean attribute flagging the message direction.
pub const DIRECTION_CODE_ATTRIBUTE: &str = "directioncode";

/// Record passed to the create handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntity {
    pub logical_name: String,
    pub id: Uuid,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl TargetEntity {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            attributes: Map::new(),
        }
    }

    /// Builds an email target with `directioncode` set.
    pub fn email(id: Uuid, direction_code: bool) -> Self {
        Self::new(EMAIL_ENTITY, id).with_attribute(DIRECTION_CODE_ATTRIBUTE, direction_code)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn is_email(&self) -> bool {
        self.logical_name == EMAIL_ENTITY
    }

    pub fn direction_code(&self) -> bool {
        self.attributes
            .get(DIRECTION_CODE_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
