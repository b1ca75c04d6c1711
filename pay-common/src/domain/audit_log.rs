//! Append-only audit trail. Never updated or deleted once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub request_context: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            old_value: None,
            new_value: None,
            request_context: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_entity(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

/// Well-known `action` values emitted by the payment engine and scheduler.
pub mod actions {
    pub const PAYMENT_SENT: &str = "payment_sent";
    pub const TRANSACTION_STATUS_UPDATE: &str = "transaction_status_update";
    pub const KEY_ROTATION: &str = "key_rotation";
    pub const KEY_ROTATION_FAILED: &str = "key_rotation_failed";
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let user_id = Uuid::new_v4();
        let entity_id = Uuid::new_v4();
        let log = AuditLog::new(actions::PAYMENT_SENT, "transaction")
            .with_user(user_id)
            .with_entity(entity_id);
        assert_eq!(log.user_id, Some(user_id));
        assert_eq!(log.entity_id, Some(entity_id));
        assert_eq!(log.action, actions::PAYMENT_SENT);
    }
}
