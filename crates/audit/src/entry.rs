use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockforge_core::{Actor, EntityId, UserId};

/// One audited workflow transition.
///
/// `before`/`after` are JSON snapshots of whatever the workflow considers
/// its audited surface (usually the status plus the fields the transition
/// changed). Audit storage is external; this type is the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity_type: String,
    pub entity_id: EntityId,
    /// Transition name, e.g. `submit`, `approve`, `post`.
    pub action: String,
    pub before: JsonValue,
    pub after: JsonValue,
    pub actor_id: UserId,
    pub actor_name: String,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: EntityId,
        action: impl Into<String>,
        before: JsonValue,
        after: JsonValue,
        actor: &Actor,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            before,
            after,
            actor_id: actor.user_id,
            actor_name: actor.display_name.clone(),
            occurred_at,
        }
    }
}
