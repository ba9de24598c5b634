//! Audit sinks.

use std::sync::Arc;
use std::sync::RwLock;

use crate::entry::AuditEntry;

/// Destination for audit entries.
///
/// Implementations must be non-blocking and must not surface errors to the
/// caller; a lost audit entry is a sink-side concern, never a reason to
/// fail a workflow transition.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, entry: AuditEntry) {
        (**self).record(entry)
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Entries recorded for one entity, in emission order.
    pub fn entries_for(&self, entity_type: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }
}

/// Sink that emits entries as structured log events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            actor = %entry.actor_name,
            before = %entry.before,
            after = %entry.after,
            "audit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use stockforge_core::{Actor, EntityId, UserId};

    #[test]
    fn in_memory_sink_keeps_emission_order() {
        let sink = InMemoryAuditSink::new();
        let actor = Actor::new(UserId::new(), "tester");
        let id = EntityId::new();

        for action in ["submit", "approve"] {
            sink.record(AuditEntry::new(
                "purchase_order",
                id,
                action,
                json!({"status": "draft"}),
                json!({"status": action}),
                &actor,
                Utc::now(),
            ));
        }

        let entries = sink.entries_for("purchase_order");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "submit");
        assert_eq!(entries[1].action, "approve");
    }
}
