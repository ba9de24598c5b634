//! `stockforge-audit`: workflow-transition audit sink.
//!
//! Every workflow transition (not every stock movement) emits one entry:
//! `(entity_type, entity_id, action, before, after)` plus attribution.
//! Emission is fire-and-forget relative to the business operation: a
//! sink must never fail the transition it is recording, so `record` is
//! infallible by contract.

pub mod entry;
pub mod sink;

pub use entry::AuditEntry;
pub use sink::{AuditSink, InMemoryAuditSink, TracingAuditSink};
