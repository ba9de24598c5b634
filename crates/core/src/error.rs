//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Every
/// variant is recoverable by the caller; only `LedgerCorrupted` signals a
/// condition the caller cannot repair (it still aborts one request, never
/// the process).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, zero quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced product/warehouse/document/line is absent.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Operation attempted outside its legal state-machine transition.
    #[error("invalid status for {operation}: document is {actual}")]
    InvalidStatus {
        operation: &'static str,
        actual: String,
    },

    /// The movement would drive quantity on hand negative where disallowed.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A stock count was posted with uncounted lines.
    #[error("count has {uncounted} line(s) without a final quantity")]
    IncompleteCount { uncounted: usize },

    /// A one-shot posting operation was attempted a second time.
    #[error("document already posted")]
    AlreadyPosted,

    /// A business key collided (e.g. duplicate bin code in a zone).
    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    /// Optimistic concurrency retries exhausted; caller may re-submit.
    #[error("concurrency conflict on {0} after retries")]
    ConcurrencyConflict(String),

    /// Replayed movements no longer reconcile to the aggregate quantity.
    #[error("ledger corrupted: {0}")]
    LedgerCorrupted(String),

    /// Storage backend failure. Aborts the request, never the process.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invalid_status(operation: &'static str, actual: impl Into<String>) -> Self {
        Self::InvalidStatus {
            operation,
            actual: actual.into(),
        }
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn duplicate_code(msg: impl Into<String>) -> Self {
        Self::DuplicateCode(msg.into())
    }

    pub fn concurrency_conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::LedgerCorrupted(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
