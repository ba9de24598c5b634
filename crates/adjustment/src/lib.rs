//! `stockforge-adjustment`: direct stock corrections, returns, and scrap.
//!
//! No approval lifecycle: a validated request posts exactly one ledger
//! movement and records a `StockAdjustment` document for the audit trail.

pub mod adjustment;
pub mod service;

pub use adjustment::{AdjustmentEntry, AdjustmentId, AdjustmentKind, StockAdjustment};
pub use service::{AdjustStock, AdjustmentService};
