//! `stockforge-ledger`: the stock ledger.
//!
//! Owns the `StockLevel` aggregate and the append-only `StockMovement`
//! log. Workflow crates never touch either directly; they call
//! `StockLedger::post_movement`, the one place quantity arithmetic
//! happens. Moving-average costing rides along with every inbound
//! movement.

pub mod costing;
pub mod ledger;
pub mod level;
pub mod movement;
pub mod store;

pub use costing::moving_average;
pub use ledger::{ExpiryAlert, PostMovement, ReorderAlert, SharedStockLedger, StockLedger};
pub use level::{StockKey, StockLevel, StockStatus};
pub use movement::{MovementFilter, MovementId, MovementType, Reference, StockMovement};
pub use store::{CommitError, InMemoryLedgerStore, LedgerStore};
