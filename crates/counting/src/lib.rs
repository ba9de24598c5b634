//! `stockforge-counting`: stock count workflow.
//!
//! Counts snapshot a point-in-time baseline per stocked key, collect
//! physical counts (optionally blind with a confirming second count), and
//! post adjustment movements for variant lines only.

pub mod count;
pub mod service;

pub use count::{CountAction, CountStatus, StockCount, StockCountId, StockCountLine};
pub use service::{CountingService, CreateCount};
