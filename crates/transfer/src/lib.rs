//! `stockforge-transfer`: inter-warehouse transfer workflow.
//!
//! Transfers move stock between warehouses in two ledger legs: an
//! outbound post at ship time and an inbound post at receive time.
//! Loss in transit lands in `variance_qty`, never in a reversal.

pub mod service;
pub mod transfer;

pub use service::{CreateTransfer, LineQuantity, NewTransferLine, TransferService};
pub use transfer::{Transfer, TransferAction, TransferId, TransferLine, TransferStatus};
