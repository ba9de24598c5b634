//! `stockforge-receiving`: purchase order + goods receipt workflow.
//!
//! The receiving engine owns the PurchaseOrder lifecycle and posts inbound
//! stock through the ledger when a goods receipt is posted. Moving-average
//! costing rides along with every posted line.

pub mod order;
pub mod receipt;
pub mod service;

pub use order::{
    PurchaseOrder, PurchaseOrderAction, PurchaseOrderId, PurchaseOrderLine, PurchaseOrderStatus,
    SupplierId,
};
pub use receipt::{GoodsReceipt, GoodsReceiptLine, ReceiptId, ReceiptStatus};
pub use service::{CreateOrder, NewOrderLine, NewReceiptLine, ReceivingService};
