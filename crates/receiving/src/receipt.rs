//! Goods receipts: drafted against one purchase order, posted once, ever.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{EntityId, UserId};
use stockforge_registry::{BatchId, BinId, ProductId};

use crate::order::PurchaseOrderId;

/// Goods receipt identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(pub EntityId);

impl ReceiptId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Receipt lifecycle. Posting is terminal and one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Draft,
    Posted,
    Cancelled,
}

/// One received purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    /// References the purchase order line by its line number.
    pub po_line_no: u32,
    pub product_id: ProductId,
    pub ordered_qty: i64,
    pub received_qty: i64,
    pub rejected_qty: i64,
    /// Actual unit cost of the received goods.
    pub unit_cost: Decimal,
    pub bin_id: Option<BinId>,
    pub batch_id: Option<BatchId>,
    /// Set once this line's movement has committed. A post interrupted by
    /// a concurrency failure keeps these markers so the retry skips lines
    /// already in the ledger.
    pub posted: bool,
}

impl GoodsReceiptLine {
    /// Units that actually enter stock.
    pub fn accepted_qty(&self) -> i64 {
        self.received_qty - self.rejected_qty
    }
}

/// Goods receipt document: header + lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: ReceiptId,
    pub number: String,
    pub purchase_order_id: PurchaseOrderId,
    pub status: ReceiptStatus,
    pub lines: Vec<GoodsReceiptLine>,
    pub received_by: UserId,
    pub received_at: DateTime<Utc>,
    /// Set when the receipt is posted; `None` while draft.
    pub posted_at: Option<DateTime<Utc>>,
}
