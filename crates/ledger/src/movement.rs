//! The append-only movement log.
//!
//! A movement is one immutable, signed quantity event tied to exactly one
//! workflow document. Rows are created once by the ledger and never edited
//! or deleted; reversal is a new opposite-signed movement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{EntityId, UserId};
use stockforge_registry::{BatchId, BinId, ProductId, WarehouseId};

use crate::level::StockKey;

/// Movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub EntityId);

impl MovementId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Kind of stock movement. The sign of the quantity delta is implied by
/// the type; the stored `quantity` is always an unsigned magnitude.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    PurchaseReceipt,
    TransferOut,
    TransferIn,
    PositiveAdjustment,
    NegativeAdjustment,
    Return,
    Scrap,
}

impl MovementType {
    /// +1 for inbound types, -1 for outbound.
    pub fn sign(self) -> i64 {
        match self {
            MovementType::PurchaseReceipt
            | MovementType::TransferIn
            | MovementType::PositiveAdjustment
            | MovementType::Return => 1,
            MovementType::TransferOut | MovementType::NegativeAdjustment | MovementType::Scrap => {
                -1
            }
        }
    }

    pub fn is_inbound(self) -> bool {
        self.sign() > 0
    }
}

/// Which workflow document a movement belongs to.
///
/// Exactly one variant per workflow; exhaustive matching replaces nullable
/// reference-field guessing. `number` is the human document number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
    Receipt { id: EntityId, number: String },
    Transfer { id: EntityId, number: String },
    Count { id: EntityId, number: String },
    Adjustment { id: EntityId, number: String },
    None,
}

impl Reference {
    pub fn document_number(&self) -> Option<&str> {
        match self {
            Reference::Receipt { number, .. }
            | Reference::Transfer { number, .. }
            | Reference::Count { number, .. }
            | Reference::Adjustment { number, .. } => Some(number),
            Reference::None => None,
        }
    }
}

/// One immutable row of the stock ledger.
///
/// Exactly one warehouse side is set: `to_*` for inbound movements,
/// `from_*` for outbound. A conceptual transfer is two movements (one per
/// leg), never a single dual-sided row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    /// Unique, generated (`MOV-000042`).
    pub movement_number: String,
    pub movement_type: MovementType,
    pub movement_date: DateTime<Utc>,
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub from_warehouse: Option<WarehouseId>,
    pub from_bin: Option<BinId>,
    pub to_warehouse: Option<WarehouseId>,
    pub to_bin: Option<BinId>,
    /// Unsigned magnitude; sign is implied by `movement_type`.
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    /// Quantity on hand immediately after this movement, captured at
    /// write time and never recomputed.
    pub running_balance: i64,
    pub reference: Reference,
    pub posted_by: UserId,
}

impl StockMovement {
    /// The signed delta this movement applied, for replay.
    pub fn signed_delta(&self) -> i64 {
        self.movement_type.sign() * self.quantity
    }

    /// Reconstruct the stock key this movement touched.
    pub fn key(&self) -> StockKey {
        let warehouse_id = if self.movement_type.is_inbound() {
            self.to_warehouse
        } else {
            self.from_warehouse
        };
        let bin_id = if self.movement_type.is_inbound() {
            self.to_bin
        } else {
            self.from_bin
        };
        StockKey {
            product_id: self.product_id,
            // Invariant: the side matching the type is always set.
            warehouse_id: warehouse_id.unwrap_or_else(|| {
                self.from_warehouse
                    .or(self.to_warehouse)
                    .expect("movement carries a warehouse side")
            }),
            bin_id,
            batch_id: self.batch_id,
        }
    }
}

/// Filter for time-ranged movement queries (reporting reads).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        if let Some(p) = self.product_id {
            if movement.product_id != p {
                return false;
            }
        }
        if let Some(w) = self.warehouse_id {
            // A warehouse filter matches either side.
            if movement.from_warehouse != Some(w) && movement.to_warehouse != Some(w) {
                return false;
            }
        }
        if let Some(t) = self.movement_type {
            if movement.movement_type != t {
                return false;
            }
        }
        if let Some(from) = self.from {
            if movement.movement_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if movement.movement_date > to {
                return false;
            }
        }
        true
    }
}
