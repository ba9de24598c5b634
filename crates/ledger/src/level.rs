//! The current-quantity aggregate: one row per stock key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_registry::{BatchId, BinId, Product, ProductId, WarehouseId};

/// The unique location key a stock level is kept for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub batch_id: Option<BatchId>,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
            bin_id: None,
            batch_id: None,
        }
    }

    pub fn with_bin(mut self, bin_id: BinId) -> Self {
        self.bin_id = Some(bin_id);
        self
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }
}

/// Derived stock classification, recomputed on every write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    Low,
    Critical,
    OutOfStock,
    Overstock,
}

impl StockStatus {
    /// Classify from quantities and the product's registry thresholds.
    pub fn classify(on_hand: i64, available: i64, product: &Product) -> Self {
        if on_hand <= 0 {
            return StockStatus::OutOfStock;
        }
        if let Some(max) = product.max_level {
            if on_hand > max {
                return StockStatus::Overstock;
            }
        }
        if available <= product.critical_level {
            StockStatus::Critical
        } else if available <= product.reorder_point {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }
}

/// The mutable aggregate: current quantity-on-hand per key.
///
/// `quantity_available` is stored, never computed lazily; every writer
/// re-derives it as `on_hand - reserved`. `version` is the optimistic
/// concurrency token the store compares on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub key: StockKey,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub quantity_available: i64,
    /// Current moving-average unit cost.
    pub unit_cost: Decimal,
    pub status: StockStatus,
    pub last_movement_at: DateTime<Utc>,
    pub version: u64,
}

impl StockLevel {
    /// Zero row for a key that has never seen a movement. Created lazily
    /// on first post and retained forever, even at zero quantity.
    pub fn empty(key: StockKey, as_of: DateTime<Utc>) -> Self {
        Self {
            key,
            quantity_on_hand: 0,
            quantity_reserved: 0,
            quantity_available: 0,
            unit_cost: Decimal::ZERO,
            status: StockStatus::OutOfStock,
            last_movement_at: as_of,
            version: 0,
        }
    }
}
