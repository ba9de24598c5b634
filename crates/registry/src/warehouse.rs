use serde::{Deserialize, Serialize};

use stockforge_core::EntityId;

/// Warehouse identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub EntityId);

impl WarehouseId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Bin identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinId(pub EntityId);

impl BinId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BinId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Warehouse reference data.
///
/// `allow_negative_stock` is the policy the ledger consults before letting
/// an outbound movement drive quantity on hand below zero. It is read-only
/// to the core; changing it is a settings concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub allow_negative_stock: bool,
}

impl Warehouse {
    pub fn new(id: WarehouseId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            allow_negative_stock: false,
        }
    }

    pub fn with_negative_stock_allowed(mut self) -> Self {
        self.allow_negative_stock = true;
        self
    }
}

/// Storage bin inside a warehouse. Bin codes are unique per warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub warehouse_id: WarehouseId,
    pub code: String,
}

impl Bin {
    pub fn new(id: BinId, warehouse_id: WarehouseId, code: impl Into<String>) -> Self {
        Self {
            id,
            warehouse_id,
            code: code.into(),
        }
    }
}
