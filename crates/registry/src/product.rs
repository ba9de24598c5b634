use serde::{Deserialize, Serialize};

use stockforge_core::EntityId;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub EntityId);

impl ProductId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Reference data for a product, including the reorder thresholds the
/// ledger reads when classifying a stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    /// Available-at-or-below this triggers a Low classification and a
    /// reorder alert.
    pub reorder_point: i64,
    /// Available-at-or-below this is Critical (subset of Low).
    pub critical_level: i64,
    /// On-hand above this (when set) is Overstock.
    pub max_level: Option<i64>,
}

impl Product {
    pub fn new(id: ProductId, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            sku: sku.into(),
            name: name.into(),
            reorder_point: 0,
            critical_level: 0,
            max_level: None,
        }
    }

    pub fn with_thresholds(mut self, reorder_point: i64, critical_level: i64) -> Self {
        self.reorder_point = reorder_point;
        self.critical_level = critical_level;
        self
    }

    pub fn with_max_level(mut self, max_level: i64) -> Self {
        self.max_level = Some(max_level);
        self
    }
}
