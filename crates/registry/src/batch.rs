use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockforge_core::EntityId;

use crate::product::ProductId;

/// Batch (lot) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub EntityId);

impl BatchId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Batch/lot reference data. Batch numbers are unique per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub product_id: ProductId,
    pub batch_number: String,
    pub expiry_date: Option<NaiveDate>,
}

impl Batch {
    pub fn new(id: BatchId, product_id: ProductId, batch_number: impl Into<String>) -> Self {
        Self {
            id,
            product_id,
            batch_number: batch_number.into(),
            expiry_date: None,
        }
    }

    pub fn with_expiry(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }
}
