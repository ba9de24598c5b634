//! Stock adjustments: applied-immediately corrections, returns, scrap.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{EntityId, UserId};
use stockforge_ledger::StockKey;

/// Adjustment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentId(pub EntityId);

impl AdjustmentId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AdjustmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What the adjustment represents; drives the movement type it posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Generic correction: positive or negative adjustment by sign.
    Correction,
    /// Customer return coming back into stock; always inbound.
    Return,
    /// Damaged or expired stock written off; always outbound.
    Scrap,
}

/// How the new quantity is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentEntry {
    /// Signed change to quantity on hand.
    Delta(i64),
    /// Absolute target; the delta is `target - current on hand`.
    TargetQuantity(i64),
}

/// A posted adjustment. There is no draft lifecycle; the single ledger
/// call is the entire side effect and this document records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub id: AdjustmentId,
    pub number: String,
    pub key: StockKey,
    pub kind: AdjustmentKind,
    pub reason_code: String,
    pub quantity_before: i64,
    pub quantity_after: i64,
    /// `after - before`.
    pub variance: i64,
    /// Variance valued at the unit cost the movement carried.
    pub value_impact: Decimal,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
