//! Stock counts: header, lines, status machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{DomainError, DomainResult, EntityId, UserId};
use stockforge_ledger::StockKey;
use stockforge_registry::WarehouseId;

/// Stock count identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCountId(pub EntityId);

impl StockCountId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockCountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Count status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Scheduled,
    InProgress,
    Posted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountAction {
    Start,
    Post,
    Cancel,
}

impl CountStatus {
    /// The whole transition table, validated here and nowhere else.
    pub fn transition(self, action: CountAction) -> DomainResult<Self> {
        use CountAction as A;
        use CountStatus as S;

        let next = match (self, action) {
            (S::Scheduled, A::Start) => S::InProgress,
            (S::InProgress, A::Post) => S::Posted,
            (S::Scheduled | S::InProgress, A::Cancel) => S::Cancelled,
            (S::Posted, A::Post) => return Err(DomainError::AlreadyPosted),
            (actual, action) => {
                return Err(DomainError::invalid_status(
                    action.name(),
                    format!("{actual:?}"),
                ));
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Posted | Self::Cancelled)
    }
}

impl CountAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Post => "post",
            Self::Cancel => "cancel",
        }
    }
}

/// One counted stock key.
///
/// `system_qty` and `unit_cost` are frozen at count creation; movements
/// posted during the count window do not refresh them. The count measures
/// drift against that point-in-time baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCountLine {
    pub line_no: u32,
    pub key: StockKey,
    pub system_qty: i64,
    /// Average unit cost at creation, used to value the variance.
    pub unit_cost: Decimal,
    pub count_qty1: Option<i64>,
    pub count_qty2: Option<i64>,
    pub final_count_qty: Option<i64>,
    pub recount_required: bool,
    /// Set at post time for lines whose final count equals the baseline.
    pub matched: bool,
    /// Set once this line's adjustment movement has committed. A post
    /// interrupted mid-way keeps these markers so the retry skips lines
    /// already in the ledger.
    pub posted: bool,
}

impl StockCountLine {
    pub fn new(line_no: u32, key: StockKey, system_qty: i64, unit_cost: Decimal) -> Self {
        Self {
            line_no,
            key,
            system_qty,
            unit_cost,
            count_qty1: None,
            count_qty2: None,
            final_count_qty: None,
            recount_required: false,
            matched: false,
            posted: false,
        }
    }

    /// `final - system`, once a final count exists.
    pub fn variance(&self) -> Option<i64> {
        self.final_count_qty.map(|q| q - self.system_qty)
    }

    /// Variance valued at the frozen unit cost.
    pub fn variance_value(&self) -> Option<Decimal> {
        self.variance().map(|v| Decimal::from(v) * self.unit_cost)
    }
}

/// Count document: header + lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCount {
    pub id: StockCountId,
    pub number: String,
    pub warehouse_id: WarehouseId,
    /// Blind counts require a matching second count before a line
    /// finalizes.
    pub blind: bool,
    pub status: CountStatus,
    pub lines: Vec<StockCountLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl StockCount {
    pub fn line(&self, line_no: u32) -> DomainResult<&StockCountLine> {
        self.lines
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("count line"))
    }

    pub(crate) fn line_mut(&mut self, line_no: u32) -> DomainResult<&mut StockCountLine> {
        self.lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("count line"))
    }

    /// Lines still missing a final count.
    pub fn uncounted(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.final_count_qty.is_none())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_registry::ProductId;

    fn line(system_qty: i64) -> StockCountLine {
        let key = StockKey::new(
            ProductId::new(EntityId::new()),
            WarehouseId::new(EntityId::new()),
        );
        StockCountLine::new(1, key, system_qty, Decimal::new(120, 1))
    }

    #[test]
    fn variance_valued_at_frozen_cost() {
        let mut l = line(150);
        l.final_count_qty = Some(145);
        assert_eq!(l.variance(), Some(-5));
        assert_eq!(l.variance_value(), Some(Decimal::new(-600, 1)));
    }

    #[test]
    fn posting_twice_is_already_posted() {
        let err = CountStatus::Posted.transition(CountAction::Post).unwrap_err();
        assert_eq!(err, DomainError::AlreadyPosted);
    }

    #[test]
    fn scheduled_cannot_post_directly() {
        let err = CountStatus::Scheduled
            .transition(CountAction::Post)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus { .. }));
    }

    #[test]
    fn cancellable_until_posted() {
        assert!(CountStatus::Scheduled.transition(CountAction::Cancel).is_ok());
        assert!(CountStatus::InProgress.transition(CountAction::Cancel).is_ok());
        assert!(CountStatus::Posted.transition(CountAction::Cancel).is_err());
    }
}
