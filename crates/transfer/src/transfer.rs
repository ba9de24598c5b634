//! Inter-warehouse transfers: header, lines, status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_core::{DomainError, DomainResult, EntityId, UserId};
use stockforge_registry::{BatchId, BinId, ProductId, WarehouseId};

/// Transfer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub EntityId);

impl TransferId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Transfer status lifecycle.
///
/// Shipping makes a transfer non-cancellable: goods already left the
/// source. A lost shipment is recorded through `variance_qty` at receipt,
/// never by reversing the outbound leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Submitted,
    Approved,
    Shipped,
    Received,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Submit,
    Approve,
    Reject,
    Ship,
    Receive,
    Cancel,
}

impl TransferStatus {
    /// The whole transition table, validated here and nowhere else.
    pub fn transition(self, action: TransferAction) -> DomainResult<Self> {
        use TransferAction as A;
        use TransferStatus as S;

        let next = match (self, action) {
            (S::Draft, A::Submit) => S::Submitted,
            (S::Submitted, A::Approve) => S::Approved,
            (S::Draft | S::Submitted, A::Reject) => S::Rejected,
            (S::Approved, A::Ship) => S::Shipped,
            (S::Shipped, A::Receive) => S::Received,
            (S::Draft | S::Approved, A::Cancel) => S::Cancelled,
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
        matches!(self, Self::Received | Self::Rejected | Self::Cancelled)
    }
}

impl TransferAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Ship => "ship",
            Self::Receive => "receive",
            Self::Cancel => "cancel",
        }
    }
}

/// One transferred product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub from_bin: Option<BinId>,
    pub to_bin: Option<BinId>,
    pub requested_qty: i64,
    pub approved_qty: i64,
    pub shipped_qty: i64,
    pub received_qty: i64,
    /// `shipped - received`; nonzero records loss in transit.
    pub variance_qty: i64,
    /// Set once the outbound movement for this line has committed. A ship
    /// interrupted by a concurrency failure keeps these markers so the
    /// retry skips lines already in the ledger.
    pub shipped_posted: bool,
    /// Same marker for the inbound leg at receive time.
    pub received_posted: bool,
}

impl TransferLine {
    pub fn new(line_no: u32, product_id: ProductId, requested_qty: i64) -> Self {
        Self {
            line_no,
            product_id,
            batch_id: None,
            from_bin: None,
            to_bin: None,
            requested_qty,
            approved_qty: 0,
            shipped_qty: 0,
            received_qty: 0,
            variance_qty: 0,
            shipped_posted: false,
            received_posted: false,
        }
    }
}

/// Transfer document: header + lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub number: String,
    pub from_warehouse: WarehouseId,
    pub to_warehouse: WarehouseId,
    pub status: TransferStatus,
    pub lines: Vec<TransferLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn line(&self, line_no: u32) -> DomainResult<&TransferLine> {
        self.lines
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("transfer line"))
    }

    pub(crate) fn line_mut(&mut self, line_no: u32) -> DomainResult<&mut TransferLine> {
        self.lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("transfer line"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_ends_received() {
        use TransferAction as A;
        let mut status = TransferStatus::Draft;
        for action in [A::Submit, A::Approve, A::Ship, A::Receive] {
            status = status.transition(action).unwrap();
        }
        assert_eq!(status, TransferStatus::Received);
        assert!(status.is_terminal());
    }

    #[test]
    fn shipped_transfer_cannot_be_cancelled() {
        let err = TransferStatus::Shipped
            .transition(TransferAction::Cancel)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus { .. }));
    }

    #[test]
    fn shipping_requires_approval() {
        let err = TransferStatus::Submitted
            .transition(TransferAction::Ship)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus { .. }));
    }

    #[test]
    fn rejection_only_before_approval() {
        assert!(
            TransferStatus::Submitted
                .transition(TransferAction::Reject)
                .is_ok()
        );
        assert!(
            TransferStatus::Approved
                .transition(TransferAction::Reject)
                .is_err()
        );
    }
}
