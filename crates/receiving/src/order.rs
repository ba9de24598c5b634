//! Purchase orders: header, lines, and the status machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{DomainError, DomainResult, EntityId, UserId};
use stockforge_registry::{ProductId, WarehouseId};

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub EntityId);

impl PurchaseOrderId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier identifier (supplier master data lives outside the core).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub EntityId);

impl SupplierId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Submitted,
    Approved,
    SentToSupplier,
    Acknowledged,
    PartiallyReceived,
    FullyReceived,
    Closed,
    Cancelled,
}

/// Events the purchase order status machine responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOrderAction {
    Submit,
    Approve,
    /// Back to draft; bumps the revision counter.
    Reject,
    SendToSupplier,
    Acknowledge,
    /// A goods receipt was posted; `complete` when every line is fully
    /// received.
    RecordReceipt {
        complete: bool,
    },
    Close,
    Cancel,
}

impl PurchaseOrderStatus {
    /// The whole transition table, validated here and nowhere else.
    pub fn transition(self, action: PurchaseOrderAction) -> DomainResult<Self> {
        use PurchaseOrderAction as A;
        use PurchaseOrderStatus as S;

        let next = match (self, action) {
            (S::Draft, A::Submit) => S::Submitted,
            (S::Submitted, A::Approve) => S::Approved,
            (S::Submitted, A::Reject) => S::Draft,
            (S::Approved, A::SendToSupplier) => S::SentToSupplier,
            (S::SentToSupplier, A::Acknowledge) => S::Acknowledged,
            (
                S::Approved | S::SentToSupplier | S::Acknowledged | S::PartiallyReceived,
                A::RecordReceipt { complete },
            ) => {
                if complete {
                    S::FullyReceived
                } else {
                    S::PartiallyReceived
                }
            }
            (S::FullyReceived, A::Close) => S::Closed,
            // Cancellation is legal anywhere before goods arrived in full.
            (
                S::Draft
                | S::Submitted
                | S::Approved
                | S::SentToSupplier
                | S::Acknowledged
                | S::PartiallyReceived,
                A::Cancel,
            ) => S::Cancelled,
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
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// Whether goods may currently be received against the order.
    pub fn is_receivable(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::SentToSupplier | Self::Acknowledged | Self::PartiallyReceived
        )
    }
}

impl PurchaseOrderAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::SendToSupplier => "send_to_supplier",
            Self::Acknowledge => "acknowledge",
            Self::RecordReceipt { .. } => "record_receipt",
            Self::Close => "close",
            Self::Cancel => "cancel",
        }
    }
}

/// One ordered product.
///
/// Invariant after every receipt posting:
/// `quantity_ordered == quantity_received + quantity_rejected + quantity_pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    pub quantity_rejected: i64,
    pub quantity_pending: i64,
    /// Expected unit cost; the receipt may record a different actual cost.
    pub unit_cost: Decimal,
}

impl PurchaseOrderLine {
    pub fn new(line_no: u32, product_id: ProductId, quantity: i64, unit_cost: Decimal) -> Self {
        Self {
            line_no,
            product_id,
            quantity_ordered: quantity,
            quantity_received: 0,
            quantity_rejected: 0,
            quantity_pending: quantity,
            unit_cost,
        }
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }
}

/// Purchase order document: header + lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub number: String,
    pub supplier_id: SupplierId,
    /// Destination warehouse for all receipts against this order.
    pub warehouse_id: WarehouseId,
    pub status: PurchaseOrderStatus,
    /// Incremented each time a submission is rejected back to draft.
    pub revision: u32,
    pub lines: Vec<PurchaseOrderLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn line(&self, line_no: u32) -> DomainResult<&PurchaseOrderLine> {
        self.lines
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("purchase order line"))
    }

    pub(crate) fn line_mut(&mut self, line_no: u32) -> DomainResult<&mut PurchaseOrderLine> {
        self.lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::not_found("purchase order line"))
    }

    /// Apply accepted/rejected quantities from a posted receipt line and
    /// re-derive pending, keeping the conservation invariant exact.
    pub(crate) fn apply_receipt_line(
        &mut self,
        line_no: u32,
        accepted: i64,
        rejected: i64,
    ) -> DomainResult<()> {
        let line = self.line_mut(line_no)?;
        if accepted + rejected > line.quantity_pending {
            return Err(DomainError::validation(format!(
                "line {line_no}: receiving {accepted} (+{rejected} rejected) exceeds pending {}",
                line.quantity_pending
            )));
        }
        line.quantity_received += accepted;
        line.quantity_rejected += rejected;
        line.quantity_pending =
            line.quantity_ordered - line.quantity_received - line.quantity_rejected;
        Ok(())
    }

    pub fn is_fully_received(&self) -> bool {
        self.lines.iter().all(PurchaseOrderLine::is_fully_received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_path_to_closed() {
        use PurchaseOrderAction as A;
        let mut status = PurchaseOrderStatus::Draft;
        for action in [
            A::Submit,
            A::Approve,
            A::SendToSupplier,
            A::Acknowledge,
            A::RecordReceipt { complete: false },
            A::RecordReceipt { complete: true },
            A::Close,
        ] {
            status = status.transition(action).unwrap();
        }
        assert_eq!(status, PurchaseOrderStatus::Closed);
        assert!(status.is_terminal());
    }

    #[test]
    fn rejection_goes_back_to_draft() {
        let status = PurchaseOrderStatus::Submitted
            .transition(PurchaseOrderAction::Reject)
            .unwrap();
        assert_eq!(status, PurchaseOrderStatus::Draft);
    }

    #[test]
    fn approval_requires_submitted() {
        let err = PurchaseOrderStatus::Draft
            .transition(PurchaseOrderAction::Approve)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus { .. }));
    }

    #[test]
    fn cancel_is_blocked_after_full_receipt() {
        for status in [
            PurchaseOrderStatus::FullyReceived,
            PurchaseOrderStatus::Closed,
            PurchaseOrderStatus::Cancelled,
        ] {
            let err = status.transition(PurchaseOrderAction::Cancel).unwrap_err();
            assert!(matches!(err, DomainError::InvalidStatus { .. }));
        }
    }

    #[test]
    fn receipt_application_preserves_conservation() {
        let mut order = PurchaseOrder {
            id: PurchaseOrderId::new(EntityId::new()),
            number: "PO-000001".to_string(),
            supplier_id: SupplierId::new(EntityId::new()),
            warehouse_id: WarehouseId::new(EntityId::new()),
            status: PurchaseOrderStatus::Approved,
            revision: 0,
            lines: vec![PurchaseOrderLine::new(
                1,
                ProductId::new(EntityId::new()),
                10,
                Decimal::TEN,
            )],
            created_by: UserId::new(),
            created_at: Utc::now(),
        };

        order.apply_receipt_line(1, 6, 1).unwrap();
        let line = order.line(1).unwrap();
        assert_eq!(line.quantity_received, 6);
        assert_eq!(line.quantity_rejected, 1);
        assert_eq!(line.quantity_pending, 3);
        assert_eq!(
            line.quantity_ordered,
            line.quantity_received + line.quantity_rejected + line.quantity_pending
        );

        // Receiving past pending is rejected.
        let err = order.apply_receipt_line(1, 4, 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
