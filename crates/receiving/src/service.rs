//! The receiving workflow engine.
//!
//! Owns purchase orders and goods receipts, posts inbound movements
//! through the stock ledger, and audits every transition. Every check a
//! post can fail on runs before the first ledger call; if a concurrency
//! race still interrupts the posting loop, per-line markers record which
//! movements committed so a retry never posts a line twice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use stockforge_audit::{AuditEntry, AuditSink};
use stockforge_core::{Actor, DocumentStore, DomainError, DomainResult, EntityId};
use stockforge_ledger::{MovementType, PostMovement, Reference, SharedStockLedger, StockKey};
use stockforge_registry::{BatchId, BinId, ProductId, Registry, WarehouseId};

use crate::order::{
    PurchaseOrder, PurchaseOrderAction, PurchaseOrderId, PurchaseOrderLine, PurchaseOrderStatus,
    SupplierId,
};
use crate::receipt::{GoodsReceipt, GoodsReceiptLine, ReceiptId, ReceiptStatus};

/// A line on a new purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

/// A new purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub supplier_id: SupplierId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<NewOrderLine>,
}

/// A line on a draft goods receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceiptLine {
    pub po_line_no: u32,
    pub received_qty: i64,
    pub rejected_qty: i64,
    /// Actual unit cost; defaults to the ordered cost when absent.
    pub unit_cost: Option<Decimal>,
    pub bin_id: Option<BinId>,
    pub batch_id: Option<BatchId>,
}

pub struct ReceivingService {
    orders: Arc<dyn DocumentStore<PurchaseOrderId, PurchaseOrder>>,
    receipts: Arc<dyn DocumentStore<ReceiptId, GoodsReceipt>>,
    ledger: Arc<SharedStockLedger>,
    registry: Arc<dyn Registry>,
    audit: Arc<dyn AuditSink>,
}

impl ReceivingService {
    pub fn new(
        orders: Arc<dyn DocumentStore<PurchaseOrderId, PurchaseOrder>>,
        receipts: Arc<dyn DocumentStore<ReceiptId, GoodsReceipt>>,
        ledger: Arc<SharedStockLedger>,
        registry: Arc<dyn Registry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            orders,
            receipts,
            ledger,
            registry,
            audit,
        }
    }

    // ----- purchase order lifecycle -----

    pub fn create_order(
        &self,
        actor: &Actor,
        command: CreateOrder,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        if command.lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order must have at least one line",
            ));
        }
        if self.registry.warehouse(&command.warehouse_id).is_none() {
            return Err(DomainError::not_found("warehouse"));
        }

        let mut lines = Vec::with_capacity(command.lines.len());
        for (idx, line) in command.lines.into_iter().enumerate() {
            self.validate_order_line(&line)?;
            lines.push(PurchaseOrderLine::new(
                idx as u32 + 1,
                line.product_id,
                line.quantity,
                line.unit_cost,
            ));
        }

        let order = PurchaseOrder {
            id: PurchaseOrderId::new(EntityId::new()),
            number: self.orders.next_number("PO"),
            supplier_id: command.supplier_id,
            warehouse_id: command.warehouse_id,
            status: PurchaseOrderStatus::Draft,
            revision: 0,
            lines,
            created_by: actor.user_id,
            created_at: occurred_at,
        };
        self.orders.insert(order.id, order.clone());
        self.audit.record(AuditEntry::new(
            "purchase_order",
            order.id.0,
            "create",
            json!(null),
            order_snapshot(&order),
            actor,
            occurred_at,
        ));
        Ok(order)
    }

    /// Add a line to a draft order.
    pub fn add_line(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        line: NewOrderLine,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.validate_order_line(&line)?;
        let mut order = self.load_order(order_id)?;
        if order.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_status(
                "add_line",
                format!("{:?}", order.status),
            ));
        }
        let before = order_snapshot(&order);
        let line_no = order.lines.len() as u32 + 1;
        order.lines.push(PurchaseOrderLine::new(
            line_no,
            line.product_id,
            line.quantity,
            line.unit_cost,
        ));
        self.orders.update(order_id, order.clone())?;
        self.audit.record(AuditEntry::new(
            "purchase_order",
            order_id.0,
            "add_line",
            before,
            order_snapshot(&order),
            actor,
            occurred_at,
        ));
        Ok(order)
    }

    pub fn submit(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(actor, order_id, PurchaseOrderAction::Submit, occurred_at)
    }

    pub fn approve(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(actor, order_id, PurchaseOrderAction::Approve, occurred_at)
    }

    /// Reject a submitted order back to draft; bumps the revision counter.
    pub fn reject(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(actor, order_id, PurchaseOrderAction::Reject, occurred_at)
    }

    pub fn send_to_supplier(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(
            actor,
            order_id,
            PurchaseOrderAction::SendToSupplier,
            occurred_at,
        )
    }

    pub fn acknowledge(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(
            actor,
            order_id,
            PurchaseOrderAction::Acknowledge,
            occurred_at,
        )
    }

    pub fn close(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(actor, order_id, PurchaseOrderAction::Close, occurred_at)
    }

    /// Cancel is terminal and irreversible.
    pub fn cancel(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        self.transition_order(actor, order_id, PurchaseOrderAction::Cancel, occurred_at)
    }

    pub fn order(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        self.load_order(order_id)
    }

    // ----- goods receipts -----

    /// Draft a receipt against a receivable order. Quantities are
    /// soft-checked here and re-validated at post time.
    pub fn draft_receipt(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        lines: Vec<NewReceiptLine>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<GoodsReceipt> {
        let order = self.load_order(order_id)?;
        if !order.status.is_receivable() {
            return Err(DomainError::invalid_status(
                "draft_receipt",
                format!("{:?}", order.status),
            ));
        }
        if lines.is_empty() {
            return Err(DomainError::validation("receipt must have at least one line"));
        }

        let mut receipt_lines = Vec::with_capacity(lines.len());
        for line in lines {
            if line.received_qty <= 0 {
                return Err(DomainError::validation("received quantity must be positive"));
            }
            if line.rejected_qty < 0 || line.rejected_qty > line.received_qty {
                return Err(DomainError::validation(
                    "rejected quantity must be between zero and the received quantity",
                ));
            }
            let po_line = order.line(line.po_line_no)?;
            receipt_lines.push(GoodsReceiptLine {
                po_line_no: line.po_line_no,
                product_id: po_line.product_id,
                ordered_qty: po_line.quantity_ordered,
                received_qty: line.received_qty,
                rejected_qty: line.rejected_qty,
                unit_cost: line.unit_cost.unwrap_or(po_line.unit_cost),
                bin_id: line.bin_id,
                batch_id: line.batch_id,
                posted: false,
            });
        }

        let receipt = GoodsReceipt {
            id: ReceiptId::new(EntityId::new()),
            number: self.receipts.next_number("GRN"),
            purchase_order_id: order_id,
            status: ReceiptStatus::Draft,
            lines: receipt_lines,
            received_by: actor.user_id,
            received_at: occurred_at,
            posted_at: None,
        };
        self.receipts.insert(receipt.id, receipt.clone());
        self.audit.record(AuditEntry::new(
            "goods_receipt",
            receipt.id.0,
            "draft",
            json!(null),
            receipt_snapshot(&receipt),
            actor,
            occurred_at,
        ));
        Ok(receipt)
    }

    /// Post a draft receipt: one inbound movement per line with accepted
    /// units, then the parent order's quantities and status. One-shot;
    /// a posted receipt can never post again.
    pub fn post_receipt(
        &self,
        actor: &Actor,
        receipt_id: ReceiptId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<(GoodsReceipt, PurchaseOrder)> {
        let mut receipt = self
            .receipts
            .get(&receipt_id)
            .ok_or(DomainError::not_found("goods receipt"))?;
        match receipt.status {
            ReceiptStatus::Draft => {}
            ReceiptStatus::Posted => return Err(DomainError::AlreadyPosted),
            ReceiptStatus::Cancelled => {
                return Err(DomainError::invalid_status("post_receipt", "Cancelled"));
            }
        }

        let mut order = self.load_order(receipt.purchase_order_id)?;
        if !order.status.is_receivable() {
            return Err(DomainError::invalid_status(
                "post_receipt",
                format!("{:?}", order.status),
            ));
        }
        let order_before = order_snapshot(&order);
        let receipt_before = receipt_snapshot(&receipt);

        // Every check the per-line posts can fail on runs first: order
        // conservation, then each line's stock key against the registry.
        // After this point only a concurrency race or storage loss can
        // interrupt the posting loop.
        for line in &receipt.lines {
            order.apply_receipt_line(line.po_line_no, line.accepted_qty(), line.rejected_qty)?;
            self.ledger.validate_key(&receipt_line_key(line, order.warehouse_id))?;
        }

        for idx in 0..receipt.lines.len() {
            let line = receipt.lines[idx].clone();
            let accepted = line.accepted_qty();
            if line.posted || accepted == 0 {
                // Already in the ledger from an interrupted post, or
                // everything rejected: no movement.
                continue;
            }
            let outcome = self.ledger.post_movement(
                actor,
                PostMovement {
                    key: receipt_line_key(&line, order.warehouse_id),
                    movement_type: MovementType::PurchaseReceipt,
                    quantity: accepted,
                    unit_cost: Some(line.unit_cost),
                    reference: Reference::Receipt {
                        id: receipt.id.0,
                        number: receipt.number.clone(),
                    },
                    occurred_at,
                },
            );
            match outcome {
                Ok(_) => receipt.lines[idx].posted = true,
                Err(err) => {
                    // Persist the markers so a retry skips the lines whose
                    // movements already committed.
                    self.receipts.update(receipt_id, receipt.clone())?;
                    return Err(err);
                }
            }
        }

        let complete = order.is_fully_received();
        order.status = order
            .status
            .transition(PurchaseOrderAction::RecordReceipt { complete })?;
        receipt.status = ReceiptStatus::Posted;
        receipt.posted_at = Some(occurred_at);

        self.receipts.update(receipt_id, receipt.clone())?;
        self.orders.update(order.id, order.clone())?;

        self.audit.record(AuditEntry::new(
            "goods_receipt",
            receipt.id.0,
            "post",
            receipt_before,
            receipt_snapshot(&receipt),
            actor,
            occurred_at,
        ));
        self.audit.record(AuditEntry::new(
            "purchase_order",
            order.id.0,
            "record_receipt",
            order_before,
            order_snapshot(&order),
            actor,
            occurred_at,
        ));
        tracing::info!(
            receipt = %receipt.number,
            order = %order.number,
            status = ?order.status,
            "goods receipt posted"
        );
        Ok((receipt, order))
    }

    /// Cancel a draft receipt.
    pub fn cancel_receipt(
        &self,
        actor: &Actor,
        receipt_id: ReceiptId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<GoodsReceipt> {
        let mut receipt = self
            .receipts
            .get(&receipt_id)
            .ok_or(DomainError::not_found("goods receipt"))?;
        if receipt.status != ReceiptStatus::Draft {
            return Err(DomainError::invalid_status(
                "cancel_receipt",
                format!("{:?}", receipt.status),
            ));
        }
        let before = receipt_snapshot(&receipt);
        receipt.status = ReceiptStatus::Cancelled;
        self.receipts.update(receipt_id, receipt.clone())?;
        self.audit.record(AuditEntry::new(
            "goods_receipt",
            receipt.id.0,
            "cancel",
            before,
            receipt_snapshot(&receipt),
            actor,
            occurred_at,
        ));
        Ok(receipt)
    }

    pub fn receipt(&self, receipt_id: ReceiptId) -> DomainResult<GoodsReceipt> {
        self.receipts
            .get(&receipt_id)
            .ok_or(DomainError::not_found("goods receipt"))
    }

    // ----- internals -----

    fn load_order(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        self.orders
            .get(&order_id)
            .ok_or(DomainError::not_found("purchase order"))
    }

    fn validate_order_line(&self, line: &NewOrderLine) -> DomainResult<()> {
        if line.quantity <= 0 {
            return Err(DomainError::validation("ordered quantity must be positive"));
        }
        if line.unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if self.registry.product(&line.product_id).is_none() {
            return Err(DomainError::not_found("product"));
        }
        Ok(())
    }

    fn transition_order(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        action: PurchaseOrderAction,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PurchaseOrder> {
        let mut order = self.load_order(order_id)?;
        let before = order_snapshot(&order);
        order.status = order.status.transition(action)?;
        if action == PurchaseOrderAction::Reject {
            order.revision += 1;
        }
        self.orders.update(order_id, order.clone())?;
        self.audit.record(AuditEntry::new(
            "purchase_order",
            order_id.0,
            action.name(),
            before,
            order_snapshot(&order),
            actor,
            occurred_at,
        ));
        Ok(order)
    }
}

fn receipt_line_key(line: &GoodsReceiptLine, warehouse_id: WarehouseId) -> StockKey {
    let mut key = StockKey::new(line.product_id, warehouse_id);
    key.bin_id = line.bin_id;
    key.batch_id = line.batch_id;
    key
}

fn order_snapshot(order: &PurchaseOrder) -> serde_json::Value {
    json!({
        "status": format!("{:?}", order.status),
        "revision": order.revision,
        "lines": order.lines.len(),
    })
}

fn receipt_snapshot(receipt: &GoodsReceipt) -> serde_json::Value {
    json!({
        "status": format!("{:?}", receipt.status),
        "lines": receipt.lines.len(),
    })
}
