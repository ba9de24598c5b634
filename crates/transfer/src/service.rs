//! The transfer workflow engine.
//!
//! Two independent ledger legs separated by real-world shipping: outbound
//! at the source on ship, inbound at the destination on receive. No
//! cross-warehouse atomicity is attempted; `variance_qty` reconciles loss
//! in transit. Transfers never change average cost on either side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use stockforge_audit::{AuditEntry, AuditSink};
use stockforge_core::{Actor, DocumentStore, DomainError, DomainResult, EntityId};
use stockforge_ledger::{MovementType, PostMovement, Reference, SharedStockLedger, StockKey};
use stockforge_registry::{BatchId, BinId, ProductId, Registry, WarehouseId};

use crate::transfer::{Transfer, TransferAction, TransferId, TransferLine, TransferStatus};

/// A line on a new transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransferLine {
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub from_bin: Option<BinId>,
    pub to_bin: Option<BinId>,
    pub quantity: i64,
}

/// A new transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransfer {
    pub from_warehouse: WarehouseId,
    pub to_warehouse: WarehouseId,
    pub lines: Vec<NewTransferLine>,
}

/// Per-line quantity override for ship/receive. An empty list means
/// "the full approved (resp. shipped) quantity on every line".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineQuantity {
    pub line_no: u32,
    pub quantity: i64,
}

pub struct TransferService {
    transfers: Arc<dyn DocumentStore<TransferId, Transfer>>,
    ledger: Arc<SharedStockLedger>,
    registry: Arc<dyn Registry>,
    audit: Arc<dyn AuditSink>,
}

impl TransferService {
    pub fn new(
        transfers: Arc<dyn DocumentStore<TransferId, Transfer>>,
        ledger: Arc<SharedStockLedger>,
        registry: Arc<dyn Registry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            transfers,
            ledger,
            registry,
            audit,
        }
    }

    /// Create a transfer request. Availability at the source is a soft
    /// check here — it is re-validated at ship time, since stock can move
    /// between request and shipment.
    pub fn create(
        &self,
        actor: &Actor,
        command: CreateTransfer,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        if command.from_warehouse == command.to_warehouse {
            return Err(DomainError::validation(
                "source and destination warehouse must differ",
            ));
        }
        for id in [command.from_warehouse, command.to_warehouse] {
            if self.registry.warehouse(&id).is_none() {
                return Err(DomainError::not_found("warehouse"));
            }
        }
        if command.lines.is_empty() {
            return Err(DomainError::validation(
                "transfer must have at least one line",
            ));
        }

        let mut lines = Vec::with_capacity(command.lines.len());
        for (idx, line) in command.lines.into_iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation(
                    "requested quantity must be positive",
                ));
            }
            if self.registry.product(&line.product_id).is_none() {
                return Err(DomainError::not_found("product"));
            }
            let available = self
                .ledger
                .available(&source_key(command.from_warehouse, &line));
            if available < line.quantity {
                return Err(DomainError::insufficient_stock(line.quantity, available));
            }
            let mut transfer_line =
                TransferLine::new(idx as u32 + 1, line.product_id, line.quantity);
            transfer_line.batch_id = line.batch_id;
            transfer_line.from_bin = line.from_bin;
            transfer_line.to_bin = line.to_bin;
            lines.push(transfer_line);
        }

        let transfer = Transfer {
            id: TransferId::new(EntityId::new()),
            number: self.transfers.next_number("TRF"),
            from_warehouse: command.from_warehouse,
            to_warehouse: command.to_warehouse,
            status: TransferStatus::Draft,
            lines,
            created_by: actor.user_id,
            created_at: occurred_at,
            shipped_at: None,
            received_at: None,
        };
        self.transfers.insert(transfer.id, transfer.clone());
        self.audit.record(AuditEntry::new(
            "transfer",
            transfer.id.0,
            "create",
            json!(null),
            snapshot(&transfer),
            actor,
            occurred_at,
        ));
        Ok(transfer)
    }

    pub fn submit(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        self.transition(actor, transfer_id, TransferAction::Submit, occurred_at)
    }

    /// Approve copies requested quantities into approved quantities.
    pub fn approve(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        let mut transfer = self.load(transfer_id)?;
        let before = snapshot(&transfer);
        transfer.status = transfer.status.transition(TransferAction::Approve)?;
        for line in &mut transfer.lines {
            line.approved_qty = line.requested_qty;
        }
        self.transfers.update(transfer_id, transfer.clone())?;
        self.audit.record(AuditEntry::new(
            "transfer",
            transfer_id.0,
            "approve",
            before,
            snapshot(&transfer),
            actor,
            occurred_at,
        ));
        Ok(transfer)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        self.transition(actor, transfer_id, TransferAction::Reject, occurred_at)
    }

    pub fn cancel(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        self.transition(actor, transfer_id, TransferAction::Cancel, occurred_at)
    }

    /// Ship an approved transfer: re-check availability per line, record
    /// shipped quantities, post one outbound movement per line at the
    /// source.
    pub fn ship(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        quantities: Vec<LineQuantity>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        let mut transfer = self.load(transfer_id)?;
        // Validate the transition first; quantities second.
        let next_status = transfer.status.transition(TransferAction::Ship)?;
        let before = snapshot(&transfer);

        self.apply_quantities(&mut transfer, &quantities, Stage::Ship)?;

        // Every check the per-line posts can fail on runs before the first
        // movement. Lines a previous interrupted ship already committed
        // have their stock deducted, so they are exempt from the
        // availability check.
        for line in &transfer.lines {
            if line.shipped_qty == 0 || line.shipped_posted {
                continue;
            }
            let key = ship_key(&transfer, line);
            self.ledger.validate_key(&key)?;
            let available = self.ledger.available(&key);
            if available < line.shipped_qty {
                return Err(DomainError::insufficient_stock(line.shipped_qty, available));
            }
        }

        for idx in 0..transfer.lines.len() {
            let line = transfer.lines[idx].clone();
            if line.shipped_qty == 0 || line.shipped_posted {
                continue;
            }
            let outcome = self.ledger.post_movement(
                actor,
                PostMovement {
                    key: ship_key(&transfer, &line),
                    movement_type: MovementType::TransferOut,
                    quantity: line.shipped_qty,
                    unit_cost: None,
                    reference: Reference::Transfer {
                        id: transfer.id.0,
                        number: transfer.number.clone(),
                    },
                    occurred_at,
                },
            );
            match outcome {
                Ok(_) => transfer.lines[idx].shipped_posted = true,
                Err(err) => {
                    // Persist the markers so a retry skips lines whose
                    // outbound movements already committed.
                    self.transfers.update(transfer_id, transfer.clone())?;
                    return Err(err);
                }
            }
        }

        transfer.status = next_status;
        transfer.shipped_at = Some(occurred_at);
        self.transfers.update(transfer_id, transfer.clone())?;
        self.audit.record(AuditEntry::new(
            "transfer",
            transfer_id.0,
            "ship",
            before,
            snapshot(&transfer),
            actor,
            occurred_at,
        ));
        tracing::info!(transfer = %transfer.number, "transfer shipped");
        Ok(transfer)
    }

    /// Receive a shipped transfer at the destination. Short receipts set
    /// `variance_qty`; the outbound leg is never rolled back.
    pub fn receive(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        quantities: Vec<LineQuantity>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        let mut transfer = self.load(transfer_id)?;
        let next_status = transfer.status.transition(TransferAction::Receive)?;
        let before = snapshot(&transfer);

        self.apply_quantities(&mut transfer, &quantities, Stage::Receive)?;

        for line in &mut transfer.lines {
            line.variance_qty = line.shipped_qty - line.received_qty;
        }

        // Destination keys are validated up front so a bad line cannot
        // interrupt the posting loop after earlier lines committed.
        for line in &transfer.lines {
            if line.received_qty == 0 || line.received_posted {
                continue;
            }
            self.ledger.validate_key(&receive_key(&transfer, line))?;
        }

        for idx in 0..transfer.lines.len() {
            let line = transfer.lines[idx].clone();
            if line.received_qty == 0 || line.received_posted {
                continue;
            }
            // Transfers do not alter the destination's average cost.
            let outcome = self.ledger.post_movement(
                actor,
                PostMovement {
                    key: receive_key(&transfer, &line),
                    movement_type: MovementType::TransferIn,
                    quantity: line.received_qty,
                    unit_cost: None,
                    reference: Reference::Transfer {
                        id: transfer.id.0,
                        number: transfer.number.clone(),
                    },
                    occurred_at,
                },
            );
            match outcome {
                Ok(_) => transfer.lines[idx].received_posted = true,
                Err(err) => {
                    self.transfers.update(transfer_id, transfer.clone())?;
                    return Err(err);
                }
            }
        }

        transfer.status = next_status;
        transfer.received_at = Some(occurred_at);
        self.transfers.update(transfer_id, transfer.clone())?;
        self.audit.record(AuditEntry::new(
            "transfer",
            transfer_id.0,
            "receive",
            before,
            snapshot(&transfer),
            actor,
            occurred_at,
        ));
        Ok(transfer)
    }

    pub fn transfer(&self, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.load(transfer_id)
    }

    // ----- internals -----

    fn load(&self, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.transfers
            .get(&transfer_id)
            .ok_or(DomainError::not_found("transfer"))
    }

    fn transition(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        action: TransferAction,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Transfer> {
        let mut transfer = self.load(transfer_id)?;
        let before = snapshot(&transfer);
        transfer.status = transfer.status.transition(action)?;
        self.transfers.update(transfer_id, transfer.clone())?;
        self.audit.record(AuditEntry::new(
            "transfer",
            transfer_id.0,
            action.name(),
            before,
            snapshot(&transfer),
            actor,
            occurred_at,
        ));
        Ok(transfer)
    }

    fn apply_quantities(
        &self,
        transfer: &mut Transfer,
        quantities: &[LineQuantity],
        stage: Stage,
    ) -> DomainResult<()> {
        // Lines whose movement already committed on an interrupted
        // attempt keep the quantity that was posted.
        if quantities.is_empty() {
            for line in &mut transfer.lines {
                match stage {
                    Stage::Ship if !line.shipped_posted => line.shipped_qty = line.approved_qty,
                    Stage::Receive if !line.received_posted => {
                        line.received_qty = line.shipped_qty;
                    }
                    _ => {}
                }
            }
            return Ok(());
        }

        for q in quantities {
            let line = transfer.line_mut(q.line_no)?;
            let (cap, posted, what) = match stage {
                Stage::Ship => (line.approved_qty, line.shipped_posted, "approved"),
                Stage::Receive => (line.shipped_qty, line.received_posted, "shipped"),
            };
            if posted {
                continue;
            }
            if q.quantity < 0 || q.quantity > cap {
                return Err(DomainError::validation(format!(
                    "line {}: quantity {} outside 0..={} ({what})",
                    q.line_no, q.quantity, cap
                )));
            }
            match stage {
                Stage::Ship => line.shipped_qty = q.quantity,
                Stage::Receive => line.received_qty = q.quantity,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ship,
    Receive,
}

fn source_key(from_warehouse: WarehouseId, line: &NewTransferLine) -> StockKey {
    let mut key = StockKey::new(line.product_id, from_warehouse);
    key.bin_id = line.from_bin;
    key.batch_id = line.batch_id;
    key
}

fn ship_key(transfer: &Transfer, line: &TransferLine) -> StockKey {
    let mut key = StockKey::new(line.product_id, transfer.from_warehouse);
    key.bin_id = line.from_bin;
    key.batch_id = line.batch_id;
    key
}

fn receive_key(transfer: &Transfer, line: &TransferLine) -> StockKey {
    let mut key = StockKey::new(line.product_id, transfer.to_warehouse);
    key.bin_id = line.to_bin;
    key.batch_id = line.batch_id;
    key
}

fn snapshot(transfer: &Transfer) -> serde_json::Value {
    json!({
        "status": format!("{:?}", transfer.status),
        "lines": transfer.lines.len(),
    })
}
