//! The adjustment workflow engine.
//!
//! The simplest engine: no approval lifecycle. One validated ledger call
//! is the entire side effect; the `StockAdjustment` document records what
//! changed and why.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use stockforge_audit::{AuditEntry, AuditSink};
use stockforge_core::{Actor, DocumentStore, DomainError, DomainResult, EntityId};
use stockforge_ledger::{MovementType, PostMovement, Reference, SharedStockLedger, StockKey};
use stockforge_registry::Registry;

use crate::adjustment::{AdjustmentEntry, AdjustmentId, AdjustmentKind, StockAdjustment};

/// An adjustment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustStock {
    pub key: StockKey,
    pub kind: AdjustmentKind,
    pub entry: AdjustmentEntry,
    /// Required; empty reason codes are rejected.
    pub reason_code: String,
    /// Unit cost for inbound adjustments (returns, positive corrections).
    /// `None` leaves the average cost untouched.
    pub unit_cost: Option<Decimal>,
}

pub struct AdjustmentService {
    adjustments: Arc<dyn DocumentStore<AdjustmentId, StockAdjustment>>,
    ledger: Arc<SharedStockLedger>,
    registry: Arc<dyn Registry>,
    audit: Arc<dyn AuditSink>,
}

impl AdjustmentService {
    pub fn new(
        adjustments: Arc<dyn DocumentStore<AdjustmentId, StockAdjustment>>,
        ledger: Arc<SharedStockLedger>,
        registry: Arc<dyn Registry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            adjustments,
            ledger,
            registry,
            audit,
        }
    }

    /// Validate, post one movement, persist the adjustment document.
    pub fn apply(
        &self,
        actor: &Actor,
        command: AdjustStock,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<StockAdjustment> {
        if command.reason_code.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason code is required"));
        }
        if self.registry.product(&command.key.product_id).is_none() {
            return Err(DomainError::not_found("product"));
        }

        let current_on_hand = self
            .ledger
            .level(&command.key)
            .map(|l| l.quantity_on_hand)
            .unwrap_or(0);
        let delta = match command.entry {
            AdjustmentEntry::Delta(d) => d,
            AdjustmentEntry::TargetQuantity(target) => target - current_on_hand,
        };
        if delta == 0 {
            return Err(DomainError::validation(
                "adjustment would not change quantity on hand",
            ));
        }
        let movement_type = movement_type_for(command.kind, delta)?;

        let id = AdjustmentId::new(EntityId::new());
        let number = self.adjustments.next_number("ADJ");

        let (level, movement) = self.ledger.post_movement(
            actor,
            PostMovement {
                key: command.key,
                movement_type,
                quantity: delta.abs(),
                unit_cost: command.unit_cost,
                reference: Reference::Adjustment {
                    id: id.0,
                    number: number.clone(),
                },
                occurred_at,
            },
        )?;

        let adjustment = StockAdjustment {
            id,
            number,
            key: command.key,
            kind: command.kind,
            reason_code: command.reason_code,
            quantity_before: current_on_hand,
            quantity_after: level.quantity_on_hand,
            variance: delta,
            value_impact: Decimal::from(delta) * movement.unit_cost,
            created_by: actor.user_id,
            created_at: occurred_at,
        };
        self.adjustments.insert(id, adjustment.clone());
        self.audit.record(AuditEntry::new(
            "adjustment",
            id.0,
            "apply",
            json!({ "quantity_on_hand": current_on_hand }),
            json!({
                "quantity_on_hand": adjustment.quantity_after,
                "reason_code": adjustment.reason_code,
                "kind": format!("{:?}", adjustment.kind),
            }),
            actor,
            occurred_at,
        ));
        tracing::info!(
            adjustment = %adjustment.number,
            variance = adjustment.variance,
            reason = %adjustment.reason_code,
            "adjustment applied"
        );
        Ok(adjustment)
    }

    pub fn adjustment(&self, id: AdjustmentId) -> DomainResult<StockAdjustment> {
        self.adjustments
            .get(&id)
            .ok_or(DomainError::not_found("adjustment"))
    }
}

/// Returns are inbound and scrap is outbound; corrections follow the sign.
fn movement_type_for(kind: AdjustmentKind, delta: i64) -> DomainResult<MovementType> {
    match (kind, delta > 0) {
        (AdjustmentKind::Correction, true) => Ok(MovementType::PositiveAdjustment),
        (AdjustmentKind::Correction, false) => Ok(MovementType::NegativeAdjustment),
        (AdjustmentKind::Return, true) => Ok(MovementType::Return),
        (AdjustmentKind::Return, false) => Err(DomainError::validation(
            "a return must increase quantity on hand",
        )),
        (AdjustmentKind::Scrap, false) => Ok(MovementType::Scrap),
        (AdjustmentKind::Scrap, true) => Err(DomainError::validation(
            "scrap must decrease quantity on hand",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_audit::InMemoryAuditSink;
    use stockforge_core::{InMemoryDocumentStore, UserId};
    use stockforge_ledger::{InMemoryLedgerStore, LedgerStore, StockLedger};
    use stockforge_registry::{InMemoryRegistry, Product, ProductId, Warehouse, WarehouseId};

    struct Fixture {
        service: AdjustmentService,
        ledger: Arc<SharedStockLedger>,
        key: StockKey,
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), "adjuster")
    }

    fn fixture(seed_qty: i64, unit_cost: Decimal) -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new());
        let product_id = ProductId::new(EntityId::new());
        let warehouse_id = WarehouseId::new(EntityId::new());
        registry
            .add_product(Product::new(product_id, "SKU-1", "Widget"))
            .unwrap();
        registry
            .add_warehouse(Warehouse::new(warehouse_id, "WH1", "Main"))
            .unwrap();

        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let registry_dyn: Arc<dyn Registry> = registry;
        let ledger = Arc::new(StockLedger::new(store, registry_dyn.clone()));
        let key = StockKey::new(product_id, warehouse_id);

        if seed_qty > 0 {
            ledger
                .post_movement(
                    &actor(),
                    PostMovement {
                        key,
                        movement_type: MovementType::PurchaseReceipt,
                        quantity: seed_qty,
                        unit_cost: Some(unit_cost),
                        reference: Reference::None,
                        occurred_at: Utc::now(),
                    },
                )
                .unwrap();
        }

        let service = AdjustmentService::new(
            Arc::new(InMemoryDocumentStore::new()),
            ledger.clone(),
            registry_dyn,
            Arc::new(InMemoryAuditSink::new()),
        );

        Fixture {
            service,
            ledger,
            key,
        }
    }

    #[test]
    fn target_quantity_computes_the_delta() {
        let f = fixture(100, Decimal::TEN);
        let adjustment = f
            .service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Correction,
                    entry: AdjustmentEntry::TargetQuantity(92),
                    reason_code: "damaged-on-shelf".into(),
                    unit_cost: None,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(adjustment.variance, -8);
        assert_eq!(adjustment.quantity_before, 100);
        assert_eq!(adjustment.quantity_after, 92);
        assert_eq!(adjustment.value_impact, Decimal::from(-80));
        assert_eq!(f.ledger.level(&f.key).unwrap().quantity_on_hand, 92);
        f.ledger.verify_all().unwrap();
    }

    #[test]
    fn missing_reason_code_is_rejected() {
        let f = fixture(10, Decimal::TEN);
        let err = f
            .service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Correction,
                    entry: AdjustmentEntry::Delta(1),
                    reason_code: "  ".into(),
                    unit_cost: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        // Nothing moved.
        assert_eq!(f.ledger.level(&f.key).unwrap().quantity_on_hand, 10);
    }

    #[test]
    fn zero_delta_is_rejected() {
        let f = fixture(10, Decimal::TEN);
        let err = f
            .service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Correction,
                    entry: AdjustmentEntry::TargetQuantity(10),
                    reason_code: "no-op".into(),
                    unit_cost: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn return_with_cost_recomputes_average() {
        let f = fixture(100, Decimal::TEN);
        f.service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Return,
                    entry: AdjustmentEntry::Delta(50),
                    reason_code: "customer-return".into(),
                    unit_cost: Some(Decimal::from(16)),
                },
                Utc::now(),
            )
            .unwrap();
        let level = f.ledger.level(&f.key).unwrap();
        assert_eq!(level.quantity_on_hand, 150);
        assert_eq!(level.unit_cost, Decimal::from(12));
    }

    #[test]
    fn scrap_must_be_negative() {
        let f = fixture(10, Decimal::TEN);
        let err = f
            .service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Scrap,
                    entry: AdjustmentEntry::Delta(3),
                    reason_code: "expired".into(),
                    unit_cost: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn scrap_below_zero_is_insufficient_stock() {
        let f = fixture(5, Decimal::TEN);
        let err = f
            .service
            .apply(
                &actor(),
                AdjustStock {
                    key: f.key,
                    kind: AdjustmentKind::Scrap,
                    entry: AdjustmentEntry::Delta(-8),
                    reason_code: "water-damage".into(),
                    unit_cost: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 8,
                available: 5
            }
        );
    }
}
