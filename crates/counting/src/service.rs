//! The stock count workflow engine.
//!
//! A count freezes `system_qty` per line at creation and never refreshes
//! it, even when other movements land during the count window. Posting
//! produces one adjustment movement per variant line and none for matched
//! lines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use stockforge_audit::{AuditEntry, AuditSink};
use stockforge_core::{Actor, DocumentStore, DomainError, DomainResult, EntityId};
use stockforge_ledger::{MovementType, PostMovement, Reference, SharedStockLedger};
use stockforge_registry::{ProductId, Registry, WarehouseId};

use crate::count::{CountAction, CountStatus, StockCount, StockCountId, StockCountLine};

/// A new count request. An empty `product_ids` counts every stocked key
/// in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCount {
    pub warehouse_id: WarehouseId,
    pub product_ids: Vec<ProductId>,
    pub blind: bool,
}

pub struct CountingService {
    counts: Arc<dyn DocumentStore<StockCountId, StockCount>>,
    ledger: Arc<SharedStockLedger>,
    registry: Arc<dyn Registry>,
    audit: Arc<dyn AuditSink>,
}

impl CountingService {
    pub fn new(
        counts: Arc<dyn DocumentStore<StockCountId, StockCount>>,
        ledger: Arc<SharedStockLedger>,
        registry: Arc<dyn Registry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            counts,
            ledger,
            registry,
            audit,
        }
    }

    /// Create a count with one line per stocked key in scope, snapshotting
    /// `system_qty` and the current unit cost.
    pub fn create(
        &self,
        actor: &Actor,
        command: CreateCount,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<StockCount> {
        if self.registry.warehouse(&command.warehouse_id).is_none() {
            return Err(DomainError::not_found("warehouse"));
        }

        let mut lines = Vec::new();
        for level in self.ledger.levels() {
            if level.key.warehouse_id != command.warehouse_id {
                continue;
            }
            if !command.product_ids.is_empty()
                && !command.product_ids.contains(&level.key.product_id)
            {
                continue;
            }
            lines.push(StockCountLine::new(
                lines.len() as u32 + 1,
                level.key,
                level.quantity_on_hand,
                level.unit_cost,
            ));
        }
        if lines.is_empty() {
            return Err(DomainError::validation(
                "no stock levels in scope for this count",
            ));
        }

        let count = StockCount {
            id: StockCountId::new(EntityId::new()),
            number: self.counts.next_number("CNT"),
            warehouse_id: command.warehouse_id,
            blind: command.blind,
            status: CountStatus::Scheduled,
            lines,
            created_by: actor.user_id,
            created_at: occurred_at,
            posted_at: None,
        };
        self.counts.insert(count.id, count.clone());
        self.audit.record(AuditEntry::new(
            "stock_count",
            count.id.0,
            "create",
            json!(null),
            snapshot(&count),
            actor,
            occurred_at,
        ));
        Ok(count)
    }

    /// Record a physical count for one line.
    ///
    /// The first count provisionally finalizes the line. On a blind count
    /// the second count must match the first to finalize; a mismatch sets
    /// `recount_required` and a later first-count call restarts the line.
    pub fn record_count(
        &self,
        actor: &Actor,
        count_id: StockCountId,
        line_no: u32,
        qty: i64,
        is_second_count: bool,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<StockCount> {
        if qty < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        let mut count = self.load(count_id)?;
        let before = snapshot(&count);

        // First recording moves the count into progress.
        if count.status == CountStatus::Scheduled {
            count.status = count.status.transition(CountAction::Start)?;
        }
        if count.status != CountStatus::InProgress {
            return Err(DomainError::invalid_status(
                "record_count",
                format!("{:?}", count.status),
            ));
        }

        let blind = count.blind;
        let line = count.line_mut(line_no)?;
        if is_second_count {
            let Some(first) = line.count_qty1 else {
                return Err(DomainError::validation(
                    "second count recorded before the first",
                ));
            };
            line.count_qty2 = Some(qty);
            if first == qty {
                line.final_count_qty = Some(qty);
                line.recount_required = false;
            } else {
                line.final_count_qty = None;
                line.recount_required = true;
            }
        } else {
            line.count_qty1 = Some(qty);
            line.count_qty2 = None;
            line.recount_required = false;
            // Blind counts stay unfinalized until confirmed.
            line.final_count_qty = if blind { None } else { Some(qty) };
        }

        self.counts.update(count_id, count.clone())?;
        self.audit.record(AuditEntry::new(
            "stock_count",
            count_id.0,
            "record_count",
            before,
            snapshot(&count),
            actor,
            occurred_at,
        ));
        Ok(count)
    }

    /// Post the count: one adjustment movement per line with nonzero
    /// variance, matched lines marked and skipped.
    pub fn post(
        &self,
        actor: &Actor,
        count_id: StockCountId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<StockCount> {
        let mut count = self.load(count_id)?;
        let next_status = count.status.transition(CountAction::Post)?;
        let before = snapshot(&count);

        let uncounted = count.uncounted();
        if uncounted > 0 {
            return Err(DomainError::IncompleteCount { uncounted });
        }

        let mut movements = 0usize;
        for idx in 0..count.lines.len() {
            let line = count.lines[idx].clone();
            let variance = match line.variance() {
                Some(v) => v,
                None => continue,
            };
            if variance == 0 {
                count.lines[idx].matched = true;
                continue;
            }
            if line.posted {
                // Committed by an interrupted earlier post.
                continue;
            }
            let movement_type = if variance > 0 {
                MovementType::PositiveAdjustment
            } else {
                MovementType::NegativeAdjustment
            };
            let outcome = self.ledger.post_movement(
                actor,
                PostMovement {
                    key: line.key,
                    movement_type,
                    quantity: variance.abs(),
                    unit_cost: None,
                    reference: Reference::Count {
                        id: count.id.0,
                        number: count.number.clone(),
                    },
                    occurred_at,
                },
            );
            match outcome {
                Ok(_) => count.lines[idx].posted = true,
                Err(err) => {
                    // A variant line can still fail here: stock may have
                    // drained below its negative variance during the count
                    // window. Persist the markers so a retry skips lines
                    // whose adjustments already committed.
                    self.counts.update(count_id, count.clone())?;
                    return Err(err);
                }
            }
            movements += 1;
        }

        count.status = next_status;
        count.posted_at = Some(occurred_at);
        self.counts.update(count_id, count.clone())?;
        self.audit.record(AuditEntry::new(
            "stock_count",
            count_id.0,
            "post",
            before,
            snapshot(&count),
            actor,
            occurred_at,
        ));
        tracing::info!(count = %count.number, movements, "stock count posted");
        Ok(count)
    }

    pub fn cancel(
        &self,
        actor: &Actor,
        count_id: StockCountId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<StockCount> {
        let mut count = self.load(count_id)?;
        let before = snapshot(&count);
        count.status = count.status.transition(CountAction::Cancel)?;
        self.counts.update(count_id, count.clone())?;
        self.audit.record(AuditEntry::new(
            "stock_count",
            count_id.0,
            "cancel",
            before,
            snapshot(&count),
            actor,
            occurred_at,
        ));
        Ok(count)
    }

    pub fn count(&self, count_id: StockCountId) -> DomainResult<StockCount> {
        self.load(count_id)
    }

    fn load(&self, count_id: StockCountId) -> DomainResult<StockCount> {
        self.counts
            .get(&count_id)
            .ok_or(DomainError::not_found("stock count"))
    }
}

fn snapshot(count: &StockCount) -> serde_json::Value {
    json!({
        "status": format!("{:?}", count.status),
        "lines": count.lines.len(),
        "uncounted": count.uncounted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stockforge_audit::InMemoryAuditSink;
    use stockforge_core::{InMemoryDocumentStore, UserId};
    use stockforge_ledger::{
        InMemoryLedgerStore, LedgerStore, MovementFilter, StockKey, StockLedger,
    };
    use stockforge_registry::{InMemoryRegistry, Product, Warehouse};

    struct Fixture {
        service: CountingService,
        ledger: Arc<SharedStockLedger>,
        registry: Arc<InMemoryRegistry>,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), "counter")
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
        let registry_dyn: Arc<dyn Registry> = registry.clone();
        let ledger = Arc::new(StockLedger::new(store, registry_dyn.clone()));

        if seed_qty > 0 {
            ledger
                .post_movement(
                    &actor(),
                    PostMovement {
                        key: StockKey::new(product_id, warehouse_id),
                        movement_type: MovementType::PurchaseReceipt,
                        quantity: seed_qty,
                        unit_cost: Some(unit_cost),
                        reference: Reference::None,
                        occurred_at: Utc::now(),
                    },
                )
                .unwrap();
        }

        let service = CountingService::new(
            Arc::new(InMemoryDocumentStore::new()),
            ledger.clone(),
            registry_dyn,
            Arc::new(InMemoryAuditSink::new()),
        );

        Fixture {
            service,
            ledger,
            registry,
            product_id,
            warehouse_id,
        }
    }

    fn create(f: &Fixture, blind: bool) -> StockCount {
        f.service
            .create(
                &actor(),
                CreateCount {
                    warehouse_id: f.warehouse_id,
                    product_ids: vec![],
                    blind,
                },
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn shortfall_posts_one_negative_adjustment() {
        let f = fixture(150, Decimal::new(120, 1));
        let actor = actor();
        let count = create(&f, false);

        let count = f
            .service
            .record_count(&actor, count.id, 1, 145, false, Utc::now())
            .unwrap();
        let line = count.line(1).unwrap();
        assert_eq!(line.variance(), Some(-5));
        assert_eq!(line.variance_value(), Some(Decimal::new(-600, 1)));

        let count = f.service.post(&actor, count.id, Utc::now()).unwrap();
        assert_eq!(count.status, CountStatus::Posted);

        let key = StockKey::new(f.product_id, f.warehouse_id);
        assert_eq!(f.ledger.level(&key).unwrap().quantity_on_hand, 145);
        let adjustments: Vec<_> = f
            .ledger
            .movements(&MovementFilter {
                movement_type: Some(MovementType::NegativeAdjustment),
                ..MovementFilter::default()
            })
            .into_iter()
            .collect();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].quantity, 5);
        f.ledger.verify_all().unwrap();
    }

    #[test]
    fn matched_lines_produce_no_movements() {
        let f = fixture(80, Decimal::TEN);
        let actor = actor();
        let count = create(&f, false);
        f.service
            .record_count(&actor, count.id, 1, 80, false, Utc::now())
            .unwrap();
        let count = f.service.post(&actor, count.id, Utc::now()).unwrap();
        assert!(count.line(1).unwrap().matched);
        // Only the seeding receipt is in the log.
        assert_eq!(f.ledger.movements(&MovementFilter::default()).len(), 1);
    }

    #[test]
    fn uncounted_line_blocks_posting() {
        let f = fixture(40, Decimal::TEN);
        let actor = actor();
        // On a blind count the first recording leaves the line unfinalized.
        let count = create(&f, true);
        f.service
            .record_count(&actor, count.id, 1, 40, false, Utc::now())
            .unwrap();
        let err = f.service.post(&actor, count.id, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::IncompleteCount { uncounted: 1 });
        // Levels untouched.
        let key = StockKey::new(f.product_id, f.warehouse_id);
        assert_eq!(f.ledger.level(&key).unwrap().quantity_on_hand, 40);
        assert_eq!(f.service.count(count.id).unwrap().status, CountStatus::InProgress);
    }

    #[test]
    fn blind_count_finalizes_only_on_matching_second_count() {
        let f = fixture(60, Decimal::TEN);
        let actor = actor();
        let count = create(&f, true);

        let count = f
            .service
            .record_count(&actor, count.id, 1, 58, false, Utc::now())
            .unwrap();
        assert_eq!(count.line(1).unwrap().final_count_qty, None);

        // Mismatching confirmation forces a recount.
        let count = f
            .service
            .record_count(&actor, count.id, 1, 59, true, Utc::now())
            .unwrap();
        let line = count.line(1).unwrap();
        assert!(line.recount_required);
        assert_eq!(line.final_count_qty, None);

        // Restart the line, then confirm.
        f.service
            .record_count(&actor, count.id, 1, 58, false, Utc::now())
            .unwrap();
        let count = f
            .service
            .record_count(&actor, count.id, 1, 58, true, Utc::now())
            .unwrap();
        assert_eq!(count.line(1).unwrap().final_count_qty, Some(58));
    }

    #[test]
    fn system_qty_is_frozen_at_creation() {
        let f = fixture(100, Decimal::TEN);
        let actor = actor();
        let count = create(&f, false);

        // Movement during the count window does not refresh the baseline.
        f.ledger
            .post_movement(
                &actor,
                PostMovement {
                    key: StockKey::new(f.product_id, f.warehouse_id),
                    movement_type: MovementType::PurchaseReceipt,
                    quantity: 25,
                    unit_cost: Some(Decimal::TEN),
                    reference: Reference::None,
                    occurred_at: Utc::now(),
                },
            )
            .unwrap();

        let count = f.service.count(count.id).unwrap();
        assert_eq!(count.line(1).unwrap().system_qty, 100);
    }

    #[test]
    fn drained_line_fails_the_post_and_retry_does_not_double_adjust() {
        let f = fixture(100, Decimal::TEN);
        let actor = actor();

        // A second product in the same warehouse, counted short by 30.
        let product_b = ProductId::new(EntityId::new());
        f.registry
            .add_product(Product::new(product_b, "SKU-2", "Gadget"))
            .unwrap();
        let key_b = StockKey::new(product_b, f.warehouse_id);
        f.ledger
            .post_movement(
                &actor,
                PostMovement {
                    key: key_b,
                    movement_type: MovementType::PurchaseReceipt,
                    quantity: 50,
                    unit_cost: Some(Decimal::TEN),
                    reference: Reference::None,
                    occurred_at: Utc::now(),
                },
            )
            .unwrap();

        let count = create(&f, false);
        let line_no = |count: &StockCount, product: ProductId| {
            count
                .lines
                .iter()
                .find(|l| l.key.product_id == product)
                .unwrap()
                .line_no
        };
        let line_a = line_no(&count, f.product_id);
        let line_b = line_no(&count, product_b);
        f.service
            .record_count(&actor, count.id, line_a, 90, false, Utc::now())
            .unwrap();
        f.service
            .record_count(&actor, count.id, line_b, 20, false, Utc::now())
            .unwrap();

        // Stock for the second product drains during the count window,
        // below what its negative variance needs.
        f.ledger
            .post_movement(
                &actor,
                PostMovement {
                    key: key_b,
                    movement_type: MovementType::Scrap,
                    quantity: 45,
                    unit_cost: None,
                    reference: Reference::None,
                    occurred_at: Utc::now(),
                },
            )
            .unwrap();

        let err = f.service.post(&actor, count.id, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 30,
                available: 5,
            }
        );
        assert_eq!(
            f.service.count(count.id).unwrap().status,
            CountStatus::InProgress
        );

        // Stock returns, the retry posts the remaining line and does not
        // re-adjust any line whose movement already committed.
        f.ledger
            .post_movement(
                &actor,
                PostMovement {
                    key: key_b,
                    movement_type: MovementType::PurchaseReceipt,
                    quantity: 30,
                    unit_cost: Some(Decimal::TEN),
                    reference: Reference::None,
                    occurred_at: Utc::now(),
                },
            )
            .unwrap();
        let count = f.service.post(&actor, count.id, Utc::now()).unwrap();
        assert_eq!(count.status, CountStatus::Posted);

        let key_a = StockKey::new(f.product_id, f.warehouse_id);
        assert_eq!(f.ledger.level(&key_a).unwrap().quantity_on_hand, 90);
        assert_eq!(f.ledger.level(&key_b).unwrap().quantity_on_hand, 5);
        let adjustments_for = |product: ProductId| {
            f.ledger
                .movements(&MovementFilter {
                    product_id: Some(product),
                    movement_type: Some(MovementType::NegativeAdjustment),
                    ..MovementFilter::default()
                })
                .len()
        };
        assert_eq!(adjustments_for(f.product_id), 1);
        assert_eq!(adjustments_for(product_b), 1);
        f.ledger.verify_all().unwrap();
    }

    #[test]
    fn posting_twice_is_already_posted() {
        let f = fixture(30, Decimal::TEN);
        let actor = actor();
        let count = create(&f, false);
        f.service
            .record_count(&actor, count.id, 1, 30, false, Utc::now())
            .unwrap();
        f.service.post(&actor, count.id, Utc::now()).unwrap();
        let err = f.service.post(&actor, count.id, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::AlreadyPosted);
    }

    #[test]
    fn empty_scope_is_rejected() {
        let f = fixture(0, Decimal::ZERO);
        let err = f
            .service
            .create(
                &actor(),
                CreateCount {
                    warehouse_id: f.warehouse_id,
                    product_ids: vec![],
                    blind: false,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
