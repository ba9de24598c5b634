//! The Stock Ledger service.
//!
//! Single writer of `StockLevel` rows and `StockMovement` rows. Every
//! workflow engine posts quantity changes through `post_movement`; no other
//! code does quantity arithmetic. This is what keeps the reconciliation
//! invariant (movements replayed as signed deltas sum to quantity on hand)
//! provable.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockforge_core::{Actor, DomainError, DomainResult, EntityId};
use stockforge_registry::{BatchId, ProductId, Registry, WarehouseId};

use crate::costing::moving_average;
use crate::level::{StockKey, StockLevel, StockStatus};
use crate::movement::{MovementFilter, MovementId, MovementType, Reference, StockMovement};
use crate::store::{CommitError, LedgerStore};

/// Bounded optimistic retry before surfacing `ConcurrencyConflict`.
const MAX_POST_ATTEMPTS: u32 = 3;

/// A quantity change to be posted, as produced by a workflow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMovement {
    pub key: StockKey,
    pub movement_type: MovementType,
    /// Unsigned magnitude; must be positive. Direction comes from the type.
    pub quantity: i64,
    /// Unit cost of the inbound goods. `None` (or on outbound movements)
    /// values the movement at the current average cost without recompute.
    pub unit_cost: Option<Decimal>,
    pub reference: Reference,
    pub occurred_at: DateTime<Utc>,
}

/// Per-warehouse reorder alert row (read-only, polled by alerting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_available: i64,
    pub reorder_point: i64,
}

/// Batch nearing expiry with stock still on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub expiry_date: NaiveDate,
    pub quantity_on_hand: i64,
}

/// The ledger: storage + registry lookups behind one posting operation.
#[derive(Debug)]
pub struct StockLedger<S, R> {
    store: S,
    registry: R,
}

/// Trait-object form used by the workflow engines, which do not care which
/// backend the ledger runs on.
pub type SharedStockLedger =
    StockLedger<std::sync::Arc<dyn LedgerStore>, std::sync::Arc<dyn Registry>>;

impl<S, R> StockLedger<S, R>
where
    S: LedgerStore,
    R: Registry,
{
    pub fn new(store: S, registry: R) -> Self {
        Self { store, registry }
    }

    /// Post one movement: load-compute-write under optimistic concurrency,
    /// retried on version races, atomic per attempt.
    ///
    /// Inbound movements with a positive unit cost recompute the moving
    /// average; everything else carries the current average through.
    pub fn post_movement(
        &self,
        actor: &Actor,
        request: PostMovement,
    ) -> DomainResult<(StockLevel, StockMovement)> {
        self.validate(&request)?;

        for attempt in 1..=MAX_POST_ATTEMPTS {
            let current = self
                .store
                .level(&request.key)
                .unwrap_or_else(|| StockLevel::empty(request.key, request.occurred_at));

            let (next, movement) = self.prepare(actor, &request, &current)?;

            match self.store.commit(current.version, next.clone(), movement.clone()) {
                Ok(()) => {
                    tracing::debug!(
                        movement_number = %movement.movement_number,
                        product = %movement.product_id,
                        quantity = movement.signed_delta(),
                        running_balance = movement.running_balance,
                        "movement posted"
                    );
                    return Ok((next, movement));
                }
                Err(CommitError::VersionConflict { expected, found }) => {
                    tracing::warn!(
                        attempt,
                        expected,
                        found,
                        product = %request.key.product_id,
                        "version race on stock level, retrying"
                    );
                }
                Err(CommitError::Unavailable(msg)) => return Err(DomainError::storage(msg)),
            }
        }

        Err(DomainError::concurrency_conflict(format!(
            "stock level {}@{}",
            request.key.product_id, request.key.warehouse_id
        )))
    }

    /// One attempt's pure read-compute step; no side effects.
    fn prepare(
        &self,
        actor: &Actor,
        request: &PostMovement,
        current: &StockLevel,
    ) -> DomainResult<(StockLevel, StockMovement)> {
        let signed_delta = request.movement_type.sign() * request.quantity;
        let new_on_hand = current.quantity_on_hand + signed_delta;

        if new_on_hand < 0 && !self.registry.allows_negative_stock(&request.key.warehouse_id) {
            return Err(DomainError::insufficient_stock(
                request.quantity,
                current.quantity_on_hand,
            ));
        }

        let inbound_cost = request
            .unit_cost
            .filter(|c| request.movement_type.is_inbound() && *c > Decimal::ZERO);
        let (movement_cost, new_avg_cost) = match inbound_cost {
            Some(cost) => (
                cost,
                moving_average(
                    current.quantity_on_hand,
                    current.unit_cost,
                    request.quantity,
                    cost,
                ),
            ),
            None => (current.unit_cost, current.unit_cost),
        };

        // Classify against registry thresholds; product existence was
        // validated up front.
        let product = self
            .registry
            .product(&request.key.product_id)
            .ok_or(DomainError::not_found("product"))?;
        let new_available = new_on_hand - current.quantity_reserved;

        let next = StockLevel {
            key: current.key,
            quantity_on_hand: new_on_hand,
            quantity_reserved: current.quantity_reserved,
            quantity_available: new_available,
            unit_cost: new_avg_cost,
            status: StockStatus::classify(new_on_hand, new_available, &product),
            last_movement_at: request.occurred_at,
            version: current.version + 1,
        };

        let inbound = request.movement_type.is_inbound();
        let movement = StockMovement {
            id: MovementId::new(EntityId::new()),
            movement_number: self.store.next_movement_number(),
            movement_type: request.movement_type,
            movement_date: request.occurred_at,
            product_id: request.key.product_id,
            batch_id: request.key.batch_id,
            from_warehouse: (!inbound).then_some(request.key.warehouse_id),
            from_bin: if inbound { None } else { request.key.bin_id },
            to_warehouse: inbound.then_some(request.key.warehouse_id),
            to_bin: if inbound { request.key.bin_id } else { None },
            quantity: request.quantity,
            unit_cost: movement_cost,
            total_cost: movement_cost * Decimal::from(request.quantity),
            running_balance: new_on_hand,
            reference: request.reference.clone(),
            posted_by: actor.user_id,
        };

        Ok((next, movement))
    }

    fn validate(&self, request: &PostMovement) -> DomainResult<()> {
        if request.quantity <= 0 {
            return Err(DomainError::validation(
                "movement quantity must be positive",
            ));
        }
        self.validate_key(&request.key)
    }

    /// Check a stock key against the registry: product, warehouse, bin
    /// ownership, batch ownership. `post_movement` runs this itself;
    /// workflow engines posting several lines call it up front for every
    /// line, so a bad key surfaces before the first movement commits.
    pub fn validate_key(&self, key: &StockKey) -> DomainResult<()> {
        if self.registry.product(&key.product_id).is_none() {
            return Err(DomainError::not_found("product"));
        }
        if self.registry.warehouse(&key.warehouse_id).is_none() {
            return Err(DomainError::not_found("warehouse"));
        }
        if let Some(bin_id) = key.bin_id {
            let bin = self
                .registry
                .bin(&bin_id)
                .ok_or(DomainError::not_found("bin"))?;
            if bin.warehouse_id != key.warehouse_id {
                return Err(DomainError::validation(
                    "bin does not belong to the movement's warehouse",
                ));
            }
        }
        if let Some(batch_id) = key.batch_id {
            let batch = self
                .registry
                .batch(&batch_id)
                .ok_or(DomainError::not_found("batch"))?;
            if batch.product_id != key.product_id {
                return Err(DomainError::validation(
                    "batch does not belong to the movement's product",
                ));
            }
        }
        Ok(())
    }

    // ----- read side (reporting / alerting / workflows) -----

    pub fn level(&self, key: &StockKey) -> Option<StockLevel> {
        self.store.level(key)
    }

    pub fn levels(&self) -> Vec<StockLevel> {
        self.store.levels()
    }

    /// Quantity available for one key; zero for keys never stocked.
    pub fn available(&self, key: &StockKey) -> i64 {
        self.store
            .level(key)
            .map(|l| l.quantity_available)
            .unwrap_or(0)
    }

    pub fn movements(&self, filter: &MovementFilter) -> Vec<StockMovement> {
        self.store.movements(filter)
    }

    pub fn movements_for_key(&self, key: &StockKey) -> Vec<StockMovement> {
        self.store.movements_for_key(key)
    }

    /// Items in a warehouse at or below their reorder point (or at/below
    /// zero), aggregated per product across bins and batches.
    pub fn reorder_alerts(&self, warehouse_id: WarehouseId) -> Vec<ReorderAlert> {
        use std::collections::HashMap;

        let mut per_product: HashMap<ProductId, i64> = HashMap::new();
        for level in self.store.levels() {
            if level.key.warehouse_id == warehouse_id {
                *per_product.entry(level.key.product_id).or_default() +=
                    level.quantity_available;
            }
        }

        let mut alerts: Vec<ReorderAlert> = per_product
            .into_iter()
            .filter_map(|(product_id, available)| {
                let product = self.registry.product(&product_id)?;
                (available <= product.reorder_point || available <= 0).then_some(ReorderAlert {
                    product_id,
                    warehouse_id,
                    quantity_available: available,
                    reorder_point: product.reorder_point,
                })
            })
            .collect();
        alerts.sort_by_key(|a| a.quantity_available);
        alerts
    }

    /// Batches expiring within `horizon_days` of `as_of` that still hold
    /// stock, aggregated per batch across locations.
    pub fn expiry_alerts(&self, as_of: NaiveDate, horizon_days: u64) -> Vec<ExpiryAlert> {
        use std::collections::HashMap;

        let cutoff = as_of
            .checked_add_days(Days::new(horizon_days))
            .unwrap_or(NaiveDate::MAX);

        let mut per_batch: HashMap<BatchId, (ProductId, i64)> = HashMap::new();
        for level in self.store.levels() {
            if level.quantity_on_hand <= 0 {
                continue;
            }
            if let Some(batch_id) = level.key.batch_id {
                let entry = per_batch
                    .entry(batch_id)
                    .or_insert((level.key.product_id, 0));
                entry.1 += level.quantity_on_hand;
            }
        }

        let mut alerts: Vec<ExpiryAlert> = per_batch
            .into_iter()
            .filter_map(|(batch_id, (product_id, on_hand))| {
                let batch = self.registry.batch(&batch_id)?;
                let expiry = batch.expiry_date?;
                (expiry <= cutoff).then_some(ExpiryAlert {
                    batch_id,
                    product_id,
                    expiry_date: expiry,
                    quantity_on_hand: on_hand,
                })
            })
            .collect();
        alerts.sort_by_key(|a| a.expiry_date);
        alerts
    }

    /// Replay the movement log for one key and compare against the live
    /// aggregate. A mismatch means the ledger is corrupted; the caller
    /// should abort the request it was serving.
    pub fn verify(&self, key: &StockKey) -> DomainResult<()> {
        let replayed: i64 = self
            .store
            .movements_for_key(key)
            .iter()
            .map(StockMovement::signed_delta)
            .sum();
        let on_hand = self
            .store
            .level(key)
            .map(|l| l.quantity_on_hand)
            .unwrap_or(0);

        if replayed != on_hand {
            return Err(DomainError::corrupted(format!(
                "key {}@{}: movements replay to {replayed}, level holds {on_hand}",
                key.product_id, key.warehouse_id
            )));
        }
        Ok(())
    }

    /// Reconcile every known key.
    pub fn verify_all(&self) -> DomainResult<()> {
        for level in self.store.levels() {
            self.verify(&level.key)?;
        }
        Ok(())
    }
}
