//! Shared harness for cross-workflow integration tests.
//!
//! Wires every workflow engine to one in-memory ledger, registry, and
//! audit sink, the way a deployment would wire them to real backends.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use stockforge_adjustment::{AdjustmentId, AdjustmentService, StockAdjustment};
use stockforge_audit::InMemoryAuditSink;
use stockforge_core::{Actor, DomainResult, EntityId, InMemoryDocumentStore, UserId};
use stockforge_counting::{CountingService, StockCount, StockCountId};
use stockforge_ledger::{
    InMemoryLedgerStore, LedgerStore, MovementType, PostMovement, Reference, SharedStockLedger,
    StockKey, StockLedger,
};
use stockforge_receiving::{GoodsReceipt, PurchaseOrder, PurchaseOrderId, ReceiptId, ReceivingService};
use stockforge_registry::{
    InMemoryRegistry, Product, ProductId, Registry, Warehouse, WarehouseId,
};
use stockforge_transfer::{Transfer, TransferId, TransferService};

/// Every engine wired to one shared ledger and registry.
pub struct Harness {
    pub registry: Arc<InMemoryRegistry>,
    pub ledger: Arc<SharedStockLedger>,
    pub audit: Arc<InMemoryAuditSink>,
    pub receiving: ReceivingService,
    pub transfer: TransferService,
    pub counting: CountingService,
    pub adjustment: AdjustmentService,
    pub actor: Actor,
}

impl Harness {
    pub fn new() -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let registry_dyn: Arc<dyn Registry> = registry.clone();
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let ledger = Arc::new(StockLedger::new(store, registry_dyn.clone()));
        let audit = Arc::new(InMemoryAuditSink::new());
        let audit_dyn: Arc<dyn stockforge_audit::AuditSink> = audit.clone();

        let receiving = ReceivingService::new(
            order_store(),
            receipt_store(),
            ledger.clone(),
            registry_dyn.clone(),
            audit_dyn.clone(),
        );
        let transfer = TransferService::new(
            transfer_store(),
            ledger.clone(),
            registry_dyn.clone(),
            audit_dyn.clone(),
        );
        let counting = CountingService::new(
            count_store(),
            ledger.clone(),
            registry_dyn.clone(),
            audit_dyn.clone(),
        );
        let adjustment = AdjustmentService::new(
            adjustment_store(),
            ledger.clone(),
            registry_dyn,
            audit_dyn,
        );

        Self {
            registry,
            ledger,
            audit,
            receiving,
            transfer,
            counting,
            adjustment,
            actor: Actor::new(UserId::new(), "integration"),
        }
    }

    pub fn add_product(&self, sku: &str) -> ProductId {
        let id = ProductId::new(EntityId::new());
        self.registry
            .add_product(Product::new(id, sku, sku))
            .unwrap();
        id
    }

    pub fn add_warehouse(&self, code: &str) -> WarehouseId {
        let id = WarehouseId::new(EntityId::new());
        self.registry
            .add_warehouse(Warehouse::new(id, code, code))
            .unwrap();
        id
    }

    /// Seed stock directly through the ledger, outside any workflow.
    pub fn seed(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        unit_cost: Decimal,
    ) -> DomainResult<()> {
        self.ledger.post_movement(
            &self.actor,
            PostMovement {
                key: StockKey::new(product_id, warehouse_id),
                movement_type: MovementType::PurchaseReceipt,
                quantity,
                unit_cost: Some(unit_cost),
                reference: Reference::None,
                occurred_at: Utc::now(),
            },
        )?;
        Ok(())
    }

    pub fn on_hand(&self, product_id: ProductId, warehouse_id: WarehouseId) -> i64 {
        self.ledger
            .level(&StockKey::new(product_id, warehouse_id))
            .map(|l| l.quantity_on_hand)
            .unwrap_or(0)
    }

    pub fn unit_cost(&self, product_id: ProductId, warehouse_id: WarehouseId) -> Decimal {
        self.ledger
            .level(&StockKey::new(product_id, warehouse_id))
            .map(|l| l.unit_cost)
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

fn order_store() -> Arc<dyn stockforge_core::DocumentStore<PurchaseOrderId, PurchaseOrder>> {
    Arc::new(InMemoryDocumentStore::new())
}

fn receipt_store() -> Arc<dyn stockforge_core::DocumentStore<ReceiptId, GoodsReceipt>> {
    Arc::new(InMemoryDocumentStore::new())
}

fn transfer_store() -> Arc<dyn stockforge_core::DocumentStore<TransferId, Transfer>> {
    Arc::new(InMemoryDocumentStore::new())
}

fn count_store() -> Arc<dyn stockforge_core::DocumentStore<StockCountId, StockCount>> {
    Arc::new(InMemoryDocumentStore::new())
}

fn adjustment_store() -> Arc<dyn stockforge_core::DocumentStore<AdjustmentId, StockAdjustment>> {
    Arc::new(InMemoryDocumentStore::new())
}
