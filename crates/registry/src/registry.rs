//! Read-only reference data lookups.
//!
//! The ledger and workflow engines consult the registry for the few facts
//! they need (thresholds, negative-stock policy, bin/batch existence) and
//! nothing else — no navigation graphs, every lookup explicit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use stockforge_core::{DomainError, DomainResult};

use crate::batch::{Batch, BatchId};
use crate::product::{Product, ProductId};
use crate::warehouse::{Bin, BinId, Warehouse, WarehouseId};

/// Read-only registry lookups consumed by the core.
pub trait Registry: Send + Sync {
    fn product(&self, id: &ProductId) -> Option<Product>;
    fn warehouse(&self, id: &WarehouseId) -> Option<Warehouse>;
    fn bin(&self, id: &BinId) -> Option<Bin>;
    fn batch(&self, id: &BatchId) -> Option<Batch>;

    /// Per-warehouse negative-stock policy; unknown warehouses disallow.
    fn allows_negative_stock(&self, id: &WarehouseId) -> bool {
        self.warehouse(id).is_some_and(|w| w.allow_negative_stock)
    }
}

impl<R> Registry for Arc<R>
where
    R: Registry + ?Sized,
{
    fn product(&self, id: &ProductId) -> Option<Product> {
        (**self).product(id)
    }

    fn warehouse(&self, id: &WarehouseId) -> Option<Warehouse> {
        (**self).warehouse(id)
    }

    fn bin(&self, id: &BinId) -> Option<Bin> {
        (**self).bin(id)
    }

    fn batch(&self, id: &BatchId) -> Option<Batch> {
        (**self).batch(id)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    products: HashMap<ProductId, Product>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    bins: HashMap<BinId, Bin>,
    batches: HashMap<BatchId, Batch>,
}

/// In-memory registry for tests/dev.
///
/// Mutation is only exposed on the concrete type; everything above the
/// registry sees the read-only `Registry` trait.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(DomainError::duplicate_code(format!("sku {}", product.sku)));
        }
        state.products.insert(product.id, product);
        Ok(())
    }

    pub fn add_warehouse(&self, warehouse: Warehouse) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.warehouses.values().any(|w| w.code == warehouse.code) {
            return Err(DomainError::duplicate_code(format!(
                "warehouse {}",
                warehouse.code
            )));
        }
        state.warehouses.insert(warehouse.id, warehouse);
        Ok(())
    }

    pub fn add_bin(&self, bin: Bin) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.warehouses.get(&bin.warehouse_id).is_none() {
            return Err(DomainError::not_found("warehouse"));
        }
        let clash = state
            .bins
            .values()
            .any(|b| b.warehouse_id == bin.warehouse_id && b.code == bin.code);
        if clash {
            return Err(DomainError::duplicate_code(format!("bin {}", bin.code)));
        }
        state.bins.insert(bin.id, bin);
        Ok(())
    }

    pub fn add_batch(&self, batch: Batch) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.products.get(&batch.product_id).is_none() {
            return Err(DomainError::not_found("product"));
        }
        let clash = state
            .batches
            .values()
            .any(|b| b.product_id == batch.product_id && b.batch_number == batch.batch_number);
        if clash {
            return Err(DomainError::duplicate_code(format!(
                "batch {}",
                batch.batch_number
            )));
        }
        state.batches.insert(batch.id, batch);
        Ok(())
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|_| DomainError::validation("registry lock poisoned"))
    }
}

impl Registry for InMemoryRegistry {
    fn product(&self, id: &ProductId) -> Option<Product> {
        self.state.read().ok()?.products.get(id).cloned()
    }

    fn warehouse(&self, id: &WarehouseId) -> Option<Warehouse> {
        self.state.read().ok()?.warehouses.get(id).cloned()
    }

    fn bin(&self, id: &BinId) -> Option<Bin> {
        self.state.read().ok()?.bins.get(id).cloned()
    }

    fn batch(&self, id: &BatchId) -> Option<Batch> {
        self.state.read().ok()?.batches.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_core::EntityId;

    fn product_id() -> ProductId {
        ProductId::new(EntityId::new())
    }

    fn warehouse_id() -> WarehouseId {
        WarehouseId::new(EntityId::new())
    }

    #[test]
    fn duplicate_sku_is_rejected() {
        let registry = InMemoryRegistry::new();
        registry
            .add_product(Product::new(product_id(), "SKU-1", "Widget"))
            .unwrap();
        let err = registry
            .add_product(Product::new(product_id(), "SKU-1", "Other widget"))
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateCode(_)));
    }

    #[test]
    fn duplicate_bin_code_rejected_within_warehouse_only() {
        let registry = InMemoryRegistry::new();
        let wh1 = warehouse_id();
        let wh2 = warehouse_id();
        registry
            .add_warehouse(Warehouse::new(wh1, "WH1", "Main"))
            .unwrap();
        registry
            .add_warehouse(Warehouse::new(wh2, "WH2", "Overflow"))
            .unwrap();

        registry
            .add_bin(Bin::new(BinId::new(EntityId::new()), wh1, "A-01"))
            .unwrap();
        // Same code, different warehouse: fine.
        registry
            .add_bin(Bin::new(BinId::new(EntityId::new()), wh2, "A-01"))
            .unwrap();
        let err = registry
            .add_bin(Bin::new(BinId::new(EntityId::new()), wh1, "A-01"))
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateCode(_)));
    }

    #[test]
    fn negative_stock_policy_defaults_to_disallow() {
        let registry = InMemoryRegistry::new();
        let wh = warehouse_id();
        registry
            .add_warehouse(Warehouse::new(wh, "WH1", "Main").with_negative_stock_allowed())
            .unwrap();

        assert!(registry.allows_negative_stock(&wh));
        assert!(!registry.allows_negative_stock(&warehouse_id()));
    }
}
