//! `stockforge-registry`: location/identity reference data.
//!
//! Pure reference data: products, warehouses, bins, batches. Supplies
//! valid keys and policy facts to the ledger and workflow crates; carries
//! no consistency obligation beyond business-code uniqueness.

pub mod batch;
pub mod product;
pub mod registry;
pub mod warehouse;

pub use batch::{Batch, BatchId};
pub use product::{Product, ProductId};
pub use registry::{InMemoryRegistry, Registry};
pub use warehouse::{Bin, BinId, Warehouse, WarehouseId};
