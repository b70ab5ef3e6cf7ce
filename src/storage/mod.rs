// src/storage/mod.rs - Storage Traits and Errors
//! # Storage Layer
//!
//! The engines never talk to a concrete backend: the lifecycle engine works
//! against an [`OrderStore`] and both engines read reference data through a
//! [`RecordSource`]. The bundled [`InMemoryStore`] implements both over
//! lock-free maps; a deployment backed by a remote database implements the
//! same traits at its boundary.

pub mod memory;

pub use memory::{InMemoryStore, MemoryConfig};

use async_trait::async_trait;

use crate::core::order::{Order, OrderStatus};
use crate::core::types::{City, CityId, OrderId, UserId, Warehouse, WarehouseId};
use crate::engine::analytics::AnalyticsSnapshot;

/// Errors produced by storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Order does not exist
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order already exists
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// Store is at capacity
    #[error("Storage capacity exceeded")]
    CapacityExceeded,

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Persistent access to orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order
    async fn insert_order(&self, order: Order) -> Result<(), StorageError>;

    /// Fetch an order by id
    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// Replace an existing order
    async fn update_order(&self, order: Order) -> Result<(), StorageError>;

    /// All orders placed by a customer
    async fn orders_by_customer(&self, customer_id: &UserId) -> Result<Vec<Order>, StorageError>;

    /// All orders in the given status
    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StorageError>;

    /// Every stored order
    async fn all_orders(&self) -> Result<Vec<Order>, StorageError>;
}

/// Read-only access to reference records and the analytics record set
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Look up a warehouse
    async fn warehouse(&self, warehouse_id: WarehouseId) -> Result<Option<Warehouse>, StorageError>;

    /// Look up a city
    async fn city(&self, city_id: CityId) -> Result<Option<City>, StorageError>;

    /// A point-in-time copy of every record the analytics engine reads
    ///
    /// Two snapshots taken moments apart may differ; callers wanting a
    /// consistent dashboard take one snapshot and compute every view from it.
    async fn analytics_snapshot(&self) -> Result<AnalyticsSnapshot, StorageError>;
}
