// src/core/mod.rs - Core Module Declaration
//! Core business domain models and types
//!
//! This module contains the fundamental types and business logic for the
//! e-store operations core: the order model and its status state machine,
//! reference-data records, capability mapping, and lifecycle events.

pub mod auth;
pub mod events;
pub mod order;
pub mod types;

// Re-export commonly used types for convenience
pub use auth::{ActorContext, Capability, CapabilityMap, Department, DepartmentDirectory};
pub use events::{OrderEvent, OrderEventKind};
pub use order::{
    LogisticsUpdate, Order, OrderBuilder, OrderItem, OrderProjection, OrderStatus, RouteResolution,
};
pub use types::{
    AgeBand, Brand, BrandId, CategoryId, City, CityId, CityRoute, Customer, Gender, LoginRecord,
    OrderId, Price, ProductCategory, ProductId, ProductRecord, RouteId, Timestamp, UserId,
    Warehouse, WarehouseId,
};
