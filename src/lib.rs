// src/lib.rs - E-Store Operations Core Library Root
//! # E-Store Core - Order Lifecycle & Analytics Engines
//!
//! The operations core behind an e-commerce console: a customer-facing
//! storefront and an administrative console share this crate for the two
//! pieces with real business logic:
//!
//! - **Order Lifecycle Engine**: the order-status state machine, role-gated
//!   transitions, and the logistics side effects that accompany them
//!   (warehouse assignment, delivery date, shipping-distance computation)
//! - **Analytics Aggregation Engine**: multi-dimensional aggregation over
//!   orders, users, and products by independent facets (gender, age band,
//!   calendar month, category, brand, status), producing chart-ready
//!   labeled buckets
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐        ┌──────────────────────┐
//! │   REST API      │        │  Library Consumers   │
//! │   (axum)        │        │  (admin console, …)  │
//! └────────┬────────┘        └──────────┬───────────┘
//!          │                            │
//!          └──────────────┬─────────────┘
//!                         │
//!          ┌──────────────▼──────────────┐
//!          │         OpsEngine           │
//!          │  (lifecycle + analytics)    │
//!          └──────────────┬──────────────┘
//!                         │
//!       ┌─────────────────┼──────────────────┐
//!       │                 │                  │
//! ┌─────▼──────┐   ┌──────▼───────┐   ┌──────▼───────┐
//! │  Routing   │   │   Storage    │   │ Capabilities │
//! │ (city graph│   │ (order store │   │ (department  │
//! │  + cache)  │   │  + records)  │   │   mapping)   │
//! └────────────┘   └──────────────┘   └──────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

// Core modules
pub mod core;
pub mod engine;
pub mod routing;
pub mod storage;
pub mod transport;

// Re-export core types for convenience
pub use crate::core::{
    auth::{ActorContext, Capability, CapabilityMap, Department, DepartmentDirectory},
    events::OrderEvent,
    order::{LogisticsUpdate, Order, OrderBuilder, OrderItem, OrderProjection, OrderStatus},
    types::{AgeBand, Gender},
};

pub use crate::engine::{
    analytics::{Bucket, FacetFilter, Scope},
    lifecycle::LifecycleEngine,
    EngineConfig, OpsEngine,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Route-resolution configuration
    pub routing: RoutingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Enable permissive CORS (development consoles run on another origin)
    pub enable_cors: bool,
    /// Seed the in-memory store with demo records on startup
    pub seed_demo: bool,
}

/// Route-resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Number of resolved city-pair distances kept in the LRU cache
    pub route_cache_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                request_timeout: 30,
                enable_cors: true,
                seed_demo: false,
            },
            routing: RoutingConfig {
                route_cache_size: 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

/// Error types used throughout the library
///
/// Every failure the engines can produce is one of these variants; callers
/// receive them as values and decide on user-visible messaging themselves.
#[derive(Debug, thiserror::Error)]
pub enum EstoreError {
    /// Actor lacks the capability required for order management
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Actor lacks the capability required for the requested analytics scope
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal edge in the order-status state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status the order is currently in
        from: crate::core::order::OrderStatus,
        /// Status the caller attempted to move to
        to: crate::core::order::OrderStatus,
    },

    /// Malformed input (bad filter, illegal payload field)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<storage::StorageError> for EstoreError {
    fn from(err: storage::StorageError) -> Self {
        match err {
            storage::StorageError::OrderNotFound(id) => Self::NotFound(format!("Order {id}")),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Result type used throughout the library
pub type EstoreResult<T> = Result<T, EstoreError>;

/// Prelude module for convenient imports
pub mod prelude {
    //! Re-exports the most commonly used types and traits

    pub use crate::{
        core::{
            auth::{ActorContext, Capability, CapabilityMap, Department, DepartmentDirectory},
            order::{LogisticsUpdate, Order, OrderBuilder, OrderItem, OrderProjection, OrderStatus},
            types::{AgeBand, Gender},
        },
        engine::{
            analytics::{Bucket, FacetFilter, Scope},
            lifecycle::LifecycleEngine,
            EngineConfig, OpsEngine,
        },
        routing::{CityGraph, RouteResolver, RouteSummary},
        storage::{InMemoryStore, OrderStore, RecordSource},
        EstoreError, EstoreResult,
    };
}

/// Utility functions
pub mod utils {
    //! Utility functions for common operations

    use crate::{EstoreError, EstoreResult};

    /// Validate a calendar month number (1..=12)
    pub fn validate_month(month: u32) -> EstoreResult<()> {
        if !(1..=12).contains(&month) {
            return Err(EstoreError::Validation(format!(
                "Month must be between 1 and 12, got {month}"
            )));
        }
        Ok(())
    }

    /// Validate an order-item quantity
    pub fn validate_quantity(quantity: u32) -> EstoreResult<()> {
        if quantity == 0 {
            return Err(EstoreError::Validation(
                "Quantity must be positive".to_string(),
            ));
        }
        if quantity > crate::constants::MAX_ITEM_QUANTITY {
            return Err(EstoreError::Validation(format!(
                "Quantity {quantity} exceeds the maximum of {}",
                crate::constants::MAX_ITEM_QUANTITY
            )));
        }
        Ok(())
    }

    /// Validate a unit price
    pub fn validate_unit_price(price: f64) -> EstoreResult<()> {
        if price < 0.0 || price.is_infinite() || price.is_nan() {
            return Err(EstoreError::Validation(format!(
                "Invalid unit price: {price}"
            )));
        }
        Ok(())
    }

    /// Line value of an order item (unit price x quantity)
    pub fn line_value(unit_price: f64, quantity: u32) -> f64 {
        unit_price * f64::from(quantity)
    }

    /// Share of a value against a total, in percent
    pub fn calculate_percentage(value: f64, total: f64) -> f64 {
        if total == 0.0 {
            0.0
        } else {
            (value / total) * 100.0
        }
    }
}

/// Constants used throughout the library
pub mod constants {
    //! System-wide constants

    /// Default request timeout (seconds)
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

    /// Maximum shipping-address length accepted at the boundary
    pub const MAX_ADDRESS_LENGTH: usize = 500;

    /// Maximum order-item quantity accepted at the boundary
    pub const MAX_ITEM_QUANTITY: u32 = 10_000;
}
