// src/core/order.rs - Order Domain Models and Business Logic
//! Core order domain models, validation, and business logic
//!
//! This module contains the order types and the status state machine the
//! lifecycle engine enforces. Orders are created at checkout, mutated only
//! through status transitions and logistics updates, and never deleted.
//!
//! # Order Lifecycle
//!
//! ```text
//!               ┌────────────┐
//!               │ PROCESSING │ (initial)
//!               └─────┬──────┘
//!            Ship     │     Cancel
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   ┌────────────┐        ┌───────────┐
//!   │ IN_TRANSIT │───────►│ CANCELLED │ (terminal)
//!   └─────┬──────┘ Cancel └───────────┘
//!         │ Deliver
//!         ▼
//!   ┌───────────┐
//!   │ DELIVERED │ (terminal)
//!   └───────────┘
//! ```

use crate::{utils, EstoreError, EstoreResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

// Re-export common types
pub use crate::core::types::{CityId, OrderId, Price, ProductId, Timestamp, UserId, WarehouseId};

/// Order status representing the current state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, being prepared for shipment
    Processing,
    /// Order handed to the carrier
    InTransit,
    /// Order delivered to the customer
    Delivered,
    /// Order cancelled
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "PROCESSING"),
            Self::InTransit => write!(f, "IN_TRANSIT"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = EstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROCESSING" => Ok(Self::Processing),
            "IN_TRANSIT" | "IN-TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(EstoreError::Validation(format!("Invalid order status: {s}"))),
        }
    }
}

impl OrderStatus {
    /// All statuses in their dictionary order
    pub fn all() -> [Self; 4] {
        [
            Self::Processing,
            Self::InTransit,
            Self::Delivered,
            Self::Cancelled,
        ]
    }

    /// Check if the order is in a final state (accepts no further transitions)
    pub fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Check if the order can be cancelled from this state
    pub fn can_be_cancelled(self) -> bool {
        matches!(self, Self::Processing | Self::InTransit)
    }

    /// Check if logistics fields may still be updated in this state
    pub fn accepts_logistics(self) -> bool {
        matches!(self, Self::Processing | Self::InTransit)
    }

    /// Get the next valid states from the current state
    pub fn valid_transitions(self) -> Vec<OrderStatus> {
        match self {
            Self::Processing => vec![Self::InTransit, Self::Cancelled],
            Self::InTransit => vec![Self::Delivered, Self::Cancelled],
            // Terminal states have out-degree zero
            Self::Delivered | Self::Cancelled => vec![],
        }
    }

    /// Check if transition from this state to another is valid
    pub fn can_transition_to(self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// A purchased line item, immutable after checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product purchased
    pub product_id: ProductId,
    /// Units purchased
    pub quantity: u32,
    /// Unit price snapshot at purchase time
    pub unit_price: Price,
}

impl OrderItem {
    /// Line value (unit price x quantity)
    pub fn line_value(&self) -> Price {
        utils::line_value(self.unit_price, self.quantity)
    }

    /// Validate the item against business rules
    pub fn validate(&self) -> EstoreResult<()> {
        utils::validate_quantity(self.quantity)?;
        utils::validate_unit_price(self.unit_price)?;
        Ok(())
    }
}

/// Main order structure containing all order details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique system order ID
    pub order_id: OrderId,
    /// Customer who placed the order
    pub customer_id: UserId,
    /// Current order status
    pub status: OrderStatus,
    /// Total amount charged
    pub total_amount: Price,
    /// When the order was placed
    pub order_date: Timestamp,
    /// Destination city
    pub shipping_city_id: CityId,
    /// Free-text shipping address
    pub shipping_address: String,
    /// Chosen delivery method, if any
    pub delivery_method_id: Option<i32>,
    /// Chosen payment method, if any
    pub payment_method_id: Option<i32>,
    /// Warehouse the order ships from; unset until assigned
    pub source_warehouse_id: Option<WarehouseId>,
    /// Actual or planned delivery date; unset until known
    pub actual_delivery_date: Option<NaiveDate>,
    /// Purchased items
    pub items: Vec<OrderItem>,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

impl Order {
    /// Create a new order in the initial `PROCESSING` state
    pub fn new(
        customer_id: UserId,
        shipping_city_id: CityId,
        shipping_address: String,
        items: Vec<OrderItem>,
    ) -> Self {
        let now = Utc::now();
        let total_amount = items.iter().map(OrderItem::line_value).sum();
        Self {
            order_id: OrderId::new_v4(),
            customer_id,
            status: OrderStatus::Processing,
            total_amount,
            order_date: now,
            shipping_city_id,
            shipping_address,
            delivery_method_id: None,
            payment_method_id: None,
            source_warehouse_id: None,
            actual_delivery_date: None,
            items,
            updated_at: now,
        }
    }

    /// Validate the order against business rules
    pub fn validate(&self) -> EstoreResult<()> {
        if self.shipping_address.is_empty() {
            return Err(EstoreError::Validation(
                "Shipping address is required".to_string(),
            ));
        }
        if self.shipping_address.len() > crate::constants::MAX_ADDRESS_LENGTH {
            return Err(EstoreError::Validation(
                "Shipping address is too long".to_string(),
            ));
        }
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }

    /// Sum of line values across all items
    pub fn items_subtotal(&self) -> Price {
        self.items.iter().map(OrderItem::line_value).sum()
    }

    /// Update the order status, enforcing the state machine
    ///
    /// Fails with [`EstoreError::InvalidTransition`] naming both states when
    /// the edge is not in the lifecycle graph; terminal states reject every
    /// target, including themselves.
    pub fn update_status(&mut self, new_status: OrderStatus) -> EstoreResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(EstoreError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a source warehouse has been assigned
    pub fn has_warehouse(&self) -> bool {
        self.source_warehouse_id.is_some()
    }

    /// Calendar month (1..=12) the order was placed in
    pub fn order_month(&self) -> u32 {
        use chrono::Datelike;
        self.order_date.month()
    }
}

/// Logistics payload attached to a status transition or saved on its own
///
/// All fields optional; an empty payload with a target status is a pure
/// status change, a non-empty payload without a target status is a
/// "save without status change".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogisticsUpdate {
    /// Warehouse to ship from
    pub warehouse_id: Option<WarehouseId>,
    /// Planned or actual delivery date
    pub delivery_date: Option<NaiveDate>,
}

impl LogisticsUpdate {
    /// Whether the payload carries no changes
    pub fn is_empty(&self) -> bool {
        self.warehouse_id.is_none() && self.delivery_date.is_none()
    }
}

/// Outcome of resolving the shipping route for an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteResolution {
    /// No warehouse assigned yet, so there is nothing to resolve
    NoWarehouse,
    /// A route exists between the warehouse city and the shipping city
    Found {
        /// Shortest known distance in kilometers (0 for same-city delivery)
        distance_km: f64,
        /// Human-readable path description (city names joined by arrows)
        path: String,
    },
    /// Warehouse assigned but the cities are not connected in the route graph
    NotFound,
}

impl RouteResolution {
    /// Resolved distance, if any
    pub fn distance_km(&self) -> Option<f64> {
        match self {
            Self::Found { distance_km, .. } => Some(*distance_km),
            _ => None,
        }
    }

    /// Whether a warehouse was assigned and no route could be found
    pub fn route_missing(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Updated order view returned from a successful transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProjection {
    /// The order after the change was applied
    pub order: Order,
    /// Shipping-route resolution for display
    pub route: RouteResolution,
}

impl OrderProjection {
    /// Resolved shipping distance, if any
    pub fn distance_km(&self) -> Option<f64> {
        self.route.distance_km()
    }
}

/// Builder pattern for creating orders
#[derive(Debug, Clone, Default)]
pub struct OrderBuilder {
    customer_id: Option<UserId>,
    shipping_city_id: Option<CityId>,
    shipping_address: Option<String>,
    delivery_method_id: Option<i32>,
    payment_method_id: Option<i32>,
    order_date: Option<Timestamp>,
    items: Vec<OrderItem>,
}

impl OrderBuilder {
    /// Create a new order builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the customer
    pub fn customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Set the shipping city
    pub fn shipping_city(mut self, city_id: CityId) -> Self {
        self.shipping_city_id = Some(city_id);
        self
    }

    /// Set the shipping address
    pub fn shipping_address<S: Into<String>>(mut self, address: S) -> Self {
        self.shipping_address = Some(address.into());
        self
    }

    /// Set the delivery method
    pub fn delivery_method(mut self, method_id: i32) -> Self {
        self.delivery_method_id = Some(method_id);
        self
    }

    /// Set the payment method
    pub fn payment_method(mut self, method_id: i32) -> Self {
        self.payment_method_id = Some(method_id);
        self
    }

    /// Backdate the order (the order date defaults to now)
    pub fn order_date(mut self, date: Timestamp) -> Self {
        self.order_date = Some(date);
        self
    }

    /// Add a line item
    pub fn item(mut self, product_id: ProductId, quantity: u32, unit_price: Price) -> Self {
        self.items.push(OrderItem {
            product_id,
            quantity,
            unit_price,
        });
        self
    }

    /// Build and validate the order
    pub fn build(self) -> EstoreResult<Order> {
        let customer_id = self
            .customer_id
            .ok_or_else(|| EstoreError::Validation("Customer is required".to_string()))?;
        let shipping_city_id = self
            .shipping_city_id
            .ok_or_else(|| EstoreError::Validation("Shipping city is required".to_string()))?;
        let shipping_address = self
            .shipping_address
            .ok_or_else(|| EstoreError::Validation("Shipping address is required".to_string()))?;
        if self.items.is_empty() {
            return Err(EstoreError::Validation(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut order = Order::new(customer_id, shipping_city_id, shipping_address, self.items);
        order.delivery_method_id = self.delivery_method_id;
        order.payment_method_id = self.payment_method_id;
        if let Some(date) = self.order_date {
            order.order_date = date;
        }

        order.validate()?;
        Ok(order)
    }
}
