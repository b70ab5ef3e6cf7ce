// src/core/events.rs - Event System
//! Events emitted by the order lifecycle engine
//!
//! Every applied transition or logistics update produces an [`OrderEvent`]
//! on the engine's broadcast channel, enabling audit trails and live
//! console views without polling.

use crate::core::order::OrderStatus;
use crate::core::types::{OrderId, Timestamp, UserId, WarehouseId};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEventKind {
    /// The order moved to a new status
    StatusChanged {
        /// Status before the transition
        from: OrderStatus,
        /// Status after the transition
        to: OrderStatus,
    },
    /// Logistics fields changed without a status change
    LogisticsUpdated {
        /// Warehouse assigned by this update, if any
        warehouse_id: Option<WarehouseId>,
        /// Delivery date set by this update, if any
        delivery_date: Option<NaiveDate>,
    },
}

/// An order lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event ID
    pub id: Uuid,
    /// Order the event concerns
    pub order_id: OrderId,
    /// Admin who triggered the change
    pub actor_id: UserId,
    /// When the event was recorded
    pub timestamp: Timestamp,
    /// What happened
    pub kind: OrderEventKind,
}

impl OrderEvent {
    /// Event for an applied status transition
    pub fn status_changed(
        order_id: OrderId,
        actor_id: UserId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            actor_id,
            timestamp: Utc::now(),
            kind: OrderEventKind::StatusChanged { from, to },
        }
    }

    /// Event for a logistics-only update
    pub fn logistics_updated(
        order_id: OrderId,
        actor_id: UserId,
        warehouse_id: Option<WarehouseId>,
        delivery_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            actor_id,
            timestamp: Utc::now(),
            kind: OrderEventKind::LogisticsUpdated {
                warehouse_id,
                delivery_date,
            },
        }
    }

    /// Whether the event records a status change
    pub fn is_status_change(&self) -> bool {
        matches!(self.kind, OrderEventKind::StatusChanged { .. })
    }
}
