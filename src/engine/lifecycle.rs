// src/engine/lifecycle.rs - Order Lifecycle Engine
//! Order state machine enforcement and logistics side effects
//!
//! This module owns the transition contract for orders: which status edges
//! are legal, which logistics fields a payload may carry in each state, and
//! the shipping-distance recomputation that accompanies a warehouse
//! assignment.
//!
//! ## Order State Machine
//!
//! ```text
//!               ┌────────────┐
//!               │ PROCESSING │
//!               └─────┬──────┘
//!            Ship     │     Cancel
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   ┌────────────┐        ┌───────────┐
//!   │ IN_TRANSIT │───────►│ CANCELLED │
//!   └─────┬──────┘ Cancel └───────────┘
//!         │ Deliver
//!         ▼
//!   ┌───────────┐
//!   │ DELIVERED │
//!   └───────────┘
//! ```
//!
//! ## Transition Contract
//!
//! - The actor must hold the order-management capability; the engine fails
//!   fast with `Unauthorized` before touching the store.
//! - While the order is in `PROCESSING` the payload may assign or replace
//!   the source warehouse and set the delivery date. Assigning a warehouse
//!   recomputes the shipping distance as the shortest known route between
//!   the warehouse city and the shipping city; a missing route is surfaced
//!   as an indicator on the projection, never as an error.
//! - From `IN_TRANSIT` onward only the delivery date may change; the
//!   warehouse is immutable once the order has left `PROCESSING`.
//! - A payload without a target status is a "save without status change"
//!   and runs the same validation.
//! - Transitions are serialized per order: a transition fully applies
//!   (state + logistics) or fully fails with the order unchanged.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::core::auth::{ActorContext, Capability, CapabilityMap};
use crate::core::events::OrderEvent;
use crate::core::order::{LogisticsUpdate, Order, OrderProjection, OrderStatus, RouteResolution};
use crate::core::types::OrderId;
use crate::routing::RouteResolver;
use crate::storage::{OrderStore, RecordSource};
use crate::{EngineConfig, EstoreError, EstoreResult};

/// Lifecycle statistics
#[derive(Debug, Default)]
pub struct LifecycleStats {
    /// Status transitions applied
    pub transitions_applied: AtomicU64,
    /// Logistics-only updates applied
    pub logistics_updates: AtomicU64,
    /// Transitions rejected as illegal edges
    pub rejected_transitions: AtomicU64,
    /// Calls rejected for missing capability
    pub unauthorized_attempts: AtomicU64,
}

/// Order lifecycle engine
pub struct LifecycleEngine {
    /// Order persistence
    store: Arc<dyn OrderStore>,
    /// Reference-data lookups (warehouses, cities)
    records: Arc<dyn RecordSource>,
    /// Shortest-route resolution
    resolver: Arc<dyn RouteResolver>,
    /// Department-to-capability mapping
    capabilities: Arc<dyn CapabilityMap>,
    /// Per-order serialization locks
    locks: DashMap<OrderId, Arc<Mutex<()>>>,
    /// Event broadcast channel
    event_tx: broadcast::Sender<OrderEvent>,
    /// Statistics
    stats: LifecycleStats,
}

impl LifecycleEngine {
    /// Create a new lifecycle engine
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn OrderStore>,
        records: Arc<dyn RecordSource>,
        resolver: Arc<dyn RouteResolver>,
        capabilities: Arc<dyn CapabilityMap>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            store,
            records,
            resolver,
            capabilities,
            locks: DashMap::new(),
            event_tx,
            stats: LifecycleStats::default(),
        }
    }

    /// Subscribe to order events
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.event_tx.subscribe()
    }

    /// Lifecycle counters
    pub fn stats(&self) -> &LifecycleStats {
        &self.stats
    }

    /// Apply a status transition and/or logistics update to an order
    ///
    /// `target: Some(status)` attempts the status edge; `target: None` with a
    /// non-empty payload is the logistics-only save. See the module docs for
    /// the full contract. On success returns the updated order projection
    /// with the recomputed route resolution.
    #[instrument(skip(self, logistics, actor), fields(order_id = %order_id, actor = %actor.user_id))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: Option<OrderStatus>,
        logistics: LogisticsUpdate,
        actor: &ActorContext,
    ) -> EstoreResult<OrderProjection> {
        if !self
            .capabilities
            .grants(actor.department, Capability::ManageOrders)
        {
            self.stats
                .unauthorized_attempts
                .fetch_add(1, Ordering::Relaxed);
            return Err(EstoreError::Unauthorized(format!(
                "department {} cannot manage orders",
                actor.department
            )));
        }

        if target.is_none() && logistics.is_empty() {
            return Err(EstoreError::Validation(
                "Nothing to update: no target status and empty logistics payload".to_string(),
            ));
        }

        // Serialize concurrent attempts on the same order: the second of two
        // simultaneous cancels must observe the first one's result.
        let lock = self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut order = self
            .store
            .get_order(&order_id)
            .await?
            .ok_or_else(|| EstoreError::NotFound(format!("Order {order_id}")))?;
        let current = order.status;

        // Validate the status edge before applying anything, so an illegal
        // transition never leaks a partial logistics change.
        if let Some(target) = target {
            if !current.can_transition_to(target) {
                self.stats
                    .rejected_transitions
                    .fetch_add(1, Ordering::Relaxed);
                warn!(%current, %target, "Rejected illegal status transition");
                return Err(EstoreError::InvalidTransition {
                    from: current,
                    to: target,
                });
            }
        } else if !current.accepts_logistics() {
            return Err(EstoreError::Validation(format!(
                "Order in terminal status {current} accepts no logistics updates"
            )));
        }

        self.apply_logistics(&mut order, &logistics).await?;

        if let Some(target) = target {
            order.update_status(target)?;
        } else {
            order.updated_at = Utc::now();
        }

        // Single write: the change lands atomically or not at all
        self.store.update_order(order.clone()).await?;

        let event = match target {
            Some(target) => {
                self.stats
                    .transitions_applied
                    .fetch_add(1, Ordering::Relaxed);
                info!(%current, %target, "Order status transition applied");
                OrderEvent::status_changed(order_id, actor.user_id, current, target)
            }
            None => {
                self.stats.logistics_updates.fetch_add(1, Ordering::Relaxed);
                debug!("Logistics-only update applied");
                OrderEvent::logistics_updated(
                    order_id,
                    actor.user_id,
                    logistics.warehouse_id,
                    logistics.delivery_date,
                )
            }
        };
        let _ = self.event_tx.send(event);

        let route = self.resolve_route(&order).await?;
        Ok(OrderProjection { order, route })
    }

    /// Read-only projection of an order with its route resolution
    pub async fn projection(
        &self,
        order_id: OrderId,
        actor: &ActorContext,
    ) -> EstoreResult<OrderProjection> {
        if !self
            .capabilities
            .grants(actor.department, Capability::ManageOrders)
        {
            return Err(EstoreError::Unauthorized(format!(
                "department {} cannot manage orders",
                actor.department
            )));
        }
        let order = self
            .store
            .get_order(&order_id)
            .await?
            .ok_or_else(|| EstoreError::NotFound(format!("Order {order_id}")))?;
        let route = self.resolve_route(&order).await?;
        Ok(OrderProjection { order, route })
    }

    /// Apply the logistics payload against the order's current state
    async fn apply_logistics(
        &self,
        order: &mut Order,
        logistics: &LogisticsUpdate,
    ) -> EstoreResult<()> {
        if let Some(warehouse_id) = logistics.warehouse_id {
            if order.status == OrderStatus::Processing {
                let warehouse = self
                    .records
                    .warehouse(warehouse_id)
                    .await?
                    .ok_or_else(|| EstoreError::NotFound(format!("Warehouse {warehouse_id}")))?;
                debug!(warehouse = %warehouse.name, "Warehouse assigned");
                order.source_warehouse_id = Some(warehouse_id);
            } else if order.source_warehouse_id == Some(warehouse_id) {
                // Re-sending the current assignment is a no-op
            } else {
                return Err(EstoreError::Validation(format!(
                    "Warehouse cannot be changed once the order has left {}",
                    OrderStatus::Processing
                )));
            }
        }

        if let Some(delivery_date) = logistics.delivery_date {
            order.actual_delivery_date = Some(delivery_date);
        }

        Ok(())
    }

    /// Resolve the shipping route for the order's current warehouse
    ///
    /// Distance is derived, never stored: it is present exactly when a
    /// warehouse is assigned and its city connects to the shipping city
    /// (same city counts as a 0 km route).
    async fn resolve_route(&self, order: &Order) -> EstoreResult<RouteResolution> {
        let Some(warehouse_id) = order.source_warehouse_id else {
            return Ok(RouteResolution::NoWarehouse);
        };
        let Some(warehouse) = self.records.warehouse(warehouse_id).await? else {
            // Warehouse record gone from the registry: nothing to resolve
            warn!(warehouse_id, "Assigned warehouse no longer exists");
            return Ok(RouteResolution::NotFound);
        };
        match self
            .resolver
            .shortest_route(warehouse.city_id, order.shipping_city_id)
        {
            Some(summary) => Ok(RouteResolution::Found {
                distance_km: summary.total_distance_km,
                path: summary.path_label,
            }),
            None => Ok(RouteResolution::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{Department, DepartmentDirectory};
    use crate::core::events::OrderEventKind;
    use crate::core::order::OrderBuilder;
    use crate::core::types::{City, CityRoute, Warehouse};
    use crate::routing::CityGraph;
    use crate::storage::{InMemoryStore, MemoryConfig};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn order_actor() -> ActorContext {
        ActorContext::new(Uuid::new_v4(), Department::OrderManage)
    }

    fn analyst_actor() -> ActorContext {
        ActorContext::new(Uuid::new_v4(), Department::Analyze)
    }

    struct Fixture {
        engine: Arc<LifecycleEngine>,
        store: Arc<InMemoryStore>,
    }

    /// Cities 1 --120km-- 2; city 3 isolated; warehouse 7 in city 1,
    /// warehouse 8 in city 3
    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new(MemoryConfig::default()));
        store.insert_city(City {
            city_id: 1,
            name: "A".to_string(),
        });
        store.insert_city(City {
            city_id: 2,
            name: "B".to_string(),
        });
        store.insert_city(City {
            city_id: 3,
            name: "C".to_string(),
        });
        store.insert_route(CityRoute {
            route_id: 1,
            city_a: 1,
            city_b: 2,
            distance_km: 120.0,
        });
        store.insert_warehouse(Warehouse {
            warehouse_id: 7,
            name: "A-DC".to_string(),
            city_id: 1,
            address: "depot".to_string(),
        });
        store.insert_warehouse(Warehouse {
            warehouse_id: 8,
            name: "C-DC".to_string(),
            city_id: 3,
            address: "depot".to_string(),
        });

        let snapshot = store.analytics_snapshot().await.unwrap();
        let graph = CityGraph::new(&snapshot.cities, &snapshot.routes);
        let engine = Arc::new(LifecycleEngine::new(
            EngineConfig::default(),
            store.clone(),
            store.clone(),
            Arc::new(graph),
            Arc::new(DepartmentDirectory),
        ));
        Fixture { engine, store }
    }

    async fn place_order(fixture: &Fixture, shipping_city: i32) -> OrderId {
        let order = OrderBuilder::new()
            .customer(Uuid::new_v4())
            .shipping_city(shipping_city)
            .shipping_address("12 Main St")
            .item(Uuid::new_v4(), 1, 49.0)
            .build()
            .unwrap();
        let order_id = order.order_id;
        fixture.store.insert_order(order).await.unwrap();
        order_id
    }

    #[tokio::test]
    async fn test_ship_with_warehouse_computes_distance() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let projection = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate {
                    warehouse_id: Some(7),
                    delivery_date: NaiveDate::from_ymd_opt(2025, 9, 1),
                },
                &order_actor(),
            )
            .await
            .unwrap();

        assert_eq!(projection.order.status, OrderStatus::InTransit);
        assert_eq!(projection.order.source_warehouse_id, Some(7));
        assert_eq!(projection.distance_km(), Some(120.0));
        assert!(!projection.route.route_missing());
        assert_eq!(
            projection.order.actual_delivery_date,
            NaiveDate::from_ymd_opt(2025, 9, 1)
        );
    }

    #[tokio::test]
    async fn test_no_route_is_flagged_not_failed() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        // Warehouse 8 sits in isolated city 3: transition succeeds, the
        // missing route is an indicator on the projection
        let projection = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate {
                    warehouse_id: Some(8),
                    delivery_date: None,
                },
                &order_actor(),
            )
            .await
            .unwrap();

        assert_eq!(projection.order.status, OrderStatus::InTransit);
        assert_eq!(projection.distance_km(), None);
        assert!(projection.route.route_missing());
    }

    #[tokio::test]
    async fn test_same_city_distance_is_zero() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 1).await;

        let projection = fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    warehouse_id: Some(7),
                    delivery_date: None,
                },
                &order_actor(),
            )
            .await
            .unwrap();

        assert_eq!(projection.distance_km(), Some(0.0));
        assert!(!projection.route.route_missing());
    }

    #[tokio::test]
    async fn test_transition_without_warehouse_keeps_distance_unknown() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let projection = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &order_actor(),
            )
            .await
            .unwrap();

        assert_eq!(projection.order.status, OrderStatus::InTransit);
        assert_eq!(projection.distance_km(), None);
        assert_eq!(projection.route, RouteResolution::NoWarehouse);
    }

    #[tokio::test]
    async fn test_logistics_only_update_never_changes_status() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let projection = fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    warehouse_id: Some(7),
                    delivery_date: NaiveDate::from_ymd_opt(2025, 9, 2),
                },
                &order_actor(),
            )
            .await
            .unwrap();

        assert_eq!(projection.order.status, OrderStatus::Processing);
        assert_eq!(projection.order.source_warehouse_id, Some(7));
    }

    #[tokio::test]
    async fn test_empty_call_is_rejected() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let err = fixture
            .engine
            .transition(order_id, None, LogisticsUpdate::default(), &order_actor())
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_warehouse_immutable_after_processing() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate {
                    warehouse_id: Some(7),
                    delivery_date: None,
                },
                &actor,
            )
            .await
            .unwrap();

        // Changing the warehouse in IN_TRANSIT fails and leaves the order intact
        let err = fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    warehouse_id: Some(8),
                    delivery_date: None,
                },
                &actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::Validation(_)));
        let order = fixture.store.get_order(&order_id).await.unwrap().unwrap();
        assert_eq!(order.source_warehouse_id, Some(7));

        // Re-sending the current warehouse id with a new date is fine
        let projection = fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    warehouse_id: Some(7),
                    delivery_date: NaiveDate::from_ymd_opt(2025, 9, 5),
                },
                &actor,
            )
            .await
            .unwrap();
        assert_eq!(
            projection.order.actual_delivery_date,
            NaiveDate::from_ymd_opt(2025, 9, 5)
        );
        assert_eq!(projection.order.status, OrderStatus::InTransit);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_everything() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::Cancelled),
                LogisticsUpdate::default(),
                &actor,
            )
            .await
            .unwrap();

        for target in OrderStatus::all() {
            let err = fixture
                .engine
                .transition(order_id, Some(target), LogisticsUpdate::default(), &actor)
                .await
                .unwrap_err();
            match err {
                EstoreError::InvalidTransition { from, to } => {
                    assert_eq!(from, OrderStatus::Cancelled);
                    assert_eq!(to, target);
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }

        // Logistics-only saves are refused too
        let err = fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    delivery_date: NaiveDate::from_ymd_opt(2025, 9, 9),
                    warehouse_id: None,
                },
                &actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delivered_without_warehouse_is_allowed() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &actor,
            )
            .await
            .unwrap();
        let projection = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::Delivered),
                LogisticsUpdate::default(),
                &actor,
            )
            .await
            .unwrap();
        assert_eq!(projection.order.status, OrderStatus::Delivered);
        assert!(!projection.order.has_warehouse());
    }

    #[tokio::test]
    async fn test_unauthorized_department_fails_fast() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let err = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &analyst_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::Unauthorized(_)));
        assert_eq!(
            fixture
                .engine
                .stats()
                .unauthorized_attempts
                .load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let fixture = fixture().await;
        let err = fixture
            .engine
            .transition(
                Uuid::new_v4(),
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &order_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_warehouse_is_not_found_and_order_unchanged() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;

        let err = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate {
                    warehouse_id: Some(999),
                    delivery_date: None,
                },
                &order_actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstoreError::NotFound(_)));

        let order = fixture.store.get_order(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.source_warehouse_id.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_cancels_serialize() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        let first = {
            let engine = fixture.engine.clone();
            tokio::spawn(async move {
                engine
                    .transition(
                        order_id,
                        Some(OrderStatus::Cancelled),
                        LogisticsUpdate::default(),
                        &actor,
                    )
                    .await
            })
        };
        let second = {
            let engine = fixture.engine.clone();
            tokio::spawn(async move {
                engine
                    .transition(
                        order_id,
                        Some(OrderStatus::Cancelled),
                        LogisticsUpdate::default(),
                        &actor,
                    )
                    .await
            })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent cancel may win");
        let failure = results.iter().find(|result| result.is_err()).unwrap();
        assert!(matches!(
            failure.as_ref().unwrap_err(),
            EstoreError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled,
            }
        ));
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();
        let mut events = fixture.engine.subscribe();

        fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &actor,
            )
            .await
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.order_id, order_id);
        assert!(matches!(
            event.kind,
            OrderEventKind::StatusChanged {
                from: OrderStatus::Processing,
                to: OrderStatus::InTransit,
            }
        ));

        fixture
            .engine
            .transition(
                order_id,
                None,
                LogisticsUpdate {
                    warehouse_id: None,
                    delivery_date: NaiveDate::from_ymd_opt(2025, 10, 1),
                },
                &actor,
            )
            .await
            .unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, OrderEventKind::LogisticsUpdated { .. }));
    }

    #[tokio::test]
    async fn test_projection_read_only() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        let projection = fixture.engine.projection(order_id, &actor).await.unwrap();
        assert_eq!(projection.route, RouteResolution::NoWarehouse);

        assert!(matches!(
            fixture.engine.projection(order_id, &analyst_actor()).await,
            Err(EstoreError::Unauthorized(_))
        ));
        assert!(matches!(
            fixture.engine.projection(Uuid::new_v4(), &actor).await,
            Err(EstoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let fixture = fixture().await;
        let order_id = place_order(&fixture, 2).await;
        let actor = order_actor();

        fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &actor,
            )
            .await
            .unwrap();
        let _ = fixture
            .engine
            .transition(
                order_id,
                Some(OrderStatus::InTransit),
                LogisticsUpdate::default(),
                &actor,
            )
            .await;

        let stats = fixture.engine.stats();
        assert_eq!(stats.transitions_applied.load(Ordering::Relaxed), 1);
        assert_eq!(stats.rejected_transitions.load(Ordering::Relaxed), 1);
    }
}
