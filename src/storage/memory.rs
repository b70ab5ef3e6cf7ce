// src/storage/memory.rs - In-Memory Record Store
//! # In-Memory Storage Backend
//!
//! Lock-free, concurrent in-memory store using DashMap: the primary order
//! map plus customer and status secondary indexes, alongside the reference
//! registries (cities, routes, warehouses, categories, brands, products,
//! customers, login log) the analytics engine snapshots.
//!
//! Backing record set for tests, the demo server, and any deployment small
//! enough to run without an external database.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::core::order::{Order, OrderBuilder, OrderStatus};
use crate::core::types::{
    Brand, BrandId, CategoryId, City, CityId, CityRoute, Customer, Gender, LoginRecord, OrderId,
    ProductCategory, ProductId, ProductRecord, UserId, Warehouse, WarehouseId,
};
use crate::engine::analytics::AnalyticsSnapshot;

use super::{OrderStore, RecordSource, StorageError};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of orders to keep in memory
    pub max_orders: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_orders: 1_000_000,
        }
    }
}

/// Operation counters for the store
#[derive(Debug, Default)]
pub struct MemoryStats {
    /// Order reads served
    pub reads: AtomicU64,
    /// Orders inserted
    pub writes: AtomicU64,
    /// Orders updated
    pub updates: AtomicU64,
    /// Analytics snapshots taken
    pub snapshots: AtomicU64,
}

/// In-memory implementation of [`OrderStore`] and [`RecordSource`]
pub struct InMemoryStore {
    /// Primary storage - order ID to Order mapping
    orders: DashMap<OrderId, Order>,

    /// Secondary indexes for fast queries
    customer_index: DashMap<UserId, DashSet<OrderId>>,
    status_index: DashMap<OrderStatus, DashSet<OrderId>>,

    /// Reference registries
    cities: DashMap<CityId, City>,
    routes: RwLock<Vec<CityRoute>>,
    warehouses: DashMap<WarehouseId, Warehouse>,
    categories: DashMap<CategoryId, ProductCategory>,
    brands: DashMap<BrandId, Brand>,
    products: DashMap<ProductId, ProductRecord>,
    customers: DashMap<UserId, Customer>,
    logins: RwLock<Vec<LoginRecord>>,

    /// Configuration
    config: MemoryConfig,

    /// Statistics
    stats: MemoryStats,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new(config: MemoryConfig) -> Self {
        info!(max_orders = config.max_orders, "Initializing in-memory store");
        Self {
            orders: DashMap::new(),
            customer_index: DashMap::new(),
            status_index: DashMap::new(),
            cities: DashMap::new(),
            routes: RwLock::new(Vec::new()),
            warehouses: DashMap::new(),
            categories: DashMap::new(),
            brands: DashMap::new(),
            products: DashMap::new(),
            customers: DashMap::new(),
            logins: RwLock::new(Vec::new()),
            config,
            stats: MemoryStats::default(),
        }
    }

    /// Register a city
    pub fn insert_city(&self, city: City) {
        self.cities.insert(city.city_id, city);
    }

    /// Register a route between two cities
    pub fn insert_route(&self, route: CityRoute) {
        self.routes.write().push(route);
    }

    /// Register a warehouse
    pub fn insert_warehouse(&self, warehouse: Warehouse) {
        self.warehouses.insert(warehouse.warehouse_id, warehouse);
    }

    /// Register a product category
    pub fn insert_category(&self, category: ProductCategory) {
        self.categories.insert(category.category_id, category);
    }

    /// Register a brand
    pub fn insert_brand(&self, brand: Brand) {
        self.brands.insert(brand.brand_id, brand);
    }

    /// Register a product
    pub fn insert_product(&self, product: ProductRecord) {
        self.products.insert(product.product_id, product);
    }

    /// Register a customer profile
    pub fn insert_customer(&self, customer: Customer) {
        self.customers.insert(customer.user_id, customer);
    }

    /// Append a login audit record
    pub fn record_login(&self, login: LoginRecord) {
        self.logins.write().push(login);
    }

    /// Operation counters
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Update secondary indexes for an order
    fn update_indexes(&self, order: &Order, previous_status: Option<OrderStatus>) {
        self.customer_index
            .entry(order.customer_id)
            .or_default()
            .insert(order.order_id);

        if let Some(previous) = previous_status {
            if previous != order.status {
                if let Some(previous_set) = self.status_index.get(&previous) {
                    previous_set.remove(&order.order_id);
                }
            }
        }
        self.status_index
            .entry(order.status)
            .or_default()
            .insert(order.order_id);
    }

    /// Check if storage is at capacity
    fn check_capacity(&self) -> Result<(), StorageError> {
        if self.orders.len() >= self.config.max_orders {
            return Err(StorageError::CapacityExceeded);
        }
        Ok(())
    }

    fn insert_order_inner(&self, order: Order) -> Result<(), StorageError> {
        self.check_capacity()?;
        if self.orders.contains_key(&order.order_id) {
            return Err(StorageError::DuplicateOrder(order.order_id));
        }

        self.update_indexes(&order, None);
        self.orders.insert(order.order_id, order);
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn collect_ids(&self, ids: Option<&DashSet<OrderId>>) -> Vec<Order> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        let mut orders: Vec<Order> = ids
            .iter()
            .filter_map(|id| self.orders.get(id.key()).map(|entry| entry.value().clone()))
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn insert_order(&self, order: Order) -> Result<(), StorageError> {
        self.insert_order_inner(order)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.orders.get(order_id).map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn update_order(&self, order: Order) -> Result<(), StorageError> {
        let previous_status = self
            .orders
            .get(&order.order_id)
            .map(|entry| entry.status)
            .ok_or(StorageError::OrderNotFound(order.order_id))?;

        self.update_indexes(&order, Some(previous_status));
        self.orders.insert(order.order_id, order);
        self.stats.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn orders_by_customer(&self, customer_id: &UserId) -> Result<Vec<Order>, StorageError> {
        Ok(self.collect_ids(self.customer_index.get(customer_id).as_deref()))
    }

    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StorageError> {
        Ok(self.collect_ids(self.status_index.get(&status).as_deref()))
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StorageError> {
        let mut orders: Vec<Order> = self.orders.iter().map(|entry| entry.value().clone()).collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }
}

#[async_trait]
impl RecordSource for InMemoryStore {
    async fn warehouse(&self, warehouse_id: WarehouseId) -> Result<Option<Warehouse>, StorageError> {
        Ok(self.warehouses.get(&warehouse_id).map(|entry| entry.value().clone()))
    }

    async fn city(&self, city_id: CityId) -> Result<Option<City>, StorageError> {
        Ok(self.cities.get(&city_id).map(|entry| entry.value().clone()))
    }

    async fn analytics_snapshot(&self) -> Result<AnalyticsSnapshot, StorageError> {
        self.stats.snapshots.fetch_add(1, Ordering::Relaxed);
        let snapshot = AnalyticsSnapshot {
            taken_at: Utc::now(),
            orders: self.orders.iter().map(|entry| entry.value().clone()).collect(),
            customers: self.customers.iter().map(|entry| entry.value().clone()).collect(),
            products: self.products.iter().map(|entry| entry.value().clone()).collect(),
            categories: self.categories.iter().map(|entry| entry.value().clone()).collect(),
            brands: self.brands.iter().map(|entry| entry.value().clone()).collect(),
            cities: self.cities.iter().map(|entry| entry.value().clone()).collect(),
            routes: self.routes.read().clone(),
            warehouses: self.warehouses.iter().map(|entry| entry.value().clone()).collect(),
            logins: self.logins.read().clone(),
        };
        debug!(
            orders = snapshot.orders.len(),
            customers = snapshot.customers.len(),
            "Analytics snapshot taken"
        );
        Ok(snapshot)
    }
}

/// Deterministic id helpers for the demo seed
fn demo_product(n: u128) -> ProductId {
    Uuid::from_u128(0x5EED_0000_0000_0000_0000_0000_0000_0000 + n)
}

fn demo_user(n: u128) -> UserId {
    Uuid::from_u128(0xCAFE_0000_0000_0000_0000_0000_0000_0000 + n)
}

/// Seed the store with a small deterministic demo data set
///
/// Three connected cities plus one isolated city, two warehouses, a small
/// catalog, four customers, and a spread of orders across every status and
/// the last few months. Used by the demo server and integration-style tests.
pub fn seed_demo(store: &InMemoryStore) {
    for (id, name) in [(1, "Riverton"), (2, "Midvale"), (3, "Eastport"), (4, "Farholm")] {
        store.insert_city(City {
            city_id: id,
            name: name.to_string(),
        });
    }
    store.insert_route(CityRoute {
        route_id: 1,
        city_a: 1,
        city_b: 2,
        distance_km: 100.0,
    });
    store.insert_route(CityRoute {
        route_id: 2,
        city_a: 2,
        city_b: 3,
        distance_km: 30.0,
    });
    store.insert_route(CityRoute {
        route_id: 3,
        city_a: 1,
        city_b: 3,
        distance_km: 200.0,
    });

    store.insert_warehouse(Warehouse {
        warehouse_id: 1,
        name: "Riverton DC".to_string(),
        city_id: 1,
        address: "1 Depot Rd".to_string(),
    });
    store.insert_warehouse(Warehouse {
        warehouse_id: 2,
        name: "Eastport DC".to_string(),
        city_id: 3,
        address: "9 Harbor Way".to_string(),
    });

    for (id, name) in [(1, "Audio"), (2, "Wearables"), (3, "Home")] {
        store.insert_category(ProductCategory {
            category_id: id,
            name: name.to_string(),
        });
    }
    for (id, name) in [(1, "Voltex"), (2, "Nimbus")] {
        store.insert_brand(Brand {
            brand_id: id,
            name: name.to_string(),
        });
    }

    let catalog: [(u128, &str, CategoryId, BrandId, f64); 5] = [
        (1, "Voltex Buds", 1, 1, 79.0),
        (2, "Voltex Soundbar", 1, 1, 449.0),
        (3, "Nimbus Watch", 2, 2, 1299.0),
        (4, "Nimbus Band", 2, 2, 99.0),
        (5, "Voltex Lamp", 3, 1, 39.0),
    ];
    for (n, name, category_id, brand_id, price) in catalog {
        store.insert_product(ProductRecord {
            product_id: demo_product(n),
            name: name.to_string(),
            category_id,
            brand_id,
            price,
        });
    }

    let now = Utc::now();
    let customers: [(u128, &str, Option<Gender>, Option<(i32, u32, u32)>, Option<CityId>); 4] = [
        (1, "ada@example.com", Some(Gender::Female), Some((1992, 3, 10)), Some(1)),
        (2, "ben@example.com", Some(Gender::Male), Some((1975, 11, 2)), Some(2)),
        (3, "cleo@example.com", Some(Gender::Female), Some((2003, 7, 21)), Some(3)),
        (4, "dee@example.com", Some(Gender::NotStated), None, None),
    ];
    for (n, email, gender, dob, city_id) in customers {
        store.insert_customer(Customer {
            user_id: demo_user(n),
            email: email.to_string(),
            gender,
            date_of_birth: dob.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            city_id,
        });
        store.record_login(LoginRecord {
            user_id: demo_user(n),
            logged_at: now - Duration::days(n as i64) - Duration::hours(n as i64 * 3),
        });
    }

    // Orders spread over statuses, customers, and the trailing months
    let seeds: [(u128, u128, u32, f64, OrderStatus, i64, CityId); 6] = [
        (1, 1, 2, 79.0, OrderStatus::Delivered, 20, 2),
        (2, 2, 1, 449.0, OrderStatus::Delivered, 50, 3),
        (3, 1, 1, 1299.0, OrderStatus::Delivered, 80, 1),
        (4, 3, 3, 99.0, OrderStatus::InTransit, 5, 3),
        (5, 2, 1, 39.0, OrderStatus::Processing, 1, 2),
        (6, 4, 2, 79.0, OrderStatus::Cancelled, 35, 1),
    ];
    for (product_n, user_n, quantity, unit_price, status, days_ago, city_id) in seeds {
        let built = OrderBuilder::new()
            .customer(demo_user(user_n))
            .shipping_city(city_id)
            .shipping_address("demo address")
            .item(demo_product(product_n), quantity, unit_price)
            .order_date(now - Duration::days(days_ago))
            .build();
        let Ok(mut order) = built else { continue };
        order.status = status;
        if status != OrderStatus::Processing {
            order.source_warehouse_id = Some(1);
        }
        let _ = store.insert_order_inner(order);
    }

    info!("Demo data seeded");
}
