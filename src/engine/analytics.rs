// src/engine/analytics.rs - Analytics Aggregation Engine
//! Multi-dimensional aggregation over orders, users, and products
//!
//! Every view is a pure function of an [`AnalyticsSnapshot`] and a
//! [`FacetFilter`]: apply the non-empty facets as an AND-conjunction over
//! the joined record set, group by the view's key, reduce each group to a
//! number, sort, and label. Identical snapshot + filter always produces
//! identical buckets, in the same order.
//!
//! ## View registry
//!
//! | Scope | Views |
//! |-------|-------|
//! | Products | `category_share`, `brand_share`, `price_buckets`, `top_route_cities`, `route_distance_buckets` |
//! | Users | `age_buckets`, `logins_by_hour` (trailing 30 days) |
//! | Orders | `top_brands`, `top_categories`, `top_products`, `revenue_by_month`, `bestsellers_by_month`, `order_brands`, `order_categories`, `order_products` |
//!
//! The generic `analyze` breakdown ([`analyze_share`]) slices delivered
//! order volume by product, category, or brand under the demographic facets.
//!
//! ## Bucketing rules
//!
//! - Categorical buckets: descending value, ties broken by label
//! - Ordinal buckets (age, price, distance, month, hour): ascending lower bound
//! - Price bands: 0-100, 100-500, 500-1000, 1000-5000, 5000+
//! - Distance bands: 0-10, 10-50, 50-200, 200+ km
//! - Month series: exactly 12 trailing months, zero-valued months included
//! - A filter matching nothing yields empty bucket lists, never an error

use chrono::{Datelike, Duration, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::core::order::{Order, OrderItem, OrderStatus};
use crate::core::types::{
    AgeBand, Brand, BrandId, CategoryId, City, CityRoute, Customer, Gender, LoginRecord,
    ProductCategory, ProductId, ProductRecord, Timestamp, UserId, Warehouse,
};
use crate::{utils, EstoreError, EstoreResult};

/// How many entries the top-N share views return
pub const TOP_SHARE_LIMIT: usize = 10;

/// Length of the month series views
pub const TRAILING_MONTHS: usize = 12;

/// Lookback window for the login-by-hour view
pub const LOGIN_WINDOW_DAYS: i64 = 30;

/// Bucket label for customers without a date of birth
pub const UNKNOWN_AGE_LABEL: &str = "Unknown";

/// Fixed price band edges, in currency units
const PRICE_BAND_EDGES: [f64; 4] = [100.0, 500.0, 1000.0, 5000.0];

/// Fixed route-distance band edges, in kilometers
const DISTANCE_BAND_EDGES: [f64; 3] = [10.0, 50.0, 200.0];

/// The entity category an aggregation operates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Catalog analytics
    Products,
    /// Customer analytics
    Users,
    /// Order analytics
    Orders,
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Products => write!(f, "products"),
            Self::Users => write!(f, "users"),
            Self::Orders => write!(f, "orders"),
        }
    }
}

impl FromStr for Scope {
    type Err = EstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "products" => Ok(Self::Products),
            "users" => Ok(Self::Users),
            "orders" => Ok(Self::Orders),
            _ => Err(EstoreError::Validation(format!("Invalid scope: {s}"))),
        }
    }
}

/// Grouping key for the generic analyze breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeGroup {
    /// Group delivered order volume by product
    Products,
    /// Group delivered order volume by category
    Categories,
    /// Group delivered order volume by brand
    Brands,
}

impl FromStr for AnalyzeGroup {
    type Err = EstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "products" => Ok(Self::Products),
            "categories" => Ok(Self::Categories),
            "brands" => Ok(Self::Brands),
            _ => Err(EstoreError::Validation(format!(
                "Invalid analyze grouping: {s}"
            ))),
        }
    }
}

/// A labeled numeric aggregate ready for chart rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Human-readable bucket label
    pub label: String,
    /// Aggregated value (count, quantity, or revenue)
    pub value: f64,
}

impl Bucket {
    /// Create a bucket
    pub fn new<S: Into<String>>(label: S, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Independent filter facets, AND-combined
///
/// Absent fields place no restriction. An order matches through its
/// purchasing customer's gender and age band and its own month and status;
/// category and brand facets match through the order item's product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetFilter {
    /// Restrict to customers of this gender
    pub gender: Option<Gender>,
    /// Restrict to customers in this age band (label, e.g. `"25-29"`)
    pub age_group: Option<String>,
    /// Restrict to orders placed in this calendar month (1..=12)
    pub month: Option<u32>,
    /// Restrict to items in this category
    pub category_id: Option<CategoryId>,
    /// Restrict to items of this brand
    pub brand_id: Option<BrandId>,
    /// Restrict to orders in this status
    pub status: Option<OrderStatus>,
}

impl FacetFilter {
    /// Whether no facet is set
    pub fn is_empty(&self) -> bool {
        self.gender.is_none()
            && self.age_group.is_none()
            && self.month.is_none()
            && self.category_id.is_none()
            && self.brand_id.is_none()
            && self.status.is_none()
    }

    /// Validate the filter
    pub fn validate(&self) -> EstoreResult<()> {
        if let Some(month) = self.month {
            utils::validate_month(month)?;
        }
        Ok(())
    }

    /// Order-level facets: status, month, and the customer's demographics
    fn matches_order(&self, order: &Order, customer: Option<&Customer>, taken_at: Timestamp) -> bool {
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(month) = self.month {
            if order.order_month() != month {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if customer.and_then(|customer| customer.gender) != Some(gender) {
                return false;
            }
        }
        if let Some(age_group) = &self.age_group {
            if age_label(customer, taken_at) != *age_group {
                return false;
            }
        }
        true
    }

    /// Item-level facets: the product's category and brand
    fn matches_product(&self, product: Option<&ProductRecord>) -> bool {
        if let Some(category_id) = self.category_id {
            if product.map(|product| product.category_id) != Some(category_id) {
                return false;
            }
        }
        if let Some(brand_id) = self.brand_id {
            if product.map(|product| product.brand_id) != Some(brand_id) {
                return false;
            }
        }
        true
    }
}

/// Age-band label for a customer, `"Unknown"` when no date of birth is on file
fn age_label(customer: Option<&Customer>, taken_at: Timestamp) -> String {
    customer
        .and_then(|customer| customer.age_band_at(taken_at))
        .map(|band| band.label())
        .unwrap_or_else(|| UNKNOWN_AGE_LABEL.to_string())
}

/// A point-in-time copy of every record the engine reads
///
/// All trailing windows and ages are computed relative to `taken_at`, so a
/// snapshot fully determines every view. Two snapshots taken moments apart
/// may disagree; that skew is accepted, not corrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// When the snapshot was taken
    pub taken_at: Timestamp,
    /// Orders with their items
    pub orders: Vec<Order>,
    /// Customer profiles
    pub customers: Vec<Customer>,
    /// Catalog products
    pub products: Vec<ProductRecord>,
    /// Product categories
    pub categories: Vec<ProductCategory>,
    /// Brands
    pub brands: Vec<Brand>,
    /// Cities
    pub cities: Vec<City>,
    /// City routes
    pub routes: Vec<CityRoute>,
    /// Warehouses
    pub warehouses: Vec<Warehouse>,
    /// Login audit records
    pub logins: Vec<LoginRecord>,
}

impl AnalyticsSnapshot {
    fn product_index(&self) -> HashMap<ProductId, &ProductRecord> {
        self.products
            .iter()
            .map(|product| (product.product_id, product))
            .collect()
    }

    fn customer_index(&self) -> HashMap<UserId, &Customer> {
        self.customers
            .iter()
            .map(|customer| (customer.user_id, customer))
            .collect()
    }

    fn category_name(&self, category_id: CategoryId) -> String {
        self.categories
            .iter()
            .find(|category| category.category_id == category_id)
            .map(|category| category.name.clone())
            .unwrap_or_else(|| format!("category {category_id}"))
    }

    fn brand_name(&self, brand_id: BrandId) -> String {
        self.brands
            .iter()
            .find(|brand| brand.brand_id == brand_id)
            .map(|brand| brand.name.clone())
            .unwrap_or_else(|| format!("brand {brand_id}"))
    }

    fn city_name(&self, city_id: i32) -> String {
        self.cities
            .iter()
            .find(|city| city.city_id == city_id)
            .map(|city| city.name.clone())
            .unwrap_or_else(|| format!("city {city_id}"))
    }
}

/// One order item joined with its order and product
///
/// Customer demographics are consumed by the facet predicate during the
/// join; rows only carry what the grouping stages read.
struct ItemRow<'a> {
    order: &'a Order,
    item: &'a OrderItem,
    product: Option<&'a ProductRecord>,
}

/// Join orders down to item rows, keeping only rows the filter matches
///
/// `default_status` stands in when the filter carries no status facet:
/// the top-volume and analyze views cover delivered orders only, while the
/// filtered re-slice defaults to every status (`None`).
fn matching_item_rows<'a>(
    snapshot: &'a AnalyticsSnapshot,
    filter: &FacetFilter,
    default_status: Option<OrderStatus>,
) -> Vec<ItemRow<'a>> {
    let products = snapshot.product_index();
    let customers = snapshot.customer_index();

    let mut rows = Vec::new();
    for order in &snapshot.orders {
        if filter.status.is_none() {
            if let Some(default) = default_status {
                if order.status != default {
                    continue;
                }
            }
        }
        let customer = customers.get(&order.customer_id).copied();
        if !filter.matches_order(order, customer, snapshot.taken_at) {
            continue;
        }
        for item in &order.items {
            let product = products.get(&item.product_id).copied();
            if !filter.matches_product(product) {
                continue;
            }
            rows.push(ItemRow {
                order,
                item,
                product,
            });
        }
    }
    rows
}

/// Sort grouped values into categorical buckets: value desc, label asc on ties
fn categorical_buckets<K, F>(groups: HashMap<K, f64>, label: F) -> Vec<Bucket>
where
    F: Fn(&K) -> String,
{
    let mut buckets: Vec<Bucket> = groups
        .iter()
        .map(|(key, &value)| Bucket::new(label(key), value))
        .collect();
    buckets.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    buckets
}

/// Band index for a value against ascending edges (last index is open-ended)
fn band_index(value: f64, edges: &[f64]) -> usize {
    edges.iter().filter(|&&edge| value >= edge).count()
}

/// Label for a band index (`"0-100"`, …, `"5000+"`)
fn band_index_label(index: usize, edges: &[f64]) -> String {
    if index >= edges.len() {
        format!("{}+", edges[edges.len() - 1] as i64)
    } else {
        let lower = if index == 0 { 0 } else { edges[index - 1] as i64 };
        format!("{}-{}", lower, edges[index] as i64)
    }
}

/// Count values into ordinal band buckets, ascending by lower bound
///
/// Only non-empty bands are emitted; a fully empty input yields an empty list.
fn band_buckets<I: Iterator<Item = f64>>(values: I, edges: &[f64]) -> Vec<Bucket> {
    let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
    for value in values {
        *counts.entry(band_index(value, edges)).or_insert(0.0) += 1.0;
    }
    counts
        .into_iter()
        .map(|(index, count)| Bucket::new(band_index_label(index, edges), count))
        .collect()
}

/// The trailing month keys (year, month), oldest first, newest = `taken_at`'s month
fn trailing_months(taken_at: Timestamp) -> Vec<(i32, u32)> {
    let mut year = taken_at.year();
    let mut month = taken_at.month();
    let mut keys = Vec::with_capacity(TRAILING_MONTHS);
    for _ in 0..TRAILING_MONTHS {
        keys.push((year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    keys.reverse();
    keys
}

/// `YYYY-MM` label for a month key
fn month_label(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

// ===== Product views =====

/// Share of catalog products per category
pub fn category_share(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut groups: HashMap<CategoryId, f64> = HashMap::new();
    for product in &snapshot.products {
        if !filter.matches_product(Some(product)) {
            continue;
        }
        *groups.entry(product.category_id).or_insert(0.0) += 1.0;
    }
    categorical_buckets(groups, |&category_id| snapshot.category_name(category_id))
}

/// Share of catalog products per brand
pub fn brand_share(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut groups: HashMap<BrandId, f64> = HashMap::new();
    for product in &snapshot.products {
        if !filter.matches_product(Some(product)) {
            continue;
        }
        *groups.entry(product.brand_id).or_insert(0.0) += 1.0;
    }
    categorical_buckets(groups, |&brand_id| snapshot.brand_name(brand_id))
}

/// Catalog products counted into fixed price bands
pub fn price_buckets(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    band_buckets(
        snapshot
            .products
            .iter()
            .filter(|product| filter.matches_product(Some(product)))
            .map(|product| product.price),
        &PRICE_BAND_EDGES,
    )
}

/// Cities by the number of routes starting from them, top 10
pub fn top_route_cities(snapshot: &AnalyticsSnapshot) -> Vec<Bucket> {
    let mut groups: HashMap<i32, f64> = HashMap::new();
    for route in &snapshot.routes {
        *groups.entry(route.city_a).or_insert(0.0) += 1.0;
    }
    let mut buckets = categorical_buckets(groups, |&city_id| snapshot.city_name(city_id));
    buckets.truncate(TOP_SHARE_LIMIT);
    buckets
}

/// Registered routes counted into fixed distance bands
pub fn route_distance_buckets(snapshot: &AnalyticsSnapshot) -> Vec<Bucket> {
    band_buckets(
        snapshot.routes.iter().map(|route| route.distance_km),
        &DISTANCE_BAND_EDGES,
    )
}

// ===== User views =====

/// Customers counted into 5-year age bands
///
/// Bands come out ascending by lower bound with the open `65+` band second
/// to last; customers without a date of birth land in a trailing `Unknown`
/// bucket. The gender facet applies; the other facets have no meaning for a
/// customer roster and are ignored.
pub fn age_buckets(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut bands: BTreeMap<AgeBand, f64> = BTreeMap::new();
    let mut unknown = 0.0;
    for customer in &snapshot.customers {
        if let Some(gender) = filter.gender {
            if customer.gender != Some(gender) {
                continue;
            }
        }
        match customer.age_band_at(snapshot.taken_at) {
            Some(band) => *bands.entry(band).or_insert(0.0) += 1.0,
            None => unknown += 1.0,
        }
    }

    let mut buckets: Vec<Bucket> = bands
        .into_iter()
        .map(|(band, count)| Bucket::new(band.label(), count))
        .collect();
    if unknown > 0.0 {
        buckets.push(Bucket::new(UNKNOWN_AGE_LABEL, unknown));
    }
    buckets
}

/// Logins per hour of day over the trailing 30 days
pub fn logins_by_hour(snapshot: &AnalyticsSnapshot) -> Vec<Bucket> {
    let window_start = snapshot.taken_at - Duration::days(LOGIN_WINDOW_DAYS);
    let mut hours: BTreeMap<u32, f64> = BTreeMap::new();
    for login in &snapshot.logins {
        if login.logged_at >= window_start && login.logged_at <= snapshot.taken_at {
            *hours.entry(login.logged_at.hour()).or_insert(0.0) += 1.0;
        }
    }
    hours
        .into_iter()
        .map(|(hour, count)| Bucket::new(hour.to_string(), count))
        .collect()
}

// ===== Order views =====

/// Units sold per brand, top 10 (delivered orders unless a status facet is set)
pub fn top_brands(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut buckets = volume_by(snapshot, filter, Some(OrderStatus::Delivered), |row| {
        row.product.map(|product| GroupKey::Brand(product.brand_id))
    });
    buckets.truncate(TOP_SHARE_LIMIT);
    buckets
}

/// Units sold per category, top 10 (delivered orders unless a status facet is set)
pub fn top_categories(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut buckets = volume_by(snapshot, filter, Some(OrderStatus::Delivered), |row| {
        row.product
            .map(|product| GroupKey::Category(product.category_id))
    });
    buckets.truncate(TOP_SHARE_LIMIT);
    buckets
}

/// Units sold per product, top 10 (delivered orders unless a status facet is set)
pub fn top_products(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let mut buckets = volume_by(snapshot, filter, Some(OrderStatus::Delivered), |row| {
        row.product.map(|product| GroupKey::Product(product.product_id))
    });
    buckets.truncate(TOP_SHARE_LIMIT);
    buckets
}

/// Filtered re-slice: units sold per brand under the full facet set
pub fn order_brands(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    volume_by(snapshot, filter, None, |row| {
        row.product.map(|product| GroupKey::Brand(product.brand_id))
    })
}

/// Filtered re-slice: units sold per category under the full facet set
pub fn order_categories(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    volume_by(snapshot, filter, None, |row| {
        row.product
            .map(|product| GroupKey::Category(product.category_id))
    })
}

/// Filtered re-slice: units sold per product under the full facet set
pub fn order_products(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    volume_by(snapshot, filter, None, |row| {
        row.product.map(|product| GroupKey::Product(product.product_id))
    })
}

/// Grouping key for volume views
#[derive(PartialEq, Eq, Hash)]
enum GroupKey {
    Product(ProductId),
    Category(CategoryId),
    Brand(BrandId),
}

fn group_key_label(snapshot: &AnalyticsSnapshot, key: &GroupKey) -> String {
    match key {
        GroupKey::Product(product_id) => snapshot
            .products
            .iter()
            .find(|product| product.product_id == *product_id)
            .map(|product| product.name.clone())
            .unwrap_or_else(|| format!("product {product_id}")),
        GroupKey::Category(category_id) => snapshot.category_name(*category_id),
        GroupKey::Brand(brand_id) => snapshot.brand_name(*brand_id),
    }
}

/// Sum item quantities per group over the matching item rows
fn volume_by<F>(
    snapshot: &AnalyticsSnapshot,
    filter: &FacetFilter,
    default_status: Option<OrderStatus>,
    key: F,
) -> Vec<Bucket>
where
    F: Fn(&ItemRow<'_>) -> Option<GroupKey>,
{
    let mut groups: HashMap<GroupKey, f64> = HashMap::new();
    for row in matching_item_rows(snapshot, filter, default_status) {
        if let Some(group) = key(&row) {
            *groups.entry(group).or_insert(0.0) += f64::from(row.item.quantity);
        }
    }
    categorical_buckets(groups, |key| group_key_label(snapshot, key))
}

/// Delivered revenue per trailing month
///
/// Always exactly 12 buckets, oldest month first, zero-valued months
/// included, labels `YYYY-MM`. Revenue is the order's total amount.
pub fn revenue_by_month(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let customers = snapshot.customer_index();
    let months = trailing_months(snapshot.taken_at);
    let mut revenue: HashMap<(i32, u32), f64> = HashMap::new();

    for order in &snapshot.orders {
        if filter.status.is_none() && order.status != OrderStatus::Delivered {
            continue;
        }
        let customer = customers.get(&order.customer_id).copied();
        if !filter.matches_order(order, customer, snapshot.taken_at) {
            continue;
        }
        let key = (order.order_date.year(), order.order_date.month());
        *revenue.entry(key).or_insert(0.0) += order.total_amount;
    }

    months
        .into_iter()
        .map(|(year, month)| {
            Bucket::new(
                month_label(year, month),
                revenue.get(&(year, month)).copied().unwrap_or(0.0),
            )
        })
        .collect()
}

/// Best-selling product per trailing month
///
/// Always exactly 12 buckets, oldest month first. A month with sales is
/// labeled `YYYY-MM <product>` and valued at the winner's unit volume; a
/// month without sales keeps the bare `YYYY-MM` label and value 0.
pub fn bestsellers_by_month(snapshot: &AnalyticsSnapshot, filter: &FacetFilter) -> Vec<Bucket> {
    let months = trailing_months(snapshot.taken_at);
    // (year, month) -> product -> units
    let mut volumes: HashMap<(i32, u32), HashMap<ProductId, f64>> = HashMap::new();

    for row in matching_item_rows(snapshot, filter, Some(OrderStatus::Delivered)) {
        let key = (row.order.order_date.year(), row.order.order_date.month());
        *volumes
            .entry(key)
            .or_default()
            .entry(row.item.product_id)
            .or_insert(0.0) += f64::from(row.item.quantity);
    }

    months
        .into_iter()
        .map(|(year, month)| {
            let label = month_label(year, month);
            let winner = volumes.get(&(year, month)).and_then(|products| {
                products
                    .iter()
                    .max_by(|a, b| {
                        a.1.partial_cmp(b.1)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| b.0.cmp(a.0))
                    })
                    .map(|(&product_id, &units)| (product_id, units))
            });
            match winner {
                Some((product_id, units)) => {
                    let name = group_key_label(snapshot, &GroupKey::Product(product_id));
                    Bucket::new(format!("{label} {name}"), units)
                }
                None => Bucket::new(label, 0.0),
            }
        })
        .collect()
}

// ===== Generic analyze =====

/// Share breakdown of delivered order volume by product, category, or brand
///
/// The generic dashboard slice: demographic facets (gender, age band,
/// month) restrict the matched orders; the grouping key is the caller's
/// choice. Delivered orders only.
pub fn analyze_share(
    snapshot: &AnalyticsSnapshot,
    group: AnalyzeGroup,
    filter: &FacetFilter,
) -> Vec<Bucket> {
    volume_by(snapshot, filter, Some(OrderStatus::Delivered), |row| {
        row.product.map(|product| match group {
            AnalyzeGroup::Products => GroupKey::Product(product.product_id),
            AnalyzeGroup::Categories => GroupKey::Category(product.category_id),
            AnalyzeGroup::Brands => GroupKey::Brand(product.brand_id),
        })
    })
}

// ===== Multi-view entry point =====

/// Compute every view registered for the scope
///
/// Callers validate the filter first (see [`FacetFilter::validate`]);
/// each view is computed independently from the same snapshot, and every
/// view key is always present in the result.
pub fn aggregate(
    scope: Scope,
    snapshot: &AnalyticsSnapshot,
    filter: &FacetFilter,
) -> BTreeMap<&'static str, Vec<Bucket>> {
    let mut views = BTreeMap::new();
    match scope {
        Scope::Products => {
            views.insert("category_share", category_share(snapshot, filter));
            views.insert("brand_share", brand_share(snapshot, filter));
            views.insert("price_buckets", price_buckets(snapshot, filter));
            views.insert("top_route_cities", top_route_cities(snapshot));
            views.insert("route_distance_buckets", route_distance_buckets(snapshot));
        }
        Scope::Users => {
            views.insert("age_buckets", age_buckets(snapshot, filter));
            views.insert("logins_by_hour", logins_by_hour(snapshot));
        }
        Scope::Orders => {
            views.insert("top_brands", top_brands(snapshot, filter));
            views.insert("top_categories", top_categories(snapshot, filter));
            views.insert("top_products", top_products(snapshot, filter));
            views.insert("revenue_by_month", revenue_by_month(snapshot, filter));
            views.insert("bestsellers_by_month", bestsellers_by_month(snapshot, filter));
            views.insert("order_brands", order_brands(snapshot, filter));
            views.insert("order_categories", order_categories(snapshot, filter));
            views.insert("order_products", order_products(snapshot, filter));
        }
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::order::OrderBuilder;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn product_id(n: u128) -> ProductId {
        Uuid::from_u128(n)
    }

    fn user_id(n: u128) -> UserId {
        Uuid::from_u128(0xFF00 + n)
    }

    fn taken_at() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap()
    }

    fn order(
        customer: u128,
        product: u128,
        quantity: u32,
        unit_price: f64,
        status: OrderStatus,
        date: Timestamp,
    ) -> Order {
        let mut order = OrderBuilder::new()
            .customer(user_id(customer))
            .shipping_city(1)
            .shipping_address("addr")
            .item(product_id(product), quantity, unit_price)
            .order_date(date)
            .build()
            .unwrap();
        order.status = status;
        order
    }

    /// Two brands, two categories, four products, three customers, a login
    /// log, and delivered/cancelled orders across the trailing year
    fn snapshot() -> AnalyticsSnapshot {
        let now = taken_at();
        let customers = vec![
            Customer {
                user_id: user_id(1),
                email: "f33@example.com".to_string(),
                gender: Some(Gender::Female),
                date_of_birth: NaiveDate::from_ymd_opt(1992, 3, 10), // 33 -> 30-34
                city_id: Some(1),
            },
            Customer {
                user_id: user_id(2),
                email: "m49@example.com".to_string(),
                gender: Some(Gender::Male),
                date_of_birth: NaiveDate::from_ymd_opt(1975, 11, 2), // 49 -> 45-49
                city_id: Some(2),
            },
            Customer {
                user_id: user_id(3),
                email: "nodob@example.com".to_string(),
                gender: Some(Gender::Female),
                date_of_birth: None, // Unknown
                city_id: None,
            },
        ];
        let products = vec![
            ProductRecord {
                product_id: product_id(1),
                name: "Buds".to_string(),
                category_id: 1,
                brand_id: 1,
                price: 79.0,
            },
            ProductRecord {
                product_id: product_id(2),
                name: "Soundbar".to_string(),
                category_id: 1,
                brand_id: 1,
                price: 449.0,
            },
            ProductRecord {
                product_id: product_id(3),
                name: "Watch".to_string(),
                category_id: 2,
                brand_id: 2,
                price: 1299.0,
            },
            ProductRecord {
                product_id: product_id(4),
                name: "Band".to_string(),
                category_id: 2,
                brand_id: 2,
                price: 99.0,
            },
        ];
        let orders = vec![
            // This month: customer 1 (F, 30-34) buys 3 Buds, delivered
            order(1, 1, 3, 79.0, OrderStatus::Delivered, now - Duration::days(2)),
            // Two months ago: customer 2 (M, 45-49) buys 1 Watch, delivered
            order(2, 3, 1, 1299.0, OrderStatus::Delivered, now - Duration::days(60)),
            // This month: customer 1 buys 2 Bands, delivered
            order(1, 4, 2, 99.0, OrderStatus::Delivered, now - Duration::days(1)),
            // Cancelled order, never counted in delivered views
            order(2, 2, 5, 449.0, OrderStatus::Cancelled, now - Duration::days(10)),
            // Old delivered order outside the trailing 12 months
            order(1, 2, 1, 449.0, OrderStatus::Delivered, now - Duration::days(400)),
        ];
        AnalyticsSnapshot {
            taken_at: now,
            orders,
            customers,
            products,
            categories: vec![
                ProductCategory {
                    category_id: 1,
                    name: "Audio".to_string(),
                },
                ProductCategory {
                    category_id: 2,
                    name: "Wearables".to_string(),
                },
            ],
            brands: vec![
                Brand {
                    brand_id: 1,
                    name: "Voltex".to_string(),
                },
                Brand {
                    brand_id: 2,
                    name: "Nimbus".to_string(),
                },
            ],
            cities: vec![
                City {
                    city_id: 1,
                    name: "Riverton".to_string(),
                },
                City {
                    city_id: 2,
                    name: "Midvale".to_string(),
                },
                City {
                    city_id: 3,
                    name: "Eastport".to_string(),
                },
            ],
            routes: vec![
                CityRoute {
                    route_id: 1,
                    city_a: 1,
                    city_b: 2,
                    distance_km: 8.0,
                },
                CityRoute {
                    route_id: 2,
                    city_a: 1,
                    city_b: 3,
                    distance_km: 45.0,
                },
                CityRoute {
                    route_id: 3,
                    city_a: 2,
                    city_b: 3,
                    distance_km: 250.0,
                },
            ],
            warehouses: vec![],
            logins: vec![
                LoginRecord {
                    user_id: user_id(1),
                    logged_at: taken_at() - Duration::days(1) + Duration::hours(2), // hour 14
                },
                LoginRecord {
                    user_id: user_id(2),
                    logged_at: taken_at() - Duration::days(3) - Duration::hours(3), // hour 9
                },
                LoginRecord {
                    user_id: user_id(2),
                    logged_at: taken_at() - Duration::days(2) - Duration::hours(3), // hour 9
                },
                LoginRecord {
                    user_id: user_id(3),
                    logged_at: taken_at() - Duration::days(45), // outside the window
                },
            ],
        }
    }

    #[test]
    fn test_category_share() {
        let buckets = category_share(&snapshot(), &FacetFilter::default());
        assert_eq!(buckets.len(), 2);
        // Two products in each category; tie broken by label
        assert_eq!(buckets[0], Bucket::new("Audio", 2.0));
        assert_eq!(buckets[1], Bucket::new("Wearables", 2.0));
    }

    #[test]
    fn test_brand_share_with_category_facet() {
        let filter = FacetFilter {
            category_id: Some(1),
            ..Default::default()
        };
        let buckets = brand_share(&snapshot(), &filter);
        assert_eq!(buckets, vec![Bucket::new("Voltex", 2.0)]);
    }

    #[test]
    fn test_price_buckets_edges_and_order() {
        let buckets = price_buckets(&snapshot(), &FacetFilter::default());
        // 79 -> 0-100, 99 -> 0-100, 449 -> 100-500, 1299 -> 1000-5000
        assert_eq!(
            buckets,
            vec![
                Bucket::new("0-100", 2.0),
                Bucket::new("100-500", 1.0),
                Bucket::new("1000-5000", 1.0),
            ]
        );
    }

    #[test]
    fn test_route_distance_buckets() {
        let buckets = route_distance_buckets(&snapshot());
        // 8 -> 0-10, 45 -> 10-50, 250 -> 200+
        assert_eq!(
            buckets,
            vec![
                Bucket::new("0-10", 1.0),
                Bucket::new("10-50", 1.0),
                Bucket::new("200+", 1.0),
            ]
        );
    }

    #[test]
    fn test_top_route_cities() {
        let buckets = top_route_cities(&snapshot());
        assert_eq!(buckets[0], Bucket::new("Riverton", 2.0));
        assert_eq!(buckets[1], Bucket::new("Midvale", 1.0));
    }

    #[test]
    fn test_age_buckets_with_unknown_last() {
        let buckets = age_buckets(&snapshot(), &FacetFilter::default());
        assert_eq!(
            buckets,
            vec![
                Bucket::new("30-34", 1.0),
                Bucket::new("45-49", 1.0),
                Bucket::new(UNKNOWN_AGE_LABEL, 1.0),
            ]
        );
    }

    #[test]
    fn test_age_buckets_gender_facet() {
        let filter = FacetFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        let buckets = age_buckets(&snapshot(), &filter);
        assert_eq!(
            buckets,
            vec![
                Bucket::new("30-34", 1.0),
                Bucket::new(UNKNOWN_AGE_LABEL, 1.0),
            ]
        );
    }

    #[test]
    fn test_logins_by_hour_window() {
        let buckets = logins_by_hour(&snapshot());
        // The 45-day-old login is outside the 30-day window
        assert_eq!(buckets, vec![Bucket::new("9", 2.0), Bucket::new("14", 1.0)]);
    }

    #[test]
    fn test_top_products_delivered_only() {
        let buckets = top_products(&snapshot(), &FacetFilter::default());
        // Cancelled Soundbar order (5 units) never appears; trailing-window
        // cutoff does not apply to the top views, so the old delivered
        // Soundbar order does
        assert_eq!(buckets[0], Bucket::new("Buds", 3.0));
        assert_eq!(buckets[1], Bucket::new("Band", 2.0));
        assert!(buckets
            .iter()
            .any(|bucket| bucket.label == "Soundbar" && bucket.value == 1.0));
        assert!(buckets.iter().any(|bucket| bucket.label == "Watch"));
    }

    #[test]
    fn test_revenue_by_month_exactly_twelve() {
        let snapshot = snapshot();
        let buckets = revenue_by_month(&snapshot, &FacetFilter::default());
        assert_eq!(buckets.len(), TRAILING_MONTHS);
        assert_eq!(buckets.first().unwrap().label, "2024-09");
        assert_eq!(buckets.last().unwrap().label, "2025-08");

        // This month: 3x79 + 2x99 = 435; June 2025 (60 days ago): 1299
        assert_eq!(buckets.last().unwrap().value, 435.0);
        let june = buckets.iter().find(|bucket| bucket.label == "2025-06").unwrap();
        assert_eq!(june.value, 1299.0);

        // Zero months present, not missing
        let zero_months = buckets.iter().filter(|bucket| bucket.value == 0.0).count();
        assert_eq!(zero_months, TRAILING_MONTHS - 2);
    }

    #[test]
    fn test_bestsellers_by_month_exactly_twelve() {
        let buckets = bestsellers_by_month(&snapshot(), &FacetFilter::default());
        assert_eq!(buckets.len(), TRAILING_MONTHS);
        let this_month = buckets.last().unwrap();
        assert_eq!(this_month.label, "2025-08 Buds");
        assert_eq!(this_month.value, 3.0);
        // Empty months keep the bare label and zero value
        assert!(buckets
            .iter()
            .any(|bucket| bucket.label == "2025-01" && bucket.value == 0.0));
    }

    #[test]
    fn test_filter_conjunction_is_subset() {
        let snapshot = snapshot();
        let delivered = FacetFilter {
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        };
        let delivered_female = FacetFilter {
            status: Some(OrderStatus::Delivered),
            gender: Some(Gender::Female),
            ..Default::default()
        };

        let all: f64 = order_products(&snapshot, &delivered)
            .iter()
            .map(|bucket| bucket.value)
            .sum();
        let female: f64 = order_products(&snapshot, &delivered_female)
            .iter()
            .map(|bucket| bucket.value)
            .sum();
        assert!(female < all);
        assert!(female > 0.0);
    }

    #[test]
    fn test_order_reslice_age_and_month_facets() {
        let snapshot = snapshot();
        let filter = FacetFilter {
            age_group: Some("45-49".to_string()),
            ..Default::default()
        };
        let buckets = order_brands(&snapshot, &filter);
        // Customer 2's delivered Watch plus the cancelled Soundbar order
        // (re-slice defaults to every status)
        assert_eq!(buckets[0], Bucket::new("Voltex", 5.0));
        assert_eq!(buckets[1], Bucket::new("Nimbus", 1.0));

        let this_month = FacetFilter {
            month: Some(8),
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        };
        let buckets = order_products(&snapshot, &this_month);
        assert_eq!(buckets[0], Bucket::new("Buds", 3.0));
        assert_eq!(buckets[1], Bucket::new("Band", 2.0));
    }

    #[test]
    fn test_analyze_share_by_group_and_demographics() {
        let snapshot = snapshot();
        let unfiltered = analyze_share(&snapshot, AnalyzeGroup::Brands, &FacetFilter::default());
        // Delivered: Buds 3 + Soundbar 1 (old) = Voltex 4; Watch 1 + Band 2 = Nimbus 3
        assert_eq!(unfiltered[0], Bucket::new("Voltex", 4.0));
        assert_eq!(unfiltered[1], Bucket::new("Nimbus", 3.0));

        let female = FacetFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        let buckets = analyze_share(&snapshot, AnalyzeGroup::Categories, &female);
        // Customer 1 only: Buds 3 + old Soundbar 1 (Audio), Band 2 (Wearables)
        assert_eq!(buckets[0], Bucket::new("Audio", 4.0));
        assert_eq!(buckets[1], Bucket::new("Wearables", 2.0));
    }

    #[test]
    fn test_empty_match_yields_empty_lists_not_missing_keys() {
        let snapshot = snapshot();
        let impossible = FacetFilter {
            month: Some(2),
            gender: Some(Gender::Male),
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        };
        let views = aggregate(Scope::Orders, &snapshot, &impossible);
        assert!(views.contains_key("order_products"));
        assert!(views["order_products"].is_empty());
        assert!(views["top_brands"].is_empty());
        // Month series still emits its 12 zero buckets
        assert_eq!(views["revenue_by_month"].len(), TRAILING_MONTHS);
        assert!(views["revenue_by_month"]
            .iter()
            .all(|bucket| bucket.value == 0.0));
    }

    #[test]
    fn test_aggregate_idempotent() {
        let snapshot = snapshot();
        let filter = FacetFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        for scope in [Scope::Products, Scope::Users, Scope::Orders] {
            let first = aggregate(scope, &snapshot, &filter);
            let second = aggregate(scope, &snapshot, &filter);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_scope_registry_keys() {
        let snapshot = snapshot();
        let filter = FacetFilter::default();
        let products: Vec<_> = aggregate(Scope::Products, &snapshot, &filter)
            .keys()
            .copied()
            .collect();
        assert_eq!(
            products,
            vec![
                "brand_share",
                "category_share",
                "price_buckets",
                "route_distance_buckets",
                "top_route_cities",
            ]
        );
        assert_eq!(
            aggregate(Scope::Users, &snapshot, &filter).len(),
            2
        );
        assert_eq!(
            aggregate(Scope::Orders, &snapshot, &filter).len(),
            8
        );
    }

    #[test]
    fn test_filter_validation() {
        let filter = FacetFilter {
            month: Some(13),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
        let filter = FacetFilter {
            month: Some(12),
            ..Default::default()
        };
        assert!(filter.validate().is_ok());
        assert!(FacetFilter::default().validate().is_ok());
        assert!(FacetFilter::default().is_empty());
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(Scope::from_str("orders").unwrap(), Scope::Orders);
        assert_eq!(Scope::from_str("Products").unwrap(), Scope::Products);
        assert!(Scope::from_str("cities").is_err());
        assert_eq!(
            AnalyzeGroup::from_str("brands").unwrap(),
            AnalyzeGroup::Brands
        );
        assert!(AnalyzeGroup::from_str("users").is_err());
    }
}
