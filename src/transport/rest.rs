// src/transport/rest.rs - REST API Transport Layer
//! RESTful API endpoints for the admin console
//!
//! A thin boundary over the engines: requests are normalized into the
//! typed core shapes (actor context, logistics payload, facet filter)
//! exactly once here, and engine errors map onto HTTP statuses. No
//! business rules live in this layer.
//!
//! | Route | Engine call |
//! |-------|-------------|
//! | `GET  /api/admin/orders` | `OrderStore::all_orders` |
//! | `GET  /api/admin/orders/{id}` | `LifecycleEngine::projection` |
//! | `PUT  /api/admin/orders/{id}/logistics` | `LifecycleEngine::transition` |
//! | `GET  /api/admin/orders/status/{status}` | `OrderStore::orders_by_status` |
//! | `GET  /api/admin/analytics/{scope}` | `OpsEngine::aggregate` |
//! | `GET  /api/admin/analytics/analyze` | `OpsEngine::analyze` |
//! | `GET  /health` | - |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::instrument;
use uuid::Uuid;

use crate::core::auth::{ActorContext, Department};
use crate::core::order::{LogisticsUpdate, Order, OrderProjection, OrderStatus};
use crate::engine::analytics::{AnalyzeGroup, Bucket, FacetFilter, Scope};
use crate::engine::OpsEngine;
use crate::storage::OrderStore;
use crate::{EstoreError, EstoreResult};

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Engine facade
    pub engine: Arc<OpsEngine>,
    /// Direct order reads for list endpoints
    pub store: Arc<dyn OrderStore>,
}

impl IntoResponse for EstoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Query parameters identifying the acting admin
///
/// The console resolves the admin's department at login and sends both
/// fields with every request; this boundary normalizes them into an
/// [`ActorContext`] once instead of re-reading ambient session state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorParams {
    admin_user_id: Uuid,
    department: String,
}

impl ActorParams {
    fn to_actor(&self) -> EstoreResult<ActorContext> {
        let department = Department::from_str(&self.department)?;
        Ok(ActorContext::new(self.admin_user_id, department))
    }
}

/// Body of the logistics update endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogisticsRequest {
    warehouse_id: Option<i64>,
    delivery_date: Option<NaiveDate>,
    status: Option<String>,
}

/// Actor identity plus facet query parameters for analytics endpoints
///
/// One flat struct: the urlencoded query deserializer does not compose
/// with nested/flattened shapes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorFacetParams {
    admin_user_id: Uuid,
    department: String,
    gender: Option<String>,
    age_group: Option<String>,
    month: Option<u32>,
    category_id: Option<i32>,
    brand_id: Option<i32>,
    status: Option<String>,
    scope: Option<String>,
}

impl ActorFacetParams {
    fn to_actor(&self) -> EstoreResult<ActorContext> {
        let department = Department::from_str(&self.department)?;
        Ok(ActorContext::new(self.admin_user_id, department))
    }

    fn to_filter(&self) -> EstoreResult<FacetFilter> {
        let gender = match &self.gender {
            Some(raw) if !raw.is_empty() => Some(raw.parse()?),
            _ => None,
        };
        let status = match &self.status {
            Some(raw) if !raw.is_empty() => Some(raw.parse()?),
            _ => None,
        };
        let filter = FacetFilter {
            gender,
            age_group: self.age_group.clone().filter(|label| !label.is_empty()),
            month: self.month,
            category_id: self.category_id,
            brand_id: self.brand_id,
            status,
        };
        filter.validate()?;
        Ok(filter)
    }
}

/// Build the API router
pub fn create_router(state: ApiState, enable_cors: bool) -> Router {
    let mut router = Router::new()
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/:order_id", get(get_order))
        .route("/api/admin/orders/:order_id/logistics", put(update_logistics))
        .route("/api/admin/orders/status/:status", get(orders_by_status))
        .route("/api/admin/analytics/analyze", get(analyze))
        .route("/api/admin/analytics/:scope", get(aggregate_scope))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());
    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

/// List every order, newest first
#[instrument(skip(state, params))]
async fn list_orders(
    State(state): State<ApiState>,
    Query(params): Query<ActorParams>,
) -> Result<Json<Vec<Order>>, EstoreError> {
    // Listing goes through the same capability gate as single-order reads
    let actor = params.to_actor()?;
    ensure_order_access(&state, &actor)?;
    let orders = state
        .store
        .all_orders()
        .await
        .map_err(EstoreError::from)?;
    Ok(Json(orders))
}

/// Fetch one order with its route resolution
#[instrument(skip(state, params))]
async fn get_order(
    State(state): State<ApiState>,
    Path(order_id): Path<Uuid>,
    Query(params): Query<ActorParams>,
) -> Result<Json<OrderProjection>, EstoreError> {
    let actor = params.to_actor()?;
    let projection = state.engine.lifecycle().projection(order_id, &actor).await?;
    Ok(Json(projection))
}

/// Apply a status transition and/or logistics update
#[instrument(skip(state, params, body))]
async fn update_logistics(
    State(state): State<ApiState>,
    Path(order_id): Path<Uuid>,
    Query(params): Query<ActorParams>,
    Json(body): Json<LogisticsRequest>,
) -> Result<Json<OrderProjection>, EstoreError> {
    let actor = params.to_actor()?;
    let target = match &body.status {
        Some(raw) if !raw.is_empty() => Some(OrderStatus::from_str(raw)?),
        _ => None,
    };
    let logistics = LogisticsUpdate {
        warehouse_id: body.warehouse_id,
        delivery_date: body.delivery_date,
    };
    let projection = state
        .engine
        .lifecycle()
        .transition(order_id, target, logistics, &actor)
        .await?;
    Ok(Json(projection))
}

/// List orders in one status, newest first
#[instrument(skip(state, params))]
async fn orders_by_status(
    State(state): State<ApiState>,
    Path(status): Path<String>,
    Query(params): Query<ActorParams>,
) -> Result<Json<Vec<Order>>, EstoreError> {
    let actor = params.to_actor()?;
    ensure_order_access(&state, &actor)?;
    let status = OrderStatus::from_str(&status)?;
    let orders = state
        .store
        .orders_by_status(status)
        .await
        .map_err(EstoreError::from)?;
    Ok(Json(orders))
}

/// All analytics views for a scope, filtered by the facet query
#[instrument(skip(state, params))]
async fn aggregate_scope(
    State(state): State<ApiState>,
    Path(scope): Path<String>,
    Query(params): Query<ActorFacetParams>,
) -> Result<Json<BTreeMap<&'static str, Vec<Bucket>>>, EstoreError> {
    let actor = params.to_actor()?;
    let scope = Scope::from_str(&scope)?;
    let filter = params.to_filter()?;
    let views = state.engine.aggregate(scope, &filter, &actor).await?;
    Ok(Json(views))
}

/// Generic analyze breakdown (`scope=products|categories|brands`)
#[instrument(skip(state, params))]
async fn analyze(
    State(state): State<ApiState>,
    Query(params): Query<ActorFacetParams>,
) -> Result<Json<Vec<Bucket>>, EstoreError> {
    let actor = params.to_actor()?;
    let group = params
        .scope
        .as_deref()
        .map(AnalyzeGroup::from_str)
        .transpose()?
        .unwrap_or(AnalyzeGroup::Products);
    let filter = params.to_filter()?;
    let buckets = state.engine.analyze(group, &filter, &actor).await?;
    Ok(Json(buckets))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Capability gate for the plain list endpoints, which bypass the engines
fn ensure_order_access(state: &ApiState, actor: &ActorContext) -> EstoreResult<()> {
    use crate::core::auth::Capability;
    if !state.engine.grants(actor, Capability::ManageOrders) {
        return Err(EstoreError::Unauthorized(format!(
            "department {} cannot manage orders",
            actor.department
        )));
    }
    Ok(())
}
