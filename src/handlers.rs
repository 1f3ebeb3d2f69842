// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers. Each handler extracts its input, calls one
// `OrderService` operation and records the request in Prometheus.
//
// Identity is passed explicitly (`user_id` in the body or query string);
// authentication happens upstream of this service.
// =============================================================================

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::OrderResult;
use crate::metrics;
use crate::models::*;
use crate::AppState;

/// Record the outcome of a handler under its route template
fn track<T>(method: &str, endpoint: &str, ok: StatusCode, start: Instant, result: &OrderResult<T>) {
    let status = match result {
        Ok(_) => ok,
        Err(e) => e.status_code(),
    };
    metrics::record_http_request(method, endpoint, status.as_u16(), start.elapsed().as_secs_f64());
}

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness check
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "order-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check: 503 until the database answers
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.orders.ping().await;

    if !db_healthy {
        tracing::warn!("Readiness check failed: database unreachable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
        },
    }))
}

/// Prometheus text exposition
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// ORDER ENDPOINTS
// =============================================================================

/// Place an order
///
/// POST /api/v1/orders
///
/// # Request Body
/// ```json
/// {
///   "user_id": "3f0c...",
///   "address_id": "9a1e...",
///   "items": [{ "product_id": "77b2...", "quantity": 2 }],
///   "coupon_id": "c41d...",
///   "remark": "ring twice"
/// }
/// ```
///
/// # Response
/// - 201 Created: order with its lines
/// - 409 Conflict: insufficient stock
/// - 422 Unprocessable Entity: product or coupon rejected
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> OrderResult<(StatusCode, Json<OrderDetail>)> {
    let start = Instant::now();

    let result = state.orders.create_order(&request).await;
    track("POST", "/api/v1/orders", StatusCode::CREATED, start, &result);

    Ok((StatusCode::CREATED, Json(result?)))
}

/// GET /api/v1/orders/:id?user_id=
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> OrderResult<Json<OrderDetail>> {
    let start = Instant::now();

    let result = state.orders.get_order(order_id, query.user_id).await;
    track("GET", "/api/v1/orders/:id", StatusCode::OK, start, &result);

    Ok(Json(result?))
}

/// Cancel an unpaid order, returning its stock and coupon
///
/// POST /api/v1/orders/:id/cancel
///
/// # Request Body
/// ```json
/// { "user_id": "3f0c...", "reason": "changed my mind" }
/// ```
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<CancelOrderBody>,
) -> OrderResult<Json<Order>> {
    let start = Instant::now();

    let request = CancelOrderRequest {
        order_id,
        user_id: body.user_id,
        reason: body.reason,
    };
    let result = state.orders.cancel_order(&request).await;
    track("POST", "/api/v1/orders/:id/cancel", StatusCode::OK, start, &result);

    Ok(Json(result?))
}

/// POST /api/v1/orders/:id/pay
pub async fn pay_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<UserActionBody>,
) -> OrderResult<Json<Order>> {
    let start = Instant::now();

    let result = state.orders.pay_order(order_id, body.user_id).await;
    track("POST", "/api/v1/orders/:id/pay", StatusCode::OK, start, &result);

    Ok(Json(result?))
}

/// Merchant-side shipment; no owner in the request
///
/// POST /api/v1/orders/:id/ship
pub async fn ship_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> OrderResult<Json<Order>> {
    let start = Instant::now();

    let result = state.orders.ship_order(order_id).await;
    track("POST", "/api/v1/orders/:id/ship", StatusCode::OK, start, &result);

    Ok(Json(result?))
}

/// POST /api/v1/orders/:id/confirm
pub async fn confirm_receipt(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<UserActionBody>,
) -> OrderResult<Json<Order>> {
    let start = Instant::now();

    let result = state.orders.confirm_receipt(order_id, body.user_id).await;
    track("POST", "/api/v1/orders/:id/confirm", StatusCode::OK, start, &result);

    Ok(Json(result?))
}

/// Soft-delete a completed or cancelled order
///
/// DELETE /api/v1/orders/:id?user_id=
///
/// # Response
/// - 204 No Content
/// - 409 Conflict: order still in progress
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> OrderResult<StatusCode> {
    let start = Instant::now();

    let result = state.orders.delete_order(order_id, query.user_id).await;
    track("DELETE", "/api/v1/orders/:id", StatusCode::NO_CONTENT, start, &result);

    result?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// FREIGHT
// =============================================================================

/// Shipping fee preview for a basket
///
/// GET /api/v1/freight/quote?region=Shanghai&subtotal=2000
pub async fn freight_quote(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FreightQuoteParams>,
) -> OrderResult<Json<FreightQuoteResponse>> {
    let start = Instant::now();

    let result = state
        .orders
        .freight()
        .calculate(&params.region, params.subtotal);
    track("GET", "/api/v1/freight/quote", StatusCode::OK, start, &result);

    Ok(Json(FreightQuoteResponse {
        freight: result?,
        region: params.region,
        subtotal: params.subtotal,
    }))
}
