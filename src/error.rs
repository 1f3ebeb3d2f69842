// =============================================================================
// ERROR MODULE
// =============================================================================
// Typed errors for the order workflows and their HTTP responses.
//
// ERROR CLASSES:
// - Validation: caller-fixable input problems, rejected before any write
// - Business rule: stock, coupon and order-state rejections
// - Infrastructure: database failures, surfaced generically to clients
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ErrorResponse, OrderStatus};

#[derive(Debug, Error)]
pub enum OrderError {
    // -------------------------------------------------------------------------
    // VALIDATION ERRORS
    // -------------------------------------------------------------------------
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Address {address_id} not found for this user")]
    AddressNotFound { address_id: Uuid },

    // -------------------------------------------------------------------------
    // BUSINESS RULE ERRORS
    // -------------------------------------------------------------------------
    #[error("Product {product_id} is not available")]
    ProductUnavailable {
        product_id: Uuid,
        sku_id: Option<Uuid>,
    },

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        sku_id: Option<Uuid>,
        available: i32,
        requested: i32,
    },

    #[error("Coupon {coupon_id} is not available to this user")]
    CouponNotFound { coupon_id: Uuid },

    #[error("Coupon {coupon_id} is outside its validity window")]
    CouponExpired { coupon_id: Uuid },

    #[error("Coupon {coupon_id} requires a minimum spend of {min_amount}, order amount is {order_amount}")]
    CouponThresholdNotMet {
        coupon_id: Uuid,
        min_amount: i64,
        order_amount: i64,
    },

    #[error("Coupon {coupon_id} has no redemptions left")]
    CouponExhausted { coupon_id: Uuid },

    #[error("Order {order_id} cannot be changed in status {status}")]
    InvalidOrderState { order_id: Uuid, status: OrderStatus },

    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: Uuid },

    // -------------------------------------------------------------------------
    // INFRASTRUCTURE ERRORS
    // -------------------------------------------------------------------------
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Stable machine-readable code used in responses and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "VALIDATION_FAILED",
            OrderError::AddressNotFound { .. } => "ADDRESS_NOT_FOUND",
            OrderError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            OrderError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrderError::CouponNotFound { .. } => "COUPON_NOT_FOUND",
            OrderError::CouponExpired { .. } => "COUPON_EXPIRED",
            OrderError::CouponThresholdNotMet { .. } => "COUPON_THRESHOLD_NOT_MET",
            OrderError::CouponExhausted { .. } => "COUPON_EXHAUSTED",
            OrderError::InvalidOrderState { .. } => "INVALID_ORDER_STATE",
            OrderError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            OrderError::Database(_) => "DATABASE_ERROR",
            OrderError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors the caller can act on; false for infrastructure failures
    pub fn is_business(&self) -> bool {
        !matches!(self, OrderError::Database(_) | OrderError::Internal(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::AddressNotFound { .. } | OrderError::OrderNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            OrderError::ProductUnavailable { .. }
            | OrderError::CouponNotFound { .. }
            | OrderError::CouponExpired { .. }
            | OrderError::CouponThresholdNotMet { .. }
            | OrderError::CouponExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            OrderError::InsufficientStock { .. } | OrderError::InvalidOrderState { .. } => {
                StatusCode::CONFLICT
            }
            OrderError::Database(_) | OrderError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let code = self.code();

        let body = match &self {
            OrderError::Validation(msg) => ErrorResponse::new(code, msg.clone()),

            OrderError::AddressNotFound { address_id } => ErrorResponse::with_details(
                code,
                self.to_string(),
                json!({ "address_id": address_id }),
            ),

            OrderError::OrderNotFound { order_id } => {
                ErrorResponse::with_details(code, self.to_string(), json!({ "order_id": order_id }))
            }

            OrderError::ProductUnavailable { product_id, sku_id } => ErrorResponse::with_details(
                code,
                self.to_string(),
                json!({ "product_id": product_id, "sku_id": sku_id }),
            ),

            // stock ran out, possibly to a concurrent order
            OrderError::InsufficientStock {
                product_id,
                sku_id,
                available,
                requested,
            } => ErrorResponse::with_details(
                code,
                self.to_string(),
                json!({
                    "product_id": product_id,
                    "sku_id": sku_id,
                    "available": available,
                    "requested": requested,
                }),
            ),

            OrderError::CouponNotFound { coupon_id }
            | OrderError::CouponExpired { coupon_id }
            | OrderError::CouponExhausted { coupon_id } => {
                ErrorResponse::with_details(code, self.to_string(), json!({ "coupon_id": coupon_id }))
            }

            OrderError::CouponThresholdNotMet {
                coupon_id,
                min_amount,
                order_amount,
            } => ErrorResponse::with_details(
                code,
                self.to_string(),
                json!({
                    "coupon_id": coupon_id,
                    "min_amount": min_amount,
                    "order_amount": order_amount,
                }),
            ),

            OrderError::InvalidOrderState { order_id, status } => ErrorResponse::with_details(
                code,
                self.to_string(),
                json!({ "order_id": order_id, "status": status }),
            ),

            // Don't expose storage details to clients
            OrderError::Database(_) => ErrorResponse::new(code, "A database error occurred"),

            OrderError::Internal(_) => ErrorResponse::new(code, "An internal error occurred"),
        };

        if self.is_business() {
            tracing::warn!(error_code = code, error = %self, "Request rejected");
        } else {
            tracing::error!(error_code = code, error = %self, "Request failed");
        }

        (self.status_code(), Json(body)).into_response()
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<anyhow::Error> for OrderError {
    fn from(err: anyhow::Error) -> Self {
        OrderError::Internal(err.to_string())
    }
}
