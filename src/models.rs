// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures shared by the workflows, the storage layer and the HTTP
// handlers.
//
// NOTES:
// - All money is stored as i64 minor currency units (cents). No floats.
// - Enums are persisted as snake_case text; `as_str()` / `FromStr` are the
//   single source of truth for that mapping.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// ORDER STATUS
// =============================================================================
// AwaitingPayment -> AwaitingShipment -> AwaitingReceipt -> Completed
//        \
//         -> Cancelled
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    AwaitingShipment,
    AwaitingReceipt,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::AwaitingShipment => "awaiting_shipment",
            OrderStatus::AwaitingReceipt => "awaiting_receipt",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Orders in a terminal state may be soft-deleted by their owner.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(OrderStatus::AwaitingPayment),
            "awaiting_shipment" => Ok(OrderStatus::AwaitingShipment),
            "awaiting_receipt" => Ok(OrderStatus::AwaitingReceipt),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

// =============================================================================
// ORDER
// =============================================================================
/// A user's checkout. Never physically deleted; `deleted_at` hides it.
///
/// Invariants at every commit:
/// - `total_amount == Σ items.total_price`
/// - `pay_amount == max(0, total_amount + freight_amount - discount_amount)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Human-facing order number, unique at the storage layer
    pub order_no: String,

    pub user_id: Uuid,
    pub status: OrderStatus,

    pub total_amount: i64,
    pub pay_amount: i64,
    pub freight_amount: i64,
    pub discount_amount: i64,

    /// Coupon definition applied to this order, if any
    pub coupon_id: Option<Uuid>,

    /// The user's coupon instance consumed by this order
    pub user_coupon_id: Option<Uuid>,

    // Receiver snapshot, copied from the address at creation time
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub receiver_region: String,

    pub remark: Option<String>,

    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ORDER ITEM
// =============================================================================
/// One line of an order. The product fields are a point-in-time snapshot
/// and are never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub sku_id: Option<Uuid>,

    pub product_name: String,
    pub sku_name: Option<String>,
    pub product_image: Option<String>,
    pub specs: Option<String>,

    pub unit_price: i64,
    pub quantity: i32,

    /// unit_price * quantity
    pub total_price: i64,

    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn stock_ref(&self) -> StockRef {
        StockRef::new(self.product_id, self.sku_id)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// CATALOGUE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,

    /// Merchant-facing unique code, e.g. "PRD-LAPTOP-001"
    pub code: String,

    pub name: String,
    pub image: Option<String>,
    pub price: i64,

    /// Sellable units. Never negative.
    pub stock: i32,

    /// Units sold through orders that were not cancelled
    pub sales: i32,

    /// Off-sale products cannot be ordered
    pub on_sale: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable variant of a product with its own price and stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductSku {
    pub id: Uuid,
    pub product_id: Uuid,
    pub code: String,
    pub name: String,

    /// Human-readable variant description, e.g. "Color: Black; Size: 42"
    pub specs: Option<String>,

    pub image: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifies the stock counter an order line draws from.
///
/// Lines with a SKU draw from the SKU; lines without one draw from the
/// product itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockRef {
    Product(Uuid),
    Sku { product_id: Uuid, sku_id: Uuid },
}

impl StockRef {
    pub fn new(product_id: Uuid, sku_id: Option<Uuid>) -> Self {
        match sku_id {
            Some(sku_id) => StockRef::Sku { product_id, sku_id },
            None => StockRef::Product(product_id),
        }
    }

    pub fn product_id(&self) -> Uuid {
        match self {
            StockRef::Product(id) => *id,
            StockRef::Sku { product_id, .. } => *product_id,
        }
    }

    pub fn sku_id(&self) -> Option<Uuid> {
        match self {
            StockRef::Product(_) => None,
            StockRef::Sku { sku_id, .. } => Some(*sku_id),
        }
    }
}

impl fmt::Display for StockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockRef::Product(id) => write!(f, "product {}", id),
            StockRef::Sku { product_id, sku_id } => {
                write!(f, "product {} sku {}", product_id, sku_id)
            }
        }
    }
}

// =============================================================================
// COUPONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// `value` is subtracted from the order amount
    Flat,

    /// `value` is the percentage of the order amount the customer keeps
    /// paying: 90 means "pay 90%", so the discount is 10% of the amount.
    Percentage,

    /// Same arithmetic as `Flat`; kept distinct for reporting
    Fixed,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Flat => "flat",
            CouponType::Percentage => "percentage",
            CouponType::Fixed => "fixed",
        }
    }
}

impl FromStr for CouponType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(CouponType::Flat),
            "percentage" => Ok(CouponType::Percentage),
            "fixed" => Ok(CouponType::Fixed),
            other => Err(format!("unknown coupon type: {}", other)),
        }
    }
}

/// A reusable discount definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub coupon_type: CouponType,
    pub value: i64,

    /// Order amount required before the coupon applies
    pub min_amount: i64,

    /// Cap on the computed discount; 0 means uncapped
    pub max_discount: i64,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// `used_quantity <= total_quantity` always holds
    pub total_quantity: i32,
    pub used_quantity: i32,

    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCouponStatus {
    Unused,
    Used,
    Expired,
}

impl UserCouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserCouponStatus::Unused => "unused",
            UserCouponStatus::Used => "used",
            UserCouponStatus::Expired => "expired",
        }
    }
}

impl FromStr for UserCouponStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unused" => Ok(UserCouponStatus::Unused),
            "used" => Ok(UserCouponStatus::Used),
            "expired" => Ok(UserCouponStatus::Expired),
            other => Err(format!("unknown user coupon status: {}", other)),
        }
    }
}

/// One user's claimed, single-use instance of a coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCoupon {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coupon_id: Uuid,
    pub status: UserCouponStatus,

    /// Order that consumed this instance, while `status == Used`
    pub order_id: Option<Uuid>,

    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ADDRESS & CART
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub receiver_name: String,
    pub receiver_phone: String,

    /// Province / state; drives the freight tier
    pub region: String,

    pub city: String,
    pub district: String,
    pub detail: String,
}

impl Address {
    /// Single-line postal address stored on the order
    pub fn full_address(&self) -> String {
        [&self.region, &self.city, &self.district, &self.detail]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub sku_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn stock_ref(&self) -> StockRef {
        StockRef::new(self.product_id, self.sku_id)
    }
}

// =============================================================================
// API REQUEST/RESPONSE STRUCTURES
// =============================================================================

// -----------------------------------------------------------------------------
// CREATE ORDER REQUEST
// -----------------------------------------------------------------------------
/// Request body for creating an order
///
/// # Example JSON
/// ```json
/// {
///   "user_id": "3f0c...",
///   "address_id": "9a1e...",
///   "items": [{ "product_id": "77b2...", "sku_id": null, "quantity": 2 }],
///   "coupon_id": "c41d..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub items: Vec<OrderLineRequest>,

    #[serde(default)]
    pub coupon_id: Option<Uuid>,

    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,

    #[serde(default)]
    pub sku_id: Option<Uuid>,

    pub quantity: i32,
}

impl OrderLineRequest {
    pub fn stock_ref(&self) -> StockRef {
        StockRef::new(self.product_id, self.sku_id)
    }
}

// -----------------------------------------------------------------------------
// CANCEL ORDER REQUEST
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
}

/// Body of `POST /api/v1/orders/:id/cancel`
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderBody {
    pub user_id: Uuid,

    #[serde(default)]
    pub reason: String,
}

/// Body of the owner-side lifecycle endpoints (pay, confirm)
#[derive(Debug, Clone, Deserialize)]
pub struct UserActionBody {
    pub user_id: Uuid,
}

/// `?user_id=` query parameter for reads and deletes
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

// -----------------------------------------------------------------------------
// FREIGHT QUOTE
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct FreightQuoteParams {
    pub region: String,
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreightQuoteResponse {
    pub region: String,
    pub subtotal: i64,
    pub freight: i64,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional structured details (product id, amounts, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
