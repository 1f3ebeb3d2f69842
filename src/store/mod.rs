// =============================================================================
// STORE MODULE
// =============================================================================
// The storage boundary of the order workflows.
//
// A workflow opens one `StoreTx`, performs every read and write through it,
// and calls `commit()`. Dropping a transaction without committing rolls all
// of its effects back, so any `?` inside a workflow aborts the whole unit.
//
// Every guarded mutation returns `bool`: `true` when the guard held and the
// row changed, `false` when zero rows matched. The guard is evaluated by the
// write itself (compare-and-set), never by a preceding read.
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrderResult;
use crate::models::{
    Address, CartItem, Coupon, Order, OrderItem, OrderStatus, Product, ProductSku, StockRef,
    UserCoupon,
};

#[cfg(test)]
pub mod memory;

/// Factory for transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> OrderResult<Box<dyn StoreTx>>;

    /// Cheap connectivity check for the readiness endpoint
    async fn ping(&self) -> bool;
}

/// Conditional status change of one order.
///
/// Applies only if the order is still in `from`, is owned by `user_id`
/// (when given) and is not soft-deleted. Stamps the timestamp column(s)
/// that belong to `to`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// One atomic unit of work against the store.
#[async_trait]
pub trait StoreTx: Send {
    // -------------------------------------------------------------------------
    // ADDRESSES
    // -------------------------------------------------------------------------
    async fn find_address(&mut self, user_id: Uuid, address_id: Uuid)
        -> OrderResult<Option<Address>>;

    // -------------------------------------------------------------------------
    // CATALOGUE & STOCK
    // -------------------------------------------------------------------------
    async fn find_product(&mut self, product_id: Uuid) -> OrderResult<Option<Product>>;

    async fn find_sku(&mut self, sku_id: Uuid) -> OrderResult<Option<ProductSku>>;

    async fn current_stock(&mut self, item: StockRef) -> OrderResult<Option<i32>>;

    /// `stock -= quantity` only where `stock >= quantity`
    async fn deduct_stock(&mut self, item: StockRef, quantity: i32) -> OrderResult<bool>;

    /// `stock += quantity`; false only if the row does not exist
    async fn restore_stock(&mut self, item: StockRef, quantity: i32) -> OrderResult<bool>;

    // -------------------------------------------------------------------------
    // COUPONS
    // -------------------------------------------------------------------------
    async fn find_coupon(&mut self, coupon_id: Uuid) -> OrderResult<Option<Coupon>>;

    async fn find_unused_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
    ) -> OrderResult<Option<UserCoupon>>;

    async fn find_used_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> OrderResult<Option<UserCoupon>>;

    /// Picks the user's oldest unused instance and flips it Unused -> Used
    /// for `order_id` in one step. Instances claimed by concurrent
    /// transactions are skipped; `None` means none is left to claim.
    async fn claim_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> OrderResult<Option<UserCoupon>>;

    /// Used -> Unused, only where the instance is currently used
    async fn mark_user_coupon_unused(&mut self, user_coupon_id: Uuid) -> OrderResult<bool>;

    /// `used_quantity += 1` only where `used_quantity < total_quantity`
    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> OrderResult<bool>;

    /// `used_quantity -= 1` only where `used_quantity > 0`
    async fn decrement_coupon_usage(&mut self, coupon_id: Uuid) -> OrderResult<bool>;

    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------
    async fn insert_order(&mut self, order: &Order) -> OrderResult<()>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> OrderResult<()>;

    /// Soft-deleted orders are never returned
    async fn find_order(&mut self, order_id: Uuid) -> OrderResult<Option<Order>>;

    async fn find_order_items(&mut self, order_id: Uuid) -> OrderResult<Vec<OrderItem>>;

    async fn transition_order(&mut self, change: &StatusChange) -> OrderResult<bool>;

    /// Sets `deleted_at` on a terminal order owned by `user_id`
    async fn soft_delete_order(
        &mut self,
        order_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> OrderResult<bool>;

    // -------------------------------------------------------------------------
    // CART
    // -------------------------------------------------------------------------
    /// Hard-deletes the user's cart lines matching `items`; returns the
    /// removed lines
    async fn remove_cart_items(
        &mut self,
        user_id: Uuid,
        items: &[StockRef],
    ) -> OrderResult<Vec<CartItem>>;

    // -------------------------------------------------------------------------
    // COMPLETION
    // -------------------------------------------------------------------------
    async fn commit(self: Box<Self>) -> OrderResult<()>;
}
