//! In-memory store used by the unit tests.
//!
//! Transactions share one state and take its lock for a single operation at
//! a time, so several transactions can be open and interleave the way
//! concurrent database sessions do. Every operation yields to the scheduler
//! first, standing in for the round trip to the database; a read and a later
//! write by the same transaction can be separated by other transactions'
//! writes.
//!
//! Guarded writes check their guard and apply under the same lock. Each
//! write records its inverse; dropping an uncommitted transaction replays
//! those in reverse order, `commit()` discards them.
//!
//! Writes are visible to other transactions before commit. Where PostgreSQL
//! would block on the row lock, a guard here sees the pending value and may
//! refuse a write that would succeed after a rollback; it never admits one
//! the guard forbids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{StatusChange, Store, StoreTx};
use crate::error::{OrderError, OrderResult};
use crate::models::{
    Address, CartItem, Coupon, Order, OrderItem, OrderStatus, Product, ProductSku, StockRef,
    UserCoupon, UserCouponStatus,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub addresses: HashMap<Uuid, Address>,
    pub products: HashMap<Uuid, Product>,
    pub skus: HashMap<Uuid, ProductSku>,
    pub coupons: HashMap<Uuid, Coupon>,
    pub user_coupons: HashMap<Uuid, UserCoupon>,
    pub orders: HashMap<Uuid, Order>,
    pub order_items: Vec<OrderItem>,
    pub cart: Vec<CartItem>,
}

type Undo = Box<dyn FnOnce(&mut MemoryState) + Send + Sync>;

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current shared state, for assertions
    pub async fn snapshot(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    /// Direct edit of the shared state, for test setup
    pub fn seed(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut lock(&self.state));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> OrderResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(),
            undo: Vec::new(),
        }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

pub struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    undo: Vec<Undo>,
}

impl MemoryTx {
    /// Run one operation against the shared state
    async fn op<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        tokio::task::yield_now().await;
        f(&mut lock(&self.state))
    }

    fn on_rollback(&mut self, undo: impl FnOnce(&mut MemoryState) + Send + Sync + 'static) {
        self.undo.push(Box::new(undo));
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        let mut state = lock(&self.state);
        while let Some(undo) = self.undo.pop() {
            undo(&mut state);
        }
    }
}

fn stock_mut(state: &mut MemoryState, item: StockRef) -> Option<&mut i32> {
    match item {
        StockRef::Product(id) => state.products.get_mut(&id).map(|p| &mut p.stock),
        StockRef::Sku { sku_id, .. } => state.skus.get_mut(&sku_id).map(|s| &mut s.stock),
    }
}

/// Moves stock by `delta` and sales by `-delta`
fn shift_stock(state: &mut MemoryState, item: StockRef, delta: i32) {
    if let Some(stock) = stock_mut(state, item) {
        *stock += delta;
    }
    if let Some(product) = state.products.get_mut(&item.product_id()) {
        product.sales = (product.sales - delta).max(0);
    }
}

fn apply_status_change(order: &mut Order, change: &StatusChange) {
    order.status = change.to;
    order.updated_at = change.at;
    match change.to {
        OrderStatus::AwaitingPayment => {}
        OrderStatus::AwaitingShipment => order.paid_at = Some(change.at),
        OrderStatus::AwaitingReceipt => order.shipped_at = Some(change.at),
        OrderStatus::Completed => {
            order.delivered_at = Some(change.at);
            order.finished_at = Some(change.at);
        }
        OrderStatus::Cancelled => {
            order.cancelled_at = Some(change.at);
            order.cancel_reason = change.reason.clone();
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_address(
        &mut self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> OrderResult<Option<Address>> {
        Ok(self
            .op(|s| {
                s.addresses
                    .get(&address_id)
                    .filter(|a| a.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn find_product(&mut self, product_id: Uuid) -> OrderResult<Option<Product>> {
        Ok(self.op(|s| s.products.get(&product_id).cloned()).await)
    }

    async fn find_sku(&mut self, sku_id: Uuid) -> OrderResult<Option<ProductSku>> {
        Ok(self.op(|s| s.skus.get(&sku_id).cloned()).await)
    }

    async fn current_stock(&mut self, item: StockRef) -> OrderResult<Option<i32>> {
        Ok(self.op(|s| stock_mut(s, item).map(|stock| *stock)).await)
    }

    async fn deduct_stock(&mut self, item: StockRef, quantity: i32) -> OrderResult<bool> {
        let applied = self
            .op(|s| match stock_mut(s, item).map(|stock| *stock) {
                Some(stock) if stock >= quantity => {
                    shift_stock(s, item, -quantity);
                    true
                }
                _ => false,
            })
            .await;
        if applied {
            self.on_rollback(move |s| shift_stock(s, item, quantity));
        }
        Ok(applied)
    }

    async fn restore_stock(&mut self, item: StockRef, quantity: i32) -> OrderResult<bool> {
        let applied = self
            .op(|s| {
                if stock_mut(s, item).is_none() {
                    return false;
                }
                shift_stock(s, item, quantity);
                true
            })
            .await;
        if applied {
            self.on_rollback(move |s| shift_stock(s, item, -quantity));
        }
        Ok(applied)
    }

    async fn find_coupon(&mut self, coupon_id: Uuid) -> OrderResult<Option<Coupon>> {
        Ok(self.op(|s| s.coupons.get(&coupon_id).cloned()).await)
    }

    async fn find_unused_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
    ) -> OrderResult<Option<UserCoupon>> {
        Ok(self
            .op(|s| {
                s.user_coupons
                    .values()
                    .filter(|uc| {
                        uc.user_id == user_id
                            && uc.coupon_id == coupon_id
                            && uc.status == UserCouponStatus::Unused
                    })
                    .min_by_key(|uc| uc.created_at)
                    .cloned()
            })
            .await)
    }

    async fn find_used_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> OrderResult<Option<UserCoupon>> {
        Ok(self
            .op(|s| {
                s.user_coupons
                    .values()
                    .find(|uc| {
                        uc.user_id == user_id
                            && uc.coupon_id == coupon_id
                            && uc.status == UserCouponStatus::Used
                            && uc.order_id == Some(order_id)
                    })
                    .cloned()
            })
            .await)
    }

    async fn claim_user_coupon(
        &mut self,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> OrderResult<Option<UserCoupon>> {
        let claimed = self
            .op(|s| {
                let uc = s
                    .user_coupons
                    .values_mut()
                    .filter(|uc| {
                        uc.user_id == user_id
                            && uc.coupon_id == coupon_id
                            && uc.status == UserCouponStatus::Unused
                    })
                    .min_by_key(|uc| uc.created_at)?;
                uc.status = UserCouponStatus::Used;
                uc.order_id = Some(order_id);
                uc.used_at = Some(used_at);
                Some(uc.clone())
            })
            .await;

        if let Some(uc) = &claimed {
            let id = uc.id;
            self.on_rollback(move |s| {
                if let Some(uc) = s.user_coupons.get_mut(&id) {
                    uc.status = UserCouponStatus::Unused;
                    uc.order_id = None;
                    uc.used_at = None;
                }
            });
        }
        Ok(claimed)
    }

    async fn mark_user_coupon_unused(&mut self, user_coupon_id: Uuid) -> OrderResult<bool> {
        let previous = self
            .op(|s| match s.user_coupons.get_mut(&user_coupon_id) {
                Some(uc) if uc.status == UserCouponStatus::Used => {
                    let previous = (uc.order_id, uc.used_at);
                    uc.status = UserCouponStatus::Unused;
                    uc.order_id = None;
                    uc.used_at = None;
                    Some(previous)
                }
                _ => None,
            })
            .await;

        let Some((order_id, used_at)) = previous else {
            return Ok(false);
        };
        self.on_rollback(move |s| {
            if let Some(uc) = s.user_coupons.get_mut(&user_coupon_id) {
                uc.status = UserCouponStatus::Used;
                uc.order_id = order_id;
                uc.used_at = used_at;
            }
        });
        Ok(true)
    }

    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> OrderResult<bool> {
        let applied = self
            .op(|s| match s.coupons.get_mut(&coupon_id) {
                Some(c) if c.used_quantity < c.total_quantity => {
                    c.used_quantity += 1;
                    true
                }
                _ => false,
            })
            .await;
        if applied {
            self.on_rollback(move |s| {
                if let Some(c) = s.coupons.get_mut(&coupon_id) {
                    c.used_quantity -= 1;
                }
            });
        }
        Ok(applied)
    }

    async fn decrement_coupon_usage(&mut self, coupon_id: Uuid) -> OrderResult<bool> {
        let applied = self
            .op(|s| match s.coupons.get_mut(&coupon_id) {
                Some(c) if c.used_quantity > 0 => {
                    c.used_quantity -= 1;
                    true
                }
                _ => false,
            })
            .await;
        if applied {
            self.on_rollback(move |s| {
                if let Some(c) = s.coupons.get_mut(&coupon_id) {
                    c.used_quantity += 1;
                }
            });
        }
        Ok(applied)
    }

    async fn insert_order(&mut self, order: &Order) -> OrderResult<()> {
        let inserted = self
            .op(|s| {
                // Mirrors the UNIQUE constraints on orders.id and orders.order_no
                let duplicate = s.orders.contains_key(&order.id)
                    || s.orders.values().any(|o| o.order_no == order.order_no);
                if !duplicate {
                    s.orders.insert(order.id, order.clone());
                }
                !duplicate
            })
            .await;

        if !inserted {
            return Err(OrderError::Internal(format!(
                "duplicate order number {}",
                order.order_no
            )));
        }
        let id = order.id;
        self.on_rollback(move |s| {
            s.orders.remove(&id);
        });
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> OrderResult<()> {
        let inserted = self
            .op(|s| {
                if !s.orders.contains_key(&item.order_id) {
                    return false;
                }
                s.order_items.push(item.clone());
                true
            })
            .await;

        if !inserted {
            return Err(OrderError::Internal(format!(
                "order item references missing order {}",
                item.order_id
            )));
        }
        let id = item.id;
        self.on_rollback(move |s| s.order_items.retain(|i| i.id != id));
        Ok(())
    }

    async fn find_order(&mut self, order_id: Uuid) -> OrderResult<Option<Order>> {
        Ok(self
            .op(|s| {
                s.orders
                    .get(&order_id)
                    .filter(|o| o.deleted_at.is_none())
                    .cloned()
            })
            .await)
    }

    async fn find_order_items(&mut self, order_id: Uuid) -> OrderResult<Vec<OrderItem>> {
        Ok(self
            .op(|s| {
                s.order_items
                    .iter()
                    .filter(|i| i.order_id == order_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn transition_order(&mut self, change: &StatusChange) -> OrderResult<bool> {
        let previous = self
            .op(|s| match s.orders.get_mut(&change.order_id) {
                Some(order)
                    if order.deleted_at.is_none()
                        && order.status == change.from
                        && change.user_id.map_or(true, |uid| uid == order.user_id) =>
                {
                    let previous = order.clone();
                    apply_status_change(order, change);
                    Some(previous)
                }
                _ => None,
            })
            .await;

        let Some(previous) = previous else {
            return Ok(false);
        };
        self.on_rollback(move |s| {
            s.orders.insert(previous.id, previous);
        });
        Ok(true)
    }

    async fn soft_delete_order(
        &mut self,
        order_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> OrderResult<bool> {
        let previous = self
            .op(|s| match s.orders.get_mut(&order_id) {
                Some(order)
                    if order.deleted_at.is_none()
                        && order.user_id == user_id
                        && order.status.is_terminal() =>
                {
                    let updated_at = order.updated_at;
                    order.deleted_at = Some(at);
                    order.updated_at = at;
                    Some(updated_at)
                }
                _ => None,
            })
            .await;

        let Some(updated_at) = previous else {
            return Ok(false);
        };
        self.on_rollback(move |s| {
            if let Some(order) = s.orders.get_mut(&order_id) {
                order.deleted_at = None;
                order.updated_at = updated_at;
            }
        });
        Ok(true)
    }

    async fn remove_cart_items(
        &mut self,
        user_id: Uuid,
        items: &[StockRef],
    ) -> OrderResult<Vec<CartItem>> {
        let removed = self
            .op(|s| {
                let (removed, kept): (Vec<CartItem>, Vec<CartItem>) = std::mem::take(&mut s.cart)
                    .into_iter()
                    .partition(|line| line.user_id == user_id && items.contains(&line.stock_ref()));
                s.cart = kept;
                removed
            })
            .await;

        if !removed.is_empty() {
            let restored = removed.clone();
            self.on_rollback(move |s| s.cart.extend(restored));
        }
        Ok(removed)
    }

    async fn commit(mut self: Box<Self>) -> OrderResult<()> {
        self.undo.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_transactions_can_be_open_together() {
        let fx = Fixture::new();

        let _first = fx.store.begin().await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), fx.store.begin()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_drop_reverts_only_own_writes() {
        let fx = Fixture::new();
        let laptop = StockRef::Product(fx.laptop_id);

        let mut abandoned = fx.store.begin().await.unwrap();
        let mut kept = fx.store.begin().await.unwrap();

        assert!(abandoned.deduct_stock(laptop, 3).await.unwrap());
        assert!(kept.deduct_stock(laptop, 2).await.unwrap());
        let removed = abandoned
            .remove_cart_items(fx.user_id, &[laptop])
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);

        kept.commit().await.unwrap();
        drop(abandoned);

        let state = fx.store.snapshot().await;
        assert_eq!(state.products[&fx.laptop_id].stock, 8);
        assert_eq!(state.products[&fx.laptop_id].sales, 2);
        assert_eq!(state.cart.len(), 4);
    }

    #[tokio::test]
    async fn test_claim_skips_instance_taken_by_open_transaction() {
        let fx = Fixture::new();
        let second = crate::testing::user_coupon(fx.user_id, fx.flat_coupon_id);
        let second_id = second.id;
        fx.store.seed(|s| {
            s.user_coupons.insert(second.id, second);
        });

        let mut tx1 = fx.store.begin().await.unwrap();
        let mut tx2 = fx.store.begin().await.unwrap();

        // both see the same oldest instance
        let seen1 = tx1
            .find_unused_user_coupon(fx.user_id, fx.flat_coupon_id)
            .await
            .unwrap()
            .unwrap();
        let seen2 = tx2
            .find_unused_user_coupon(fx.user_id, fx.flat_coupon_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen1.id, seen2.id);

        let now = Utc::now();
        let claimed1 = tx1
            .claim_user_coupon(fx.user_id, fx.flat_coupon_id, Uuid::new_v4(), now)
            .await
            .unwrap()
            .unwrap();
        let claimed2 = tx2
            .claim_user_coupon(fx.user_id, fx.flat_coupon_id, Uuid::new_v4(), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(claimed1.id, fx.flat_user_coupon_id);
        assert_eq!(claimed2.id, second_id);

        let mut tx3 = fx.store.begin().await.unwrap();
        assert!(tx3
            .claim_user_coupon(fx.user_id, fx.flat_coupon_id, Uuid::new_v4(), now)
            .await
            .unwrap()
            .is_none());
    }
}
