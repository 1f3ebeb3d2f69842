use std::time::Instant;

use chrono::Utc;

use super::{observe, OrderService};
use crate::coupon::CouponRedeemer;
use crate::error::{OrderError, OrderResult};
use crate::ledger::StockLedger;
use crate::metrics;
use crate::models::{CancelOrderRequest, Order, OrderStatus};
use crate::store::StatusChange;
use crate::validators::validate_cancel_request;

const DEFAULT_CANCEL_REASON: &str = "cancelled by user";

impl OrderService {
    /// Cancel an unpaid order: restore its stock and return its coupon.
    pub async fn cancel_order(&self, req: &CancelOrderRequest) -> OrderResult<Order> {
        let start = Instant::now();

        tracing::info!(order_id = %req.order_id, user_id = %req.user_id, "Cancelling order");

        let result = self.try_cancel(req).await;
        observe("cancel", start, &result);

        match &result {
            Ok(order) => {
                metrics::record_order_cancelled();
                tracing::info!(order_id = %order.id, order_no = %order.order_no, "Order cancelled");
            }
            Err(e) => {
                tracing::warn!(order_id = %req.order_id, error = %e, "Order cancellation refused");
            }
        }

        result
    }

    async fn try_cancel(&self, req: &CancelOrderRequest) -> OrderResult<Order> {
        validate_cancel_request(req)?;

        let not_found = || OrderError::OrderNotFound {
            order_id: req.order_id,
        };

        let mut tx = self.store.begin().await?;

        let order = tx
            .find_order(req.order_id)
            .await?
            .filter(|o| o.user_id == req.user_id)
            .ok_or_else(not_found)?;

        if order.status != OrderStatus::AwaitingPayment {
            return Err(OrderError::InvalidOrderState {
                order_id: order.id,
                status: order.status,
            });
        }

        let reason = match req.reason.trim() {
            "" => DEFAULT_CANCEL_REASON.to_string(),
            reason => reason.to_string(),
        };

        // The status flip is the guard: only one canceller can win it, so
        // stock and coupon are restored at most once.
        let changed = tx
            .transition_order(&StatusChange {
                order_id: order.id,
                user_id: Some(req.user_id),
                from: OrderStatus::AwaitingPayment,
                to: OrderStatus::Cancelled,
                at: Utc::now(),
                reason: Some(reason),
            })
            .await?;

        if !changed {
            let status = tx
                .find_order(order.id)
                .await?
                .map(|o| o.status)
                .ok_or_else(not_found)?;
            return Err(OrderError::InvalidOrderState {
                order_id: order.id,
                status,
            });
        }

        for item in tx.find_order_items(order.id).await? {
            StockLedger::restore(tx.as_mut(), item.stock_ref(), item.quantity).await?;
        }

        if let Some(coupon_id) = order.coupon_id {
            CouponRedeemer::rollback(tx.as_mut(), req.user_id, coupon_id, order.id).await?;
        }

        let cancelled = tx.find_order(order.id).await?.ok_or_else(not_found)?;

        tx.commit().await?;

        Ok(cancelled)
    }
}
