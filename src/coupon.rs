// =============================================================================
// COUPON REDEEMER
// =============================================================================
// Validates a user's coupon against an order amount, computes the discount
// and consumes the coupon instance inside the caller's transaction.
//
// Consumption is two guarded writes:
//   user_coupons: claim oldest unused   (one order per instance)
//   coupons:      used_quantity + 1     (only while below total_quantity)
// Both roll back with the enclosing order transaction.
// =============================================================================

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::metrics;
use crate::models::{Coupon, CouponType};
use crate::store::StoreTx;

/// Outcome of a successful consumption
#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
    pub coupon_id: Uuid,
    pub user_coupon_id: Uuid,
    pub discount_amount: i64,
}

/// Discount granted by `coupon` on `order_amount`, capped at `max_discount`
/// when that is positive. Never negative.
pub fn compute_discount(coupon: &Coupon, order_amount: i64) -> OrderResult<i64> {
    let raw = match coupon.coupon_type {
        CouponType::Flat | CouponType::Fixed => coupon.value,
        // `value` is the percentage kept, see CouponType::Percentage
        CouponType::Percentage => 100_i64
            .checked_sub(coupon.value)
            .and_then(|off| order_amount.checked_mul(off))
            .map(|scaled| scaled / 100)
            .ok_or_else(|| OrderError::Validation("discount amount overflows".into()))?,
    }
    .max(0);

    Ok(if coupon.max_discount > 0 {
        raw.min(coupon.max_discount)
    } else {
        raw
    })
}

pub struct CouponRedeemer;

impl CouponRedeemer {
    /// Validate the user's coupon for `order_amount` and consume one unused
    /// instance of it on behalf of `order_id`.
    pub async fn validate_and_consume(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
        order_amount: i64,
        now: DateTime<Utc>,
    ) -> OrderResult<Redemption> {
        let result =
            Self::try_consume(tx, user_id, coupon_id, order_id, order_amount, now).await;

        match &result {
            Ok(redemption) => {
                metrics::record_coupon_redemption("consumed");
                tracing::info!(
                    user_id = %user_id,
                    coupon_id = %coupon_id,
                    user_coupon_id = %redemption.user_coupon_id,
                    discount = redemption.discount_amount,
                    "Coupon consumed"
                );
            }
            Err(e) => {
                metrics::record_coupon_redemption("rejected");
                tracing::warn!(user_id = %user_id, coupon_id = %coupon_id, error = %e, "Coupon rejected");
            }
        }

        result
    }

    async fn try_consume(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
        order_amount: i64,
        now: DateTime<Utc>,
    ) -> OrderResult<Redemption> {
        if tx.find_unused_user_coupon(user_id, coupon_id).await?.is_none() {
            return Err(OrderError::CouponNotFound { coupon_id });
        }

        let coupon = tx
            .find_coupon(coupon_id)
            .await?
            .ok_or(OrderError::CouponNotFound { coupon_id })?;

        if !coupon.is_active_at(now) {
            return Err(OrderError::CouponExpired { coupon_id });
        }

        if order_amount < coupon.min_amount {
            return Err(OrderError::CouponThresholdNotMet {
                coupon_id,
                min_amount: coupon.min_amount,
                order_amount,
            });
        }

        let discount_amount = compute_discount(&coupon, order_amount)?;

        // Concurrent orders may have used up every instance since the check
        let instance = tx
            .claim_user_coupon(user_id, coupon_id, order_id, now)
            .await?
            .ok_or(OrderError::CouponNotFound { coupon_id })?;

        if !tx.increment_coupon_usage(coupon_id).await? {
            return Err(OrderError::CouponExhausted { coupon_id });
        }

        Ok(Redemption {
            coupon_id,
            user_coupon_id: instance.id,
            discount_amount,
        })
    }

    /// Return the instance consumed by `order_id` to Unused and decrement the
    /// usage counter. Returns `false` (not an error) when nothing was consumed.
    pub async fn rollback(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> OrderResult<bool> {
        let Some(instance) = tx.find_used_user_coupon(user_id, coupon_id, order_id).await? else {
            tracing::debug!(order_id = %order_id, coupon_id = %coupon_id, "No consumed coupon to roll back");
            return Ok(false);
        };

        if !tx.mark_user_coupon_unused(instance.id).await? {
            return Ok(false);
        }

        if !tx.decrement_coupon_usage(coupon_id).await? {
            tracing::warn!(coupon_id = %coupon_id, "Coupon usage counter already at zero");
        }

        metrics::record_coupon_redemption("rolled_back");
        tracing::info!(
            order_id = %order_id,
            coupon_id = %coupon_id,
            user_coupon_id = %instance.id,
            "Coupon returned to user"
        );

        Ok(true)
    }
}
