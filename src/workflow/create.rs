use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{observe, OrderService};
use crate::cart::CartReconciler;
use crate::coupon::CouponRedeemer;
use crate::error::{OrderError, OrderResult};
use crate::ledger::StockLedger;
use crate::metrics;
use crate::models::{CreateOrderRequest, Order, OrderDetail, OrderItem, OrderStatus, StockRef};
use crate::validators::{validate_create_request, AddressValidator, PriceCalculator};

/// `max(0, total + freight - discount)`
pub fn pay_amount(
    total_amount: i64,
    freight_amount: i64,
    discount_amount: i64,
) -> OrderResult<i64> {
    total_amount
        .checked_add(freight_amount)
        .and_then(|gross| gross.checked_sub(discount_amount))
        .map(|amount| amount.max(0))
        .ok_or_else(|| OrderError::Validation("pay amount overflows".into()))
}

/// `YYYYMMDDHHMMSS` followed by six random digits. Collisions are caught by
/// the unique constraint on `orders.order_no`, not here.
pub fn generate_order_no(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().as_u128() % 1_000_000;
    format!("{}{:06}", now.format("%Y%m%d%H%M%S"), suffix)
}

impl OrderService {
    pub async fn create_order(&self, req: &CreateOrderRequest) -> OrderResult<OrderDetail> {
        let start = Instant::now();

        tracing::info!(
            user_id = %req.user_id,
            address_id = %req.address_id,
            lines = req.items.len(),
            coupon_id = ?req.coupon_id,
            "Creating order"
        );

        let result = self.try_create(req).await;
        observe("create", start, &result);

        match &result {
            Ok(detail) => {
                metrics::record_order_created();
                tracing::info!(
                    order_id = %detail.order.id,
                    order_no = %detail.order.order_no,
                    total_amount = detail.order.total_amount,
                    pay_amount = detail.order.pay_amount,
                    "Order created"
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %req.user_id, error = %e, "Order creation aborted");
            }
        }

        result
    }

    async fn try_create(&self, req: &CreateOrderRequest) -> OrderResult<OrderDetail> {
        validate_create_request(req)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let mut tx = self.store.begin().await?;

        // 1. address
        let address = AddressValidator::resolve(tx.as_mut(), req.user_id, req.address_id).await?;

        // 2. items & price
        let priced = PriceCalculator::price_lines(tx.as_mut(), &req.items).await?;

        // 3. coupon
        let redemption = match req.coupon_id {
            Some(coupon_id) => Some(
                CouponRedeemer::validate_and_consume(
                    tx.as_mut(),
                    req.user_id,
                    coupon_id,
                    order_id,
                    priced.total_amount,
                    now,
                )
                .await?,
            ),
            None => None,
        };
        let discount_amount = redemption.as_ref().map_or(0, |r| r.discount_amount);

        // 4. freight
        let freight_amount = self.freight.calculate(&address.region, priced.total_amount)?;

        // 5. persist order and items
        let pay_amount = pay_amount(priced.total_amount, freight_amount, discount_amount)?;
        let order = Order {
            id: order_id,
            order_no: generate_order_no(now),
            user_id: req.user_id,
            status: OrderStatus::AwaitingPayment,
            total_amount: priced.total_amount,
            pay_amount,
            freight_amount,
            discount_amount,
            coupon_id: redemption.as_ref().map(|r| r.coupon_id),
            user_coupon_id: redemption.as_ref().map(|r| r.user_coupon_id),
            receiver_name: address.receiver_name.clone(),
            receiver_phone: address.receiver_phone.clone(),
            receiver_address: address.full_address(),
            receiver_region: address.region.clone(),
            remark: req.remark.clone(),
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            finished_at: None,
            cancelled_at: None,
            cancel_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_order(&order).await?;

        let items: Vec<OrderItem> = priced
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.stock_ref.product_id(),
                sku_id: line.stock_ref.sku_id(),
                product_name: line.product_name.clone(),
                sku_name: line.sku_name.clone(),
                product_image: line.product_image.clone(),
                specs: line.specs.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                total_price: line.total_price,
                created_at: now,
            })
            .collect();
        for item in &items {
            tx.insert_order_item(item).await?;
        }

        // 6. stock; a failed deduction aborts the whole transaction
        for line in &priced.lines {
            StockLedger::deduct(tx.as_mut(), line.stock_ref, line.quantity).await?;
        }

        // 7. cart
        let ordered: Vec<StockRef> = priced.lines.iter().map(|l| l.stock_ref).collect();
        CartReconciler::remove_ordered(tx.as_mut(), req.user_id, &ordered).await?;

        tx.commit().await?;

        Ok(OrderDetail { order, items })
    }
}
