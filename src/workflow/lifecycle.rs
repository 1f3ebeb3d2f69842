use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::{observe, OrderService};
use crate::error::{OrderError, OrderResult};
use crate::models::{Order, OrderDetail, OrderStatus};
use crate::store::{StatusChange, StoreTx};

impl OrderService {
    /// Order header and lines, visible to the owner only.
    pub async fn get_order(&self, order_id: Uuid, user_id: Uuid) -> OrderResult<OrderDetail> {
        let mut tx = self.store.begin().await?;
        let order = owned_order(tx.as_mut(), order_id, Some(user_id)).await?;
        let items = tx.find_order_items(order_id).await?;
        tx.commit().await?;

        Ok(OrderDetail { order, items })
    }

    /// AwaitingPayment -> AwaitingShipment
    pub async fn pay_order(&self, order_id: Uuid, user_id: Uuid) -> OrderResult<Order> {
        self.advance(
            "pay",
            order_id,
            Some(user_id),
            OrderStatus::AwaitingPayment,
            OrderStatus::AwaitingShipment,
        )
        .await
    }

    /// AwaitingShipment -> AwaitingReceipt. Merchant-side, so no owner check.
    pub async fn ship_order(&self, order_id: Uuid) -> OrderResult<Order> {
        self.advance(
            "ship",
            order_id,
            None,
            OrderStatus::AwaitingShipment,
            OrderStatus::AwaitingReceipt,
        )
        .await
    }

    /// AwaitingReceipt -> Completed
    pub async fn confirm_receipt(&self, order_id: Uuid, user_id: Uuid) -> OrderResult<Order> {
        self.advance(
            "confirm",
            order_id,
            Some(user_id),
            OrderStatus::AwaitingReceipt,
            OrderStatus::Completed,
        )
        .await
    }

    /// Hide a finished order from its owner. Only Completed and Cancelled
    /// orders can be deleted; rows are kept.
    pub async fn delete_order(&self, order_id: Uuid, user_id: Uuid) -> OrderResult<()> {
        let start = Instant::now();
        let result = self.try_delete(order_id, user_id).await;
        observe("delete", start, &result);

        match &result {
            Ok(()) => tracing::info!(order_id = %order_id, "Order deleted"),
            Err(e) => tracing::warn!(order_id = %order_id, error = %e, "Order deletion refused"),
        }

        result
    }

    async fn try_delete(&self, order_id: Uuid, user_id: Uuid) -> OrderResult<()> {
        let mut tx = self.store.begin().await?;
        let order = owned_order(tx.as_mut(), order_id, Some(user_id)).await?;

        if !order.status.is_terminal() {
            return Err(OrderError::InvalidOrderState {
                order_id,
                status: order.status,
            });
        }

        if !tx.soft_delete_order(order_id, user_id, Utc::now()).await? {
            return Err(OrderError::OrderNotFound { order_id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn advance(
        &self,
        workflow: &'static str,
        order_id: Uuid,
        user_id: Option<Uuid>,
        from: OrderStatus,
        to: OrderStatus,
    ) -> OrderResult<Order> {
        let start = Instant::now();
        let result = self.try_advance(order_id, user_id, from, to).await;
        observe(workflow, start, &result);

        match &result {
            Ok(order) => tracing::info!(
                order_id = %order.id,
                order_no = %order.order_no,
                status = %order.status,
                "Order status changed"
            ),
            Err(e) => tracing::warn!(
                order_id = %order_id,
                workflow,
                error = %e,
                "Order status change refused"
            ),
        }

        result
    }

    async fn try_advance(
        &self,
        order_id: Uuid,
        user_id: Option<Uuid>,
        from: OrderStatus,
        to: OrderStatus,
    ) -> OrderResult<Order> {
        let mut tx = self.store.begin().await?;
        let order = owned_order(tx.as_mut(), order_id, user_id).await?;

        if order.status != from {
            return Err(OrderError::InvalidOrderState {
                order_id,
                status: order.status,
            });
        }

        let changed = tx
            .transition_order(&StatusChange {
                order_id,
                user_id,
                from,
                to,
                at: Utc::now(),
                reason: None,
            })
            .await?;

        let current = owned_order(tx.as_mut(), order_id, user_id).await?;
        if !changed {
            return Err(OrderError::InvalidOrderState {
                order_id,
                status: current.status,
            });
        }

        tx.commit().await?;
        Ok(current)
    }
}

/// Foreign orders are reported as missing rather than forbidden.
async fn owned_order(
    tx: &mut dyn StoreTx,
    order_id: Uuid,
    user_id: Option<Uuid>,
) -> OrderResult<Order> {
    tx.find_order(order_id)
        .await?
        .filter(|o| user_id.map_or(true, |uid| uid == o.user_id))
        .ok_or(OrderError::OrderNotFound { order_id })
}
