// =============================================================================
// CART RECONCILER
// =============================================================================
// Removes the cart lines that were folded into a new order. Cart lines are
// hard-deleted; lines for other products stay in the cart.
// =============================================================================

use uuid::Uuid;

use crate::error::OrderResult;
use crate::models::StockRef;
use crate::store::StoreTx;

pub struct CartReconciler;

impl CartReconciler {
    /// Returns how many cart lines were removed. Ordered items that were
    /// never in the cart (e.g. "buy now") are simply not matched.
    pub async fn remove_ordered(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        ordered: &[StockRef],
    ) -> OrderResult<u64> {
        let mut unique: Vec<StockRef> = Vec::with_capacity(ordered.len());
        for item in ordered {
            if !unique.contains(item) {
                unique.push(*item);
            }
        }

        let removed = tx.remove_cart_items(user_id, &unique).await?;
        for line in &removed {
            tracing::debug!(
                user_id = %user_id,
                item = %line.stock_ref(),
                quantity = line.quantity,
                "Cart line removed"
            );
        }
        Ok(removed.len() as u64)
    }
}
