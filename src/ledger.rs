// =============================================================================
// STOCK LEDGER
// =============================================================================
// Conditional stock decrement / increment for products and SKUs.
//
// `deduct` never reads-then-writes: the store applies
// `stock = stock - n WHERE stock >= n` in one statement, and zero affected
// rows means somebody else got there first. That single statement is the
// only concurrency guard; there is no process-local lock.
// =============================================================================

use crate::error::{OrderError, OrderResult};
use crate::metrics;
use crate::models::StockRef;
use crate::store::StoreTx;

pub struct StockLedger;

impl StockLedger {
    /// Take `quantity` units out of stock, or fail with `InsufficientStock`
    /// without touching the counter.
    pub async fn deduct(tx: &mut dyn StoreTx, item: StockRef, quantity: i32) -> OrderResult<()> {
        if quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "deduction quantity must be positive, got {}",
                quantity
            )));
        }

        if tx.deduct_stock(item, quantity).await? {
            metrics::record_stock_deduction(true);
            tracing::debug!(item = %item, quantity, "Stock deducted");
            return Ok(());
        }

        metrics::record_stock_deduction(false);

        // Only for the error message; the decision was already made above
        let available = match tx.current_stock(item).await? {
            Some(stock) => stock,
            None => {
                return Err(OrderError::ProductUnavailable {
                    product_id: item.product_id(),
                    sku_id: item.sku_id(),
                })
            }
        };

        tracing::warn!(item = %item, quantity, available, "Stock deduction refused");

        Err(OrderError::InsufficientStock {
            product_id: item.product_id(),
            sku_id: item.sku_id(),
            available,
            requested: quantity,
        })
    }

    /// Put `quantity` units back. Only used to reverse a deduction that is
    /// known to have succeeded.
    pub async fn restore(tx: &mut dyn StoreTx, item: StockRef, quantity: i32) -> OrderResult<()> {
        if quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "restore quantity must be positive, got {}",
                quantity
            )));
        }

        if !tx.restore_stock(item, quantity).await? {
            // The row vanished since the order was placed
            return Err(OrderError::Internal(format!(
                "cannot restore stock for missing {}",
                item
            )));
        }

        tracing::debug!(item = %item, quantity, "Stock restored");
        Ok(())
    }
}
