// =============================================================================
// VALIDATORS
// =============================================================================
// Request shape checks, address ownership, and per-line sellability/pricing.
//
// The stock check here is advisory: it gives the caller an early, precise
// error. The authoritative check is the conditional deduction in the ledger.
// =============================================================================

use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::models::{Address, CancelOrderRequest, CreateOrderRequest, OrderLineRequest, StockRef};
use crate::store::StoreTx;

pub const MAX_ORDER_LINES: usize = 100;
pub const MAX_LINE_QUANTITY: i32 = 999;
pub const MAX_TEXT_LEN: usize = 255;

// -----------------------------------------------------------------------------
// REQUEST SHAPE
// -----------------------------------------------------------------------------

/// Rejects malformed create requests before anything touches the store
pub fn validate_create_request(req: &CreateOrderRequest) -> OrderResult<()> {
    if req.user_id.is_nil() {
        return Err(OrderError::Validation("user_id is required".into()));
    }
    if req.address_id.is_nil() {
        return Err(OrderError::Validation("address_id is required".into()));
    }
    if req.items.is_empty() {
        return Err(OrderError::Validation("items must not be empty".into()));
    }
    if req.items.len() > MAX_ORDER_LINES {
        return Err(OrderError::Validation(format!(
            "at most {} lines per order, got {}",
            MAX_ORDER_LINES,
            req.items.len()
        )));
    }

    for (index, line) in req.items.iter().enumerate() {
        if line.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "items[{}].quantity must be positive, got {}",
                index, line.quantity
            )));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(OrderError::Validation(format!(
                "items[{}].quantity exceeds {}",
                index, MAX_LINE_QUANTITY
            )));
        }
    }

    if let Some(remark) = &req.remark {
        if remark.chars().count() > MAX_TEXT_LEN {
            return Err(OrderError::Validation(format!(
                "remark exceeds {} characters",
                MAX_TEXT_LEN
            )));
        }
    }

    Ok(())
}

pub fn validate_cancel_request(req: &CancelOrderRequest) -> OrderResult<()> {
    if req.user_id.is_nil() {
        return Err(OrderError::Validation("user_id is required".into()));
    }
    if req.reason.chars().count() > MAX_TEXT_LEN {
        return Err(OrderError::Validation(format!(
            "reason exceeds {} characters",
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ADDRESS
// -----------------------------------------------------------------------------
pub struct AddressValidator;

impl AddressValidator {
    /// The address, if and only if it belongs to `user_id`
    pub async fn resolve(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        address_id: Uuid,
    ) -> OrderResult<Address> {
        tx.find_address(user_id, address_id)
            .await?
            .ok_or(OrderError::AddressNotFound { address_id })
    }
}

// -----------------------------------------------------------------------------
// ITEMS & PRICE
// -----------------------------------------------------------------------------

/// A sellable, priced order line with its product snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub stock_ref: StockRef,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
    pub product_name: String,
    pub sku_name: Option<String>,
    pub product_image: Option<String>,
    pub specs: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,

    /// Σ lines.total_price
    pub total_amount: i64,
}

pub struct PriceCalculator;

impl PriceCalculator {
    pub async fn price_lines(
        tx: &mut dyn StoreTx,
        lines: &[OrderLineRequest],
    ) -> OrderResult<PricedOrder> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut total_amount: i64 = 0;

        for line in lines {
            let item = Self::price_line(tx, line).await?;
            total_amount = total_amount
                .checked_add(item.total_price)
                .ok_or_else(|| OrderError::Validation("order amount overflows".into()))?;
            priced.push(item);
        }

        Ok(PricedOrder {
            lines: priced,
            total_amount,
        })
    }

    async fn price_line(tx: &mut dyn StoreTx, line: &OrderLineRequest) -> OrderResult<PricedLine> {
        let unavailable = || OrderError::ProductUnavailable {
            product_id: line.product_id,
            sku_id: line.sku_id,
        };

        let product = tx
            .find_product(line.product_id)
            .await?
            .filter(|p| p.on_sale)
            .ok_or_else(unavailable)?;

        let (unit_price, stock, sku_name, image, specs) = match line.sku_id {
            Some(sku_id) => {
                let sku = tx
                    .find_sku(sku_id)
                    .await?
                    .filter(|s| s.enabled && s.product_id == product.id)
                    .ok_or_else(unavailable)?;
                let image = sku.image.or_else(|| product.image.clone());
                (sku.price, sku.stock, Some(sku.name), image, sku.specs)
            }
            None => (product.price, product.stock, None, product.image.clone(), None),
        };

        if line.quantity > stock {
            return Err(OrderError::InsufficientStock {
                product_id: line.product_id,
                sku_id: line.sku_id,
                available: stock,
                requested: line.quantity,
            });
        }

        let total_price = unit_price
            .checked_mul(i64::from(line.quantity))
            .ok_or_else(|| OrderError::Validation("line amount overflows".into()))?;

        Ok(PricedLine {
            stock_ref: line.stock_ref(),
            quantity: line.quantity,
            unit_price,
            total_price,
            product_name: product.name,
            sku_name,
            product_image: image,
            specs,
        })
    }
}
