// =============================================================================
// ORDER WORKFLOWS
// =============================================================================
// `OrderService` runs each business operation as one store transaction:
//
// - create.rs     address -> items/price -> coupon -> freight -> persist
//                 -> stock -> cart, then commit
// - cancel.rs     AwaitingPayment -> Cancelled, restore stock, return coupon
// - lifecycle.rs  pay / ship / confirm receipt / soft delete / lookup
//
// Errors are returned unchanged; nothing is retried here. An early return
// drops the transaction, which rolls back everything done so far.
// =============================================================================

mod cancel;
mod create;
mod lifecycle;

use std::sync::Arc;
use std::time::Instant;

use crate::error::OrderResult;
use crate::freight::FreightCalculator;
use crate::metrics;
use crate::store::Store;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    freight: FreightCalculator,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, freight: FreightCalculator) -> Self {
        Self { store, freight }
    }

    pub fn freight(&self) -> &FreightCalculator {
        &self.freight
    }

    pub async fn ping(&self) -> bool {
        self.store.ping().await
    }
}

/// Record duration and, on failure, the rejection reason of a workflow run
fn observe<T>(workflow: &'static str, start: Instant, result: &OrderResult<T>) {
    metrics::record_workflow_duration(workflow, start.elapsed().as_secs_f64());
    if let Err(e) = result {
        metrics::record_order_rejected(workflow, e.code());
    }
}
