// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the order service.
//
// METRIC TYPES USED:
// - Counter: orders created/cancelled, rejections, stock and coupon outcomes
// - Histogram: HTTP latency and end-to-end workflow latency
//
// The recording helpers are no-ops until `setup_metrics()` installs the
// global recorder, so workflows can call them freely in tests.
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

pub const ORDERS_CREATED_TOTAL: &str = "orders_created_total";

pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";

/// Labels: workflow, reason (error code)
pub const ORDER_REJECTIONS_TOTAL: &str = "order_rejections_total";

/// Labels: outcome (success/insufficient)
pub const STOCK_DEDUCTIONS_TOTAL: &str = "stock_deductions_total";

/// Labels: outcome (consumed/rolled_back/rejected)
pub const COUPON_REDEMPTIONS_TOTAL: &str = "coupon_redemptions_total";

/// Labels: workflow (create/cancel/pay/ship/confirm/delete)
pub const ORDER_WORKFLOW_DURATION_SECONDS: &str = "order_workflow_duration_seconds";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Install the Prometheus recorder and return the render handle
///
/// Both latency histograms share the 1ms..10s buckets; every metric gets a
/// description so `/metrics` carries HELP lines.
///
/// # Returns
/// * `PrometheusHandle` - Renders the registry in Prometheus text format
///
/// # Example
/// ```
/// let handle = setup_metrics()?;
/// let body = handle.render();
/// ```
pub fn setup_metrics() -> Result<PrometheusHandle> {
    // 1ms .. 10s
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(ORDER_WORKFLOW_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(ORDERS_CREATED_TOTAL, "Orders successfully created");
    describe_counter!(ORDERS_CANCELLED_TOTAL, "Orders successfully cancelled");
    describe_counter!(
        ORDER_REJECTIONS_TOTAL,
        "Order workflow invocations aborted, by error code"
    );
    describe_counter!(
        STOCK_DEDUCTIONS_TOTAL,
        "Conditional stock deductions by outcome"
    );
    describe_counter!(COUPON_REDEMPTIONS_TOTAL, "Coupon consumption and rollback outcomes");
    describe_histogram!(
        ORDER_WORKFLOW_DURATION_SECONDS,
        "End-to-end order workflow latency in seconds"
    );

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record an HTTP request
///
/// # Arguments
/// * `method` - HTTP method (GET, POST, DELETE)
/// * `endpoint` - Route template (/api/v1/orders/:id), never the raw path
/// * `status` - Response status code actually returned (201, 409, 500)
/// * `duration_secs` - Handler duration in seconds
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Count one committed order
pub fn record_order_created() {
    counter!(ORDERS_CREATED_TOTAL).increment(1);
}

pub fn record_order_cancelled() {
    counter!(ORDERS_CANCELLED_TOTAL).increment(1);
}

/// Record a workflow that ended in an error
///
/// # Arguments
/// * `workflow` - create, cancel, pay, ship, confirm or delete
/// * `reason` - Stable error code (INSUFFICIENT_STOCK, COUPON_EXPIRED, ...)
pub fn record_order_rejected(workflow: &'static str, reason: &'static str) {
    counter!(
        ORDER_REJECTIONS_TOTAL,
        "workflow" => workflow,
        "reason" => reason
    )
    .increment(1);
}

/// Record the outcome of one conditional stock decrement
///
/// # Arguments
/// * `success` - `false` when the guard refused the decrement
pub fn record_stock_deduction(success: bool) {
    let outcome = if success { "success" } else { "insufficient" };
    counter!(STOCK_DEDUCTIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// # Arguments
/// * `outcome` - consumed, rolled_back or rejected
pub fn record_coupon_redemption(outcome: &'static str) {
    counter!(COUPON_REDEMPTIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record end-to-end latency of a workflow, successful or not
///
/// # Arguments
/// * `workflow` - Same label values as `record_order_rejected`
/// * `duration_secs` - Time from entry to commit or abort, in seconds
pub fn record_workflow_duration(workflow: &'static str, duration_secs: f64) {
    histogram!(ORDER_WORKFLOW_DURATION_SECONDS, "workflow" => workflow).record(duration_secs);
}
