// =============================================================================
// ORDER SERVICE - Main Entry Point
// =============================================================================
// Order-processing core of the shop:
// - places orders (pricing, coupons, freight, stock, cart cleanup) atomically
// - cancels unpaid orders and returns their stock and coupon
// - drives the pay / ship / confirm lifecycle
// - exposes Prometheus metrics and health checks
// =============================================================================

mod cart;
mod config;
mod coupon;
mod db;
mod error;
mod freight;
mod handlers;
mod ledger;
mod metrics;
mod models;
mod store;
mod validators;
mod workflow;

#[cfg(test)]
mod testing;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::freight::FreightCalculator;
use crate::metrics::setup_metrics;
use crate::workflow::OrderService;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,

    // Used to render metrics in Prometheus format
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly
    dotenvy::dotenv().ok();

    // RUST_LOG overrides, e.g. RUST_LOG=info,order_service=trace
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,order_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Order Service...");

    let config = Config::from_env()?;
    info!(
        port = config.port,
        free_shipping_threshold = config.freight.free_threshold,
        "Configuration loaded"
    );

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    let db = Database::connect(&config.database_url, config.database_max_connections).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    let state = Arc::new(AppState {
        orders: OrderService::new(Arc::new(db), FreightCalculator::new(config.freight)),
        metrics_handle,
    });

    let app = Router::new()
        // ----- Health & Readiness -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Orders -----
        .route("/api/v1/orders", post(handlers::create_order))
        .route(
            "/api/v1/orders/:id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route("/api/v1/orders/:id/cancel", post(handlers::cancel_order))
        .route("/api/v1/orders/:id/pay", post(handlers::pay_order))
        .route("/api/v1/orders/:id/ship", post(handlers::ship_order))
        .route("/api/v1/orders/:id/confirm", post(handlers::confirm_receipt))
        // ----- Freight -----
        .route("/api/v1/freight/quote", get(handlers::freight_quote))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Order Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
