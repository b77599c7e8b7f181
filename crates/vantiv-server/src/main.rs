//! Vantiv HTTP Server
//!
//! Axum-based server exposing the payment gateway, stored payment methods
//! and the settings the browser needs for eProtect tokenization.

mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vantiv_core::{GatewayConfig, MemoryPaymentMethodStore, MemoryPaymentStore};
use vantiv_gateway::{HttpTransactionApi, MockTransactionApi, TransactionApi, TransactionGateway};

use crate::handlers::{
    capture_payment, create_payment, create_payment_method, delete_payment_method,
    eprotect_settings, health_check, payment_operations, refund_payment, void_payment,
};
use crate::state::AppState;

/// Build the application router
fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Browser tokenization
        .route("/api/eprotect/settings", get(eprotect_settings))
        // Payment methods
        .route("/api/payment-methods", post(create_payment_method))
        .route("/api/payment-methods/{id}", delete(delete_payment_method))
        // Payments
        .route("/api/payments", post(create_payment))
        .route("/api/payments/{id}/capture", post(capture_payment))
        .route("/api/payments/{id}/void", post(void_payment))
        .route("/api/payments/{id}/refund", post(refund_payment))
        .route("/api/payments/{id}/operations", get(payment_operations))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = Arc::new(GatewayConfig::from_env().context("loading gateway configuration")?);

    // VANTIV_TRANSPORT=mock answers every transaction locally
    let api: Arc<dyn TransactionApi> = match std::env::var("VANTIV_TRANSPORT").as_deref() {
        Ok("mock") => {
            tracing::warn!("⚠ Using mock transaction API - no money moves");
            Arc::new(MockTransactionApi::new())
        }
        _ => Arc::new(HttpTransactionApi::new(&config).context("building HTTP client")?),
    };
    tracing::info!(
        "✓ Gateway configured ({} mode, endpoint {})",
        config.mode.as_str(),
        config.endpoint()
    );

    let transport = api.name().to_string();
    let gateway = TransactionGateway::new(
        config,
        api,
        Arc::new(MemoryPaymentStore::new()),
        Arc::new(MemoryPaymentMethodStore::new()),
    );
    let state = AppState::new(gateway, &transport);

    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 vantiv-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                        - Health check");
    tracing::info!("  GET    /api/eprotect/settings         - Tokenization form settings");
    tracing::info!("  POST   /api/payment-methods           - Store tokenized card");
    tracing::info!("  DELETE /api/payment-methods/{{id}}      - Delete stored card");
    tracing::info!("  POST   /api/payments                  - Authorize or sell");
    tracing::info!("  POST   /api/payments/{{id}}/capture     - Capture (full or partial)");
    tracing::info!("  POST   /api/payments/{{id}}/void        - Void / reverse");
    tracing::info!("  POST   /api/payments/{{id}}/refund      - Refund");
    tracing::info!("  GET    /api/payments/{{id}}/operations  - Available operations");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
