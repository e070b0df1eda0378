//! HTTP server and route handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::breaker::{BreakerRegistry, CallExecutor};
use crate::config::GatewayConfig;
use crate::orders::{self, ORDERS_DEPENDENCY, OrdersClient};
use crate::Result;

/// Shared application state
pub struct AppState {
    /// Call executor over the breaker registry
    pub executor: CallExecutor,
    /// Downstream orders client
    pub orders: OrdersClient,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user-service/displayOrders", get(display_orders_handler))
        .route("/health", get(health_handler))
        .route("/breakers", get(breakers_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build state from configuration and serve until shutdown
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the listener cannot be
/// bound, or the server fails while running.
pub async fn run(config: GatewayConfig) -> Result<()> {
    let registry = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    for (name, breaker_config) in &config.dependencies {
        registry.configure(name, breaker_config.clone())?;
    }

    let state = Arc::new(AppState {
        executor: CallExecutor::new(Arc::clone(&registry)),
        orders: OrdersClient::new(&config.orders)?,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(host = %config.server.host, port = config.server.port, "Listening");
    info!(orders_url = %config.orders.base_url, "Proxying orders from downstream service");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[derive(Debug, Deserialize)]
struct DisplayOrdersQuery {
    category: Option<String>,
}

/// GET /user-service/displayOrders - fetch orders through the breaker,
/// degrading to the canned catalog when the downstream is unhealthy
async fn display_orders_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DisplayOrdersQuery>,
) -> impl IntoResponse {
    let category = query.category;

    let result = state
        .executor
        .execute(
            ORDERS_DEPENDENCY,
            || state.orders.fetch(category.as_deref()),
            |err| async move {
                warn!(error = %err, "Serving canned order catalog");
                Ok(orders::fallback_orders())
            },
        )
        .await;

    match result {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        // Only a failure of the fallback itself reaches here
        Err(err) => {
            error!(error = %err, "Fallback failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /health - liveness probe
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /breakers - snapshot of every breaker for observability
async fn breakers_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.executor.registry().snapshots())
}
