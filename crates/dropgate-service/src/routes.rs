//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, files, health, identity, payments};
use crate::state::AppState;

/// Maximum concurrent requests for the authenticated API.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/files/public/:file_id` - Public file metadata
/// - `GET /v1/files/download/:file_id` - Download (public files need no auth)
///
/// ## Files (JWT auth)
/// - `POST /v1/files/upload` - Credit-gated multipart upload
/// - `GET /v1/files` - List own files
/// - `GET /v1/files/:file_id` - Owned-or-public metadata
/// - `PATCH /v1/files/:file_id/visibility` - Toggle public/private
/// - `DELETE /v1/files/:file_id` - Delete own file
///
/// ## Credits and payments (JWT auth)
/// - `GET /v1/credits/balance` - Current balance
/// - `POST /v1/payments/order` - Create a payment order
/// - `POST /v1/payments/verify` - Verify a payment callback
/// - `GET /v1/payments` - Order history
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/identity` - Identity-provider events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Files
        .route("/files/upload", post(files::upload_files))
        .route("/files", get(files::list_files))
        .route("/files/public/:file_id", get(files::get_public_file))
        .route("/files/download/:file_id", get(files::download_file))
        .route(
            "/files/:file_id",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/files/:file_id/visibility", patch(files::toggle_visibility))
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        // Payments
        .route("/payments/order", post(payments::create_order))
        .route("/payments/verify", post(payments::verify_payment))
        .route("/payments", get(payments::list_orders))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by external services)
        .route("/webhooks/identity", post(identity::identity_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
