//! Route table.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::middleware::{cors_layer, options_no_content};
use super::types::{ServerState, MAX_REQUEST_BODY_SIZE};
use crate::handlers;

/// Create the router with pre-initialized state.
pub fn create_router_with_state(state: ServerState) -> Router {
    Router::new()
        // Service
        .route("/health", get(handlers::basic::health_handler))
        .route("/devices", get(handlers::devices::list_connected_handler))
        // Device lifecycle
        .route("/scan", get(handlers::devices::scan_handler))
        .route("/connect/", get(handlers::devices::missing_address_handler))
        .route("/connect/:address", get(handlers::devices::connect_handler))
        .route("/disconnect/", get(handlers::devices::missing_address_handler))
        .route(
            "/disconnect/:address",
            get(handlers::devices::disconnect_handler),
        )
        // Commands
        .route("/list", get(handlers::commands::list_commands_handler))
        .route("/cmd/*command", post(handlers::commands::command_handler))
        .fallback(handlers::basic::not_found_handler)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(middleware::from_fn(options_no_content))
        .with_state(state)
}
