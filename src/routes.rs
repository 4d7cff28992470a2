//! Route definitions for the flight surety API

use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

// Engine routes
pub fn engine_routes() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/ledger", get(get_ledger))
}

// Flight routes
pub fn flight_routes() -> Router<AppState> {
    Router::new()
        .route("/api/flights", get(list_flights))
        .route("/api/airlines/:id/flights", get(list_airline_flights))
        .route(
            "/api/flights/:key/status-requests",
            post(request_flight_status),
        )
}

// Customer routes
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/policies", post(buy_policy))
        .route("/api/customers/:id/flights", get(list_customer_flights))
        .route("/api/customers/:id/claim", get(check_claim))
        .route("/api/customers/:id/withdraw", post(withdraw))
}

// Oracle routes
pub fn oracle_routes() -> Router<AppState> {
    Router::new().route("/api/oracles/:id/indexes", get(get_oracle_indexes))
}

/// Full API router with state applied. Layers are added by the binary.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(engine_routes())
        .merge(flight_routes())
        .merge(customer_routes())
        .merge(oracle_routes())
        .with_state(state)
}
