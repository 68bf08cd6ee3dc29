pub mod adapters;
pub mod bus;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod sources;
pub mod startup;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::health::HealthChecks;
use crate::ports::TransactionRepository;
use crate::services::Aggregator;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub repository: Arc<dyn TransactionRepository>,
    pub health: Arc<HealthChecks>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/transactions/dashboard",
            get(handlers::dashboard::get_dashboard),
        )
        .route("/api/transactions", get(handlers::transactions::list_transactions))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .with_state(state)
}

/// Same routes, with CORS opened to the given origins. An empty list leaves
/// CORS off.
pub fn create_app_with_cors(state: AppState, allowed_origins: &[String]) -> Router {
    let app = create_app(state);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return app;
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
