use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::{booking_routes, internal_routes, webhook_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Reserva API is running!" }))
        .nest("/appointments", booking_routes(state.clone()))
        .nest("/webhooks", webhook_routes(state.clone()))
        .nest("/internal", internal_routes(state))
}
