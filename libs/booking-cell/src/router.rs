// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    // Every client- and business-facing operation requires a user token.
    let protected_routes = Router::new()
        .route("/slots", get(handlers::list_slots))
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/reschedule-request",
            post(handlers::request_reschedule),
        )
        .route(
            "/{appointment_id}/payment-proof",
            post(handlers::submit_payment_proof),
        )
        .route(
            "/{appointment_id}/confirm-payment",
            post(handlers::confirm_payment),
        )
        .route("/{appointment_id}/outcome", post(handlers::record_outcome))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

/// Routes authenticated by shared secret headers instead of user tokens.
pub fn webhook_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/payments", post(handlers::payment_webhook))
        .with_state(state)
}

pub fn internal_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/bookings/expire", post(handlers::expire_unpaid))
        .route("/notifications/reminders", post(handlers::send_reminders))
        .with_state(state)
}
