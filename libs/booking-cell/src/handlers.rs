// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, BookingError, OutcomeRequest, PaymentProofRequest,
    PaymentWebhookEvent, RescheduleRequestBody, SlotQuery,
};
use crate::services::booking::BookingService;
use crate::services::sweep::SweepService;

// ==============================================================================
// SLOT LISTING
// ==============================================================================

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let slots = booking_service
        .list_slots(query, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "count": slots.len(),
        "slots": slots,
    })))
}

// ==============================================================================
// CLIENT BOOKING OPERATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .book(request, &user, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .my_appointments(&user, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .cancel(appointment_id, &user, Utc::now(), auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment canceled",
    })))
}

#[axum::debug_handler]
pub async fn request_reschedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequestBody>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    booking_service
        .request_reschedule(appointment_id, request.note, &user, Utc::now(), auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Reschedule request sent to the business",
    })))
}

#[axum::debug_handler]
pub async fn submit_payment_proof(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<PaymentProofRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .submit_payment_proof(appointment_id, request, &user, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// BUSINESS OPERATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .confirm_payment(appointment_id, &user, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn record_outcome(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<OutcomeRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .record_outcome(appointment_id, request.outcome, &user, auth.token())
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// MACHINE BOUNDARIES (webhook + cron)
// ==============================================================================

/// Payment processor callback. Authenticated by shared secret, not by a user
/// token; persistence runs in the service context.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(event): Json<PaymentWebhookEvent>,
) -> Result<Json<Value>, AppError> {
    require_secret(&headers, "x-webhook-secret", &state.webhook_secret)?;

    let booking_service = BookingService::new(&state);
    booking_service
        .handle_payment_event(event, &state.supabase_anon_key)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn expire_unpaid(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_secret(&headers, "x-cron-secret", &state.cron_secret)?;

    let sweep_service = SweepService::new(&state);
    let expired = sweep_service
        .expire_unpaid(Utc::now(), &state.supabase_anon_key)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "expired": expired,
    })))
}

#[axum::debug_handler]
pub async fn send_reminders(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_secret(&headers, "x-cron-secret", &state.cron_secret)?;

    let sweep_service = SweepService::new(&state);
    let sent = sweep_service
        .send_reminders(Utc::now(), &state.supabase_anon_key)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "success": true,
        "sent": sent,
    })))
}

fn require_secret(headers: &HeaderMap, header_name: &str, expected: &str) -> Result<(), AppError> {
    let provided = headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if expected.is_empty() || provided != expected {
        return Err(AppError::Auth("Invalid or missing shared secret".to_string()));
    }
    Ok(())
}


fn booking_error(error: BookingError) -> AppError {
    match error {
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        BookingError::SlotNotAvailable => {
            AppError::Conflict("Slot no longer available".to_string())
        }
        BookingError::OutsideChangeWindow => AppError::PolicyViolation(
            "Too close to the appointment start to change it".to_string(),
        ),
        BookingError::InvalidStatusTransition(status) => AppError::PolicyViolation(format!(
            "Appointment in status {} does not allow this action",
            status
        )),
        BookingError::Unauthorized => {
            AppError::Auth("Not authorized for this appointment".to_string())
        }
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::ExternalServiceError(msg) => AppError::ExternalService(msg),
    }
}
