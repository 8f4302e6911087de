// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use schedule_cell::models::WorkWindow;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub client_email: String,
    pub customer_id: Option<Uuid>,
    pub status: AppointmentStatus,
    pub required_deposit_percent: i32,
    pub required_deposit_cents: i64,
    pub total_price_cents: i64,
    pub external_payment_status: Option<String>,
    pub external_payment_method: Option<String>,
    pub external_payment_proof_url: Option<String>,
    pub payment_due_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Ownership check for client-initiated actions: the acting identity must
    /// match the appointment's customer id or booking email.
    pub fn is_owned_by(&self, user_id: &str, user_email: Option<&str>) -> bool {
        let id_match = self
            .customer_id
            .map(|id| id.to_string() == user_id)
            .unwrap_or(false);
        let email_match = user_email
            .map(|email| email.eq_ignore_ascii_case(&self.client_email))
            .unwrap_or(false);
        id_match || email_match
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingConfirmation,
    Confirmed,
    AwaitingPayment,
    Paid,
    CanceledByClient,
    CanceledByBusiness,
    NoShow,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 8] = [
        AppointmentStatus::PendingConfirmation,
        AppointmentStatus::Confirmed,
        AppointmentStatus::AwaitingPayment,
        AppointmentStatus::Paid,
        AppointmentStatus::CanceledByClient,
        AppointmentStatus::CanceledByBusiness,
        AppointmentStatus::NoShow,
        AppointmentStatus::Completed,
    ];

    /// Terminal statuses accept no further transition of any kind.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::CanceledByClient
                | AppointmentStatus::CanceledByBusiness
                | AppointmentStatus::NoShow
                | AppointmentStatus::Completed
        )
    }

    /// Statuses whose appointments occupy the staff member's time and must be
    /// treated as busy by the slot generator.
    pub fn blocks_schedule(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::PendingConfirmation
                | AppointmentStatus::Confirmed
                | AppointmentStatus::AwaitingPayment
                | AppointmentStatus::Paid
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::PendingConfirmation => write!(f, "pending_confirmation"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::AwaitingPayment => write!(f, "awaiting_payment"),
            AppointmentStatus::Paid => write!(f, "paid"),
            AppointmentStatus::CanceledByClient => write!(f, "canceled_by_client"),
            AppointmentStatus::CanceledByBusiness => write!(f, "canceled_by_business"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A bookable service as configured by the business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub duration_min: i64,
    pub price_cents: i64,
    pub buffer_before_min: i64,
    pub buffer_after_min: i64,
    pub requires_confirmation: bool,
}

// ==============================================================================
// SLOT GENERATION MODELS
// ==============================================================================

/// An occupied interval `[starts_at, ends_at)` for a staff member, derived
/// from non-cancelled appointments including their buffers. Snapshot at
/// generation time; staleness until the booking write is resolved by the
/// persistence layer's overlap constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyRange {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Inputs to one slot-generation call.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub staff_id: Uuid,
    pub window: WorkWindow,
    pub service_duration_min: i64,
    pub buffer_before_min: i64,
    pub buffer_after_min: i64,
    pub granularity_min: i64,
    pub busy: Vec<BusyRange>,
}

/// One candidate bookable start time. Ephemeral, recomputed per request.
/// Lower score = tighter packing against existing bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotOption {
    pub staff_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub score: i64,
    pub recommended: bool,
}

// ==============================================================================
// RISK MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEvent {
    NoShow,
    LateCancel,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskScope {
    Business,
    Global,
}

impl fmt::Display for RiskScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskScope::Business => write!(f, "business"),
            RiskScope::Global => write!(f, "global"),
        }
    }
}

/// Per (client, scope) behavioral score. Business-scope rows are owned by the
/// business, global-scope rows by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRiskProfile {
    pub client_email: String,
    pub scope: RiskScope,
    pub business_id: Option<Uuid>,
    pub score: i32,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub business_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub business_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Uuid,
    pub starts_at: DateTime<Utc>,
    /// Booking email; defaults to the authenticated user's email.
    pub client_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequestBody {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentProofRequest {
    pub method: Option<String>,
    /// Public URL of the uploaded proof; the upload itself happens at the
    /// storage collaborator, not here.
    pub proof_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentOutcome {
    Completed,
    NoShow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeRequest {
    pub outcome: AppointmentOutcome,
}

/// Completion event reported back by the payment processor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentWebhookEvent {
    pub appointment_id: Uuid,
    pub paid: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Slot no longer available")]
    SlotNotAvailable,

    #[error("Outside the allowed change window")]
    OutsideChangeWindow,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}
