use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A fire-and-forget notification request. Delivery success is never awaited
/// by the booking flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub business_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentBooked,
    AppointmentCanceledByClient,
    AppointmentRescheduleRequest,
    PaymentProofSubmitted,
    PaymentConfirmed,
    AppointmentReminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AppointmentBooked => "appointment_booked",
            NotificationKind::AppointmentCanceledByClient => "appointment_canceled_by_client",
            NotificationKind::AppointmentRescheduleRequest => "appointment_reschedule_request",
            NotificationKind::PaymentProofSubmitted => "payment_proof_submitted",
            NotificationKind::PaymentConfirmed => "payment_confirmed",
            NotificationKind::AppointmentReminder => "appointment_reminder",
        }
    }
}

/// Request shape handed to the email transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEmail {
    pub to: String,
    pub business_name: String,
    pub service_name: String,
    pub starts_at: DateTime<Utc>,
    pub status: String,
}
