// libs/booking-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use schedule_cell::models::DepositPolicy;

use crate::models::{AppointmentStatus, BookingError};
use crate::services::timerange::whole_minutes_between;

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed by the state machine.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition {} -> {}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(BookingError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    /// The transition table. Terminal statuses map to the empty set.
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::PendingConfirmation => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::AwaitingPayment,
                AppointmentStatus::CanceledByClient,
                AppointmentStatus::CanceledByBusiness,
                AppointmentStatus::NoShow,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::AwaitingPayment => vec![
                AppointmentStatus::Paid,
                AppointmentStatus::Confirmed,
                AppointmentStatus::CanceledByClient,
                AppointmentStatus::CanceledByBusiness,
                AppointmentStatus::NoShow,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Paid,
                AppointmentStatus::CanceledByClient,
                AppointmentStatus::CanceledByBusiness,
                AppointmentStatus::NoShow,
                AppointmentStatus::Completed,
            ],
            // Paid still runs its course, but the client can no longer
            // cancel it; only completion or business-side outcomes remain.
            AppointmentStatus::Paid => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::CanceledByBusiness,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::CanceledByClient
            | AppointmentStatus::CanceledByBusiness
            | AppointmentStatus::NoShow
            | AppointmentStatus::Completed => vec![],
        }
    }

    /// Whether a client may still cancel an appointment in this status.
    pub fn can_client_cancel(&self, status: AppointmentStatus) -> bool {
        !status.is_terminal() && status != AppointmentStatus::Paid
    }

    /// Whether a client may still request a reschedule. A reschedule request
    /// never moves the appointment itself; it only notifies the business.
    pub fn can_request_reschedule(&self, status: AppointmentStatus) -> bool {
        !status.is_terminal()
    }

    /// Cancellation/reschedule window gate, shared by both client actions:
    /// whole minutes until start (floored) must reach the policy threshold.
    /// The boundary is inclusive: exactly `min_cancel_minutes` out is allowed.
    pub fn is_change_allowed(
        &self,
        appointment_starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
        min_cancel_minutes: i64,
    ) -> bool {
        whole_minutes_between(appointment_starts_at, now) >= min_cancel_minutes
    }

    /// Whether a successful client cancellation still counts as a late-cancel
    /// strike: closer to the start than the late threshold minus tolerance.
    pub fn is_late_cancel(&self, minutes_before_start: i64, policy: &DepositPolicy) -> bool {
        let threshold = policy.late_cancel_minutes - policy.late_tolerance_minutes;
        minutes_before_start < threshold
    }

    /// Initial status for a freshly created appointment: a due deposit parks
    /// it in awaiting_payment; otherwise the business's confirmation policy
    /// decides between confirmed and pending_confirmation.
    pub fn initial_status(
        &self,
        policy: &DepositPolicy,
        requires_confirmation: bool,
        required_deposit_cents: i64,
    ) -> AppointmentStatus {
        if required_deposit_cents > 0 {
            AppointmentStatus::AwaitingPayment
        } else if policy.auto_confirm && !requires_confirmation {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::PendingConfirmation
        }
    }

    /// Status after the business verifies a payment: full prepayment settles
    /// the appointment as paid, a partial deposit only confirms it.
    pub fn status_after_payment_verified(
        &self,
        required_deposit_cents: i64,
        total_price_cents: i64,
    ) -> AppointmentStatus {
        if total_price_cents > 0 && required_deposit_cents >= total_price_cents {
            AppointmentStatus::Paid
        } else {
            AppointmentStatus::Confirmed
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
