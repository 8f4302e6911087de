// libs/booking-cell/tests/lifecycle_test.rs
//
// Appointment state machine, change-window gates and status decisions.

use chrono::{DateTime, Duration, TimeZone, Utc};

use booking_cell::models::{AppointmentStatus, BookingError};
use booking_cell::services::lifecycle::AppointmentLifecycleService;
use schedule_cell::models::DepositPolicy;

fn lifecycle() -> AppointmentLifecycleService {
    AppointmentLifecycleService::new()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 7, 12, 0, 0).unwrap()
}

#[test]
fn terminal_statuses_accept_no_transition() {
    let lifecycle = lifecycle();
    for terminal in [
        AppointmentStatus::CanceledByClient,
        AppointmentStatus::CanceledByBusiness,
        AppointmentStatus::NoShow,
        AppointmentStatus::Completed,
    ] {
        for target in AppointmentStatus::ALL {
            assert!(matches!(
                lifecycle.validate_status_transition(terminal, target),
                Err(BookingError::InvalidStatusTransition(_))
            ));
        }
    }
}

#[test]
fn awaiting_payment_can_settle_or_confirm() {
    let lifecycle = lifecycle();
    lifecycle
        .validate_status_transition(AppointmentStatus::AwaitingPayment, AppointmentStatus::Paid)
        .unwrap();
    lifecycle
        .validate_status_transition(
            AppointmentStatus::AwaitingPayment,
            AppointmentStatus::Confirmed,
        )
        .unwrap();
    lifecycle
        .validate_status_transition(
            AppointmentStatus::AwaitingPayment,
            AppointmentStatus::CanceledByBusiness,
        )
        .unwrap();
}

#[test]
fn paid_cannot_go_back_to_awaiting_payment() {
    let lifecycle = lifecycle();
    assert!(lifecycle
        .validate_status_transition(AppointmentStatus::Paid, AppointmentStatus::AwaitingPayment)
        .is_err());
    assert!(lifecycle
        .validate_status_transition(AppointmentStatus::Paid, AppointmentStatus::Completed)
        .is_ok());
}

#[test]
fn paid_is_not_client_cancellable_but_reschedule_requestable() {
    let lifecycle = lifecycle();
    assert!(!lifecycle.can_client_cancel(AppointmentStatus::Paid));
    assert!(lifecycle.can_request_reschedule(AppointmentStatus::Paid));

    assert!(lifecycle.can_client_cancel(AppointmentStatus::Confirmed));
    assert!(!lifecycle.can_client_cancel(AppointmentStatus::Completed));
    assert!(!lifecycle.can_request_reschedule(AppointmentStatus::NoShow));
}

#[test]
fn change_window_boundary_is_inclusive() {
    let lifecycle = lifecycle();
    let min_cancel = 240;

    // Exactly 240 whole minutes out: allowed.
    let starts_at = now() + Duration::minutes(240);
    assert!(lifecycle.is_change_allowed(starts_at, now(), min_cancel));

    // 239 minutes 59 seconds floors to 239: rejected.
    let starts_at = now() + Duration::minutes(240) - Duration::seconds(1);
    assert!(!lifecycle.is_change_allowed(starts_at, now(), min_cancel));

    // Already started: rejected.
    let starts_at = now() - Duration::minutes(5);
    assert!(!lifecycle.is_change_allowed(starts_at, now(), min_cancel));
}

#[test]
fn late_cancel_respects_the_tolerance() {
    let lifecycle = lifecycle();
    let policy = DepositPolicy {
        late_cancel_minutes: 720,
        late_tolerance_minutes: 30,
        ..DepositPolicy::default()
    };

    assert!(lifecycle.is_late_cancel(600, &policy));
    // Inside the tolerance band: no strike.
    assert!(!lifecycle.is_late_cancel(690, &policy));
    assert!(!lifecycle.is_late_cancel(720, &policy));
}

#[test]
fn initial_status_prefers_payment_over_confirmation() {
    let lifecycle = lifecycle();
    let auto = DepositPolicy { auto_confirm: true, ..DepositPolicy::default() };
    let manual = DepositPolicy { auto_confirm: false, ..DepositPolicy::default() };

    // Any due deposit parks the appointment.
    assert_eq!(
        lifecycle.initial_status(&auto, false, 1_000),
        AppointmentStatus::AwaitingPayment
    );
    // No deposit, auto-confirm, service has no manual gate.
    assert_eq!(
        lifecycle.initial_status(&auto, false, 0),
        AppointmentStatus::Confirmed
    );
    // Service demands manual confirmation even under auto-confirm.
    assert_eq!(
        lifecycle.initial_status(&auto, true, 0),
        AppointmentStatus::PendingConfirmation
    );
    assert_eq!(
        lifecycle.initial_status(&manual, false, 0),
        AppointmentStatus::PendingConfirmation
    );
}

#[test]
fn verified_payment_settles_full_prepayments_only() {
    let lifecycle = lifecycle();

    assert_eq!(
        lifecycle.status_after_payment_verified(10_000, 10_000),
        AppointmentStatus::Paid
    );
    assert_eq!(
        lifecycle.status_after_payment_verified(3_000, 10_000),
        AppointmentStatus::Confirmed
    );
    // A free service cannot be "paid".
    assert_eq!(
        lifecycle.status_after_payment_verified(0, 0),
        AppointmentStatus::Confirmed
    );
}
