// libs/booking-cell/tests/risk_test.rs
//
// Risk scoring and deposit resolution.

use booking_cell::models::RiskEvent;
use booking_cell::services::risk::{
    apply_event, business_base_percent, global_min_deposit_percent, required_deposit_cents,
    required_deposit_percent,
};
use schedule_cell::models::{DepositMode, DepositPolicy};

fn policy(mode: DepositMode, base_percent: i32, fixed_cents: Option<i64>) -> DepositPolicy {
    DepositPolicy {
        deposit_mode: mode,
        base_deposit_percent: base_percent,
        fixed_deposit_cents: fixed_cents,
        ..DepositPolicy::default()
    }
}

#[test]
fn event_weights_accumulate_with_a_floor_at_zero() {
    assert_eq!(apply_event(0, RiskEvent::NoShow), 3);
    assert_eq!(apply_event(3, RiskEvent::LateCancel), 5);
    assert_eq!(apply_event(3, RiskEvent::Completed), 2);

    // A completed appointment never pushes the score below zero.
    assert_eq!(apply_event(0, RiskEvent::Completed), 0);
    assert_eq!(apply_event(1, RiskEvent::Completed), 0);
}

#[test]
fn global_minimum_follows_the_risk_tiers() {
    assert_eq!(global_min_deposit_percent(0), 0);
    assert_eq!(global_min_deposit_percent(2), 0);
    assert_eq!(global_min_deposit_percent(3), 30);
    assert_eq!(global_min_deposit_percent(5), 30);
    assert_eq!(global_min_deposit_percent(6), 100);
    assert_eq!(global_min_deposit_percent(40), 100);
}

#[test]
fn business_percent_is_a_floor_the_global_signal_can_raise() {
    // Low risk: the business setting stands.
    assert_eq!(required_deposit_percent(20, 0, false), 20);
    // Medium risk raises a lower business setting.
    assert_eq!(required_deposit_percent(20, 4, false), 30);
    // But never lowers a higher one.
    assert_eq!(required_deposit_percent(50, 4, false), 50);
    // High risk demands full prepayment.
    assert_eq!(required_deposit_percent(20, 8, false), 100);
}

#[test]
fn blacklisted_clients_always_prepay_in_full() {
    assert_eq!(required_deposit_percent(0, 0, true), 100);
    assert_eq!(required_deposit_percent(30, 2, true), 100);
}

#[test]
fn deposit_mode_maps_to_a_base_percent() {
    assert_eq!(business_base_percent(&policy(DepositMode::None, 0, None)), 0);
    assert_eq!(business_base_percent(&policy(DepositMode::Fixed, 0, Some(1500))), 0);
    assert_eq!(business_base_percent(&policy(DepositMode::Percent, 25, None)), 25);
    assert_eq!(business_base_percent(&policy(DepositMode::Full, 0, None)), 100);
}

#[test]
fn percent_mode_amounts_derive_from_the_total() {
    let p = policy(DepositMode::Percent, 30, None);
    assert_eq!(required_deposit_cents(&p, 30, 10_000), 3_000);
    assert_eq!(required_deposit_cents(&p, 100, 10_000), 10_000);
    assert_eq!(required_deposit_cents(&p, 0, 10_000), 0);
}

#[test]
fn fixed_mode_keeps_the_configured_amount_as_a_floor() {
    let p = policy(DepositMode::Fixed, 0, Some(1_500));
    // No risk escalation: the fixed amount applies.
    assert_eq!(required_deposit_cents(&p, 0, 10_000), 1_500);
    // Risk escalation above the fixed amount wins.
    assert_eq!(required_deposit_cents(&p, 30, 10_000), 3_000);
    // Never above the total price.
    assert_eq!(required_deposit_cents(&p, 0, 1_000), 1_000);
}

#[test]
fn deposit_never_exceeds_the_total() {
    let p = policy(DepositMode::Percent, 100, None);
    assert_eq!(required_deposit_cents(&p, 100, 5_000), 5_000);

    let free = policy(DepositMode::Full, 0, None);
    assert_eq!(required_deposit_cents(&free, 100, 0), 0);
}
