use schedule_cell::models::{DepositMode, DepositPolicy};

use crate::models::RiskEvent;

/// Risk-tier bounds for the global minimum deposit. Tunable contract values.
pub const LOW_RISK_BELOW: i32 = 3;
pub const MEDIUM_RISK_BELOW: i32 = 6;
pub const MEDIUM_RISK_DEPOSIT_PERCENT: i32 = 30;

/// Fold one appointment-outcome event into a client's risk score.
/// No-show +3, late cancel +2, completed -1, floored at zero. Pure; the
/// caller persists the result per (client, scope) key.
pub fn apply_event(current_score: i32, event: RiskEvent) -> i32 {
    let weight = match event {
        RiskEvent::NoShow => 3,
        RiskEvent::LateCancel => 2,
        RiskEvent::Completed => -1,
    };

    (current_score + weight).max(0)
}

/// Platform-wide minimum deposit implied by a global risk score.
pub fn global_min_deposit_percent(score: i32) -> i32 {
    if score < LOW_RISK_BELOW {
        0
    } else if score < MEDIUM_RISK_BELOW {
        MEDIUM_RISK_DEPOSIT_PERCENT
    } else {
        100
    }
}

/// Required deposit percentage for a booking. A soft-blacklisted client
/// always prepays in full; otherwise the business's configured percentage is
/// a floor the global risk signal can raise but never lower.
pub fn required_deposit_percent(
    business_percent: i32,
    global_risk_score: i32,
    has_global_blacklist: bool,
) -> i32 {
    if has_global_blacklist {
        return 100;
    }

    business_percent.max(global_min_deposit_percent(global_risk_score))
}

/// The business-configured percentage a deposit mode contributes before risk
/// escalation: `none` and `fixed` start from 0, `full` from 100.
pub fn business_base_percent(policy: &DepositPolicy) -> i32 {
    match policy.deposit_mode {
        DepositMode::None | DepositMode::Fixed => 0,
        DepositMode::Percent => policy.base_deposit_percent,
        DepositMode::Full => 100,
    }
}

/// Concrete deposit amount for a booking. In `fixed` mode the configured
/// amount applies, but the risk-derived percentage still acts as a floor so
/// the global signal can only raise what the business asks for. Never exceeds
/// the total price.
pub fn required_deposit_cents(
    policy: &DepositPolicy,
    percent: i32,
    total_price_cents: i64,
) -> i64 {
    let percent_cents = total_price_cents * i64::from(percent) / 100;

    let cents = match policy.deposit_mode {
        DepositMode::Fixed => percent_cents.max(policy.fixed_deposit_cents.unwrap_or(0)),
        _ => percent_cents,
    };

    cents.min(total_price_cents)
}
