use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of a business's weekly schedule (weekday 0 = Sunday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessScheduleDay {
    pub business_id: Uuid,
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_closed: bool,
    pub slot_granularity_min: i64,
}

/// A one-off closure (holiday, vacation) that suppresses the weekly schedule
/// for a single date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessClosure {
    pub business_id: Uuid,
    pub closure_date: NaiveDate,
    pub reason: Option<String>,
}

/// A staff member's available working interval for a single day. Immutable
/// snapshot for the duration of one slot-generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkWindow {
    pub staff_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// A resolved work window plus the slot step configured for that weekday.
#[derive(Debug, Clone)]
pub struct StaffDayWindow {
    pub window: WorkWindow,
    pub granularity_min: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositMode {
    None,
    Fixed,
    Percent,
    Full,
}

/// Business-owned booking policy. Read-only to the booking flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositPolicy {
    pub auto_confirm: bool,
    pub deposit_mode: DepositMode,
    pub base_deposit_percent: i32,
    pub fixed_deposit_cents: Option<i64>,
    pub min_cancel_minutes: i64,
    pub late_cancel_minutes: i64,
    pub late_tolerance_minutes: i64,
    pub no_show_strike_limit: i32,
    pub strike_window_days: i32,
}

impl Default for DepositPolicy {
    fn default() -> Self {
        Self {
            auto_confirm: true,
            deposit_mode: DepositMode::None,
            base_deposit_percent: 0,
            fixed_deposit_cents: None,
            min_cancel_minutes: 240,
            late_cancel_minutes: 720,
            late_tolerance_minutes: 0,
            no_show_strike_limit: 3,
            strike_window_days: 90,
        }
    }
}
