use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::PersistenceClient;

use crate::models::{BusinessClosure, BusinessScheduleDay, StaffDayWindow, WorkWindow};

pub struct WorkWindowService {
    persistence: Arc<PersistenceClient>,
}

impl WorkWindowService {
    pub fn new(persistence: Arc<PersistenceClient>) -> Self {
        Self { persistence }
    }

    /// Resolve the working window for one staff member on one date from the
    /// business's weekly schedule, minus closures. Returns `None` when the
    /// business is closed that day.
    pub async fn work_window_for(
        &self,
        business_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<StaffDayWindow>> {
        debug!("Resolving work window for staff {} on {}", staff_id, date);

        let weekday = weekday_index(date);

        let path = format!(
            "/rest/v1/business_schedules?business_id=eq.{}&weekday=eq.{}",
            business_id, weekday
        );
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let Some(row) = rows.into_iter().next() else {
            debug!("No schedule configured for weekday {}", weekday);
            return Ok(None);
        };

        let day: BusinessScheduleDay = serde_json::from_value(row)?;
        if day.is_closed {
            return Ok(None);
        }
        if day.start_time >= day.end_time {
            return Err(anyhow!("Schedule row has inverted hours for weekday {}", weekday));
        }

        if self.is_closed_on(business_id, date, auth_token).await? {
            debug!("Business {} has a closure on {}", business_id, date);
            return Ok(None);
        }

        let window = WorkWindow {
            staff_id,
            starts_at: date.and_time(day.start_time).and_utc(),
            ends_at: date.and_time(day.end_time).and_utc(),
        };

        Ok(Some(StaffDayWindow {
            window,
            granularity_min: day.slot_granularity_min,
        }))
    }

    async fn is_closed_on(
        &self,
        business_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool> {
        let path = format!(
            "/rest/v1/business_closures?business_id=eq.{}&closure_date=eq.{}",
            business_id, date
        );
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let closures: Vec<BusinessClosure> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<BusinessClosure>, _>>()?;

        Ok(!closures.is_empty())
    }
}

fn weekday_index(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}
