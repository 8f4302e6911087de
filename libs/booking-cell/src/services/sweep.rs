// libs/booking-cell/src/services/sweep.rs
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use notification_cell::models::{NotificationKind, NotificationRequest, StatusEmail};
use notification_cell::NotificationDispatcher;
use shared_config::AppConfig;
use shared_database::PersistenceClient;

use crate::models::{AppointmentStatus, BookingError};

/// Reminder lead times, in hours before the appointment start.
pub const REMINDER_LEAD_HOURS: [i64; 2] = [24, 2];

#[derive(Debug, Deserialize)]
struct ReminderRow {
    id: Uuid,
    business_id: Uuid,
    customer_id: Option<Uuid>,
    client_email: String,
    starts_at: DateTime<Utc>,
    status: AppointmentStatus,
    businesses: NamedRow,
    services: NamedRow,
}

#[derive(Debug, Deserialize)]
struct NamedRow {
    name: String,
}

/// Scheduled maintenance over the appointments table, invoked by the cron
/// boundary rather than by end users.
pub struct SweepService {
    persistence: Arc<PersistenceClient>,
    notifier: NotificationDispatcher,
}

impl SweepService {
    pub fn new(config: &AppConfig) -> Self {
        let persistence = Arc::new(PersistenceClient::new(config));

        Self {
            notifier: NotificationDispatcher::new(Arc::clone(&persistence)),
            persistence,
        }
    }

    /// Cancel every awaiting_payment appointment whose payment deadline has
    /// passed, freeing the held slots. The filter makes the sweep idempotent:
    /// rows already swept no longer match, so a rerun touches nothing.
    /// Returns how many appointments this run expired.
    pub async fn expire_unpaid(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<usize, BookingError> {
        let path = format!(
            "/rest/v1/appointments?status=eq.{}&payment_due_at=lt.{}",
            AppointmentStatus::AwaitingPayment,
            now.to_rfc3339(),
        );
        let body = json!({
            "status": AppointmentStatus::CanceledByBusiness.to_string(),
            "cancel_reason": "payment_timeout",
            "canceled_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let expired: Vec<Value> = self
            .persistence
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if expired.is_empty() {
            info!("Expiry sweep found no overdue appointments");
        } else {
            info!("Expiry sweep canceled {} unpaid appointments", expired.len());
        }

        Ok(expired.len())
    }

    /// Send reminder emails for confirmed and paid appointments starting
    /// around each configured lead time. Returns how many reminders were
    /// handed to the transport.
    pub async fn send_reminders(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<usize, BookingError> {
        let mut sent = 0;

        for lead_hours in REMINDER_LEAD_HOURS {
            let window_start = now + ChronoDuration::hours(lead_hours - 1);
            let window_end = now + ChronoDuration::hours(lead_hours + 1);

            let path = format!(
                "/rest/v1/appointments?status=in.(confirmed,paid)&starts_at=gte.{}&starts_at=lte.{}&select=id,business_id,customer_id,client_email,starts_at,status,businesses(name),services(name)",
                window_start.to_rfc3339(),
                window_end.to_rfc3339(),
            );

            let rows: Vec<Value> = self
                .persistence
                .request(Method::GET, &path, Some(auth_token), None)
                .await
                .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

            for row in rows {
                let reminder: ReminderRow = match serde_json::from_value(row) {
                    Ok(reminder) => reminder,
                    Err(e) => {
                        warn!("Skipping malformed reminder row: {}", e);
                        continue;
                    }
                };

                self.notifier
                    .dispatch(
                        NotificationRequest {
                            business_id: reminder.business_id,
                            appointment_id: Some(reminder.id),
                            user_id: reminder.customer_id,
                            kind: NotificationKind::AppointmentReminder,
                            payload: json!({
                                "title": "Upcoming appointment",
                                "body": format!(
                                    "{} at {} on {}",
                                    reminder.services.name,
                                    reminder.businesses.name,
                                    reminder.starts_at.format("%Y-%m-%d %H:%M"),
                                ),
                            }),
                        },
                        auth_token,
                    )
                    .await;

                self.notifier
                    .send_status_email(
                        StatusEmail {
                            to: reminder.client_email,
                            business_name: reminder.businesses.name,
                            service_name: reminder.services.name,
                            starts_at: reminder.starts_at,
                            status: reminder.status.to_string(),
                        },
                        auth_token,
                    )
                    .await;
                sent += 1;
            }
        }

        info!("Reminder sweep handed {} emails to the transport", sent);
        Ok(sent)
    }
}
