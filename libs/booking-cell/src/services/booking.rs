// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::models::{NotificationKind, NotificationRequest};
use notification_cell::NotificationDispatcher;
use schedule_cell::services::policy::PolicyService;
use schedule_cell::services::workwindow::WorkWindowService;
use shared_config::AppConfig;
use shared_database::{PersistError, PersistenceClient};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentOutcome, AppointmentStatus, BookAppointmentRequest, BookingError,
    BusyRange, ClientRiskProfile, PaymentProofRequest, PaymentWebhookEvent, RiskEvent, RiskScope,
    ServiceItem, SlotOption, SlotQuery, SlotRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::risk::{
    apply_event, business_base_percent, required_deposit_cents, required_deposit_percent,
};
use crate::services::slots::generate_slots;
use crate::services::timerange::whole_minutes_between;

/// How long an awaiting_payment appointment holds its slot before the expiry
/// sweep reclaims it. Tunable.
pub const PAYMENT_DUE_HOURS: i64 = 24;

/// Bounded retry for the compare-and-swap risk-score write.
const RISK_CAS_MAX_ATTEMPTS: u32 = 3;

const MAX_RESCHEDULE_NOTE_CHARS: usize = 500;

/// Appointment row joined with its service's timing, used to reconstruct the
/// busy interval (booked span plus that service's buffers).
#[derive(Debug, Deserialize)]
struct BusySourceRow {
    starts_at: DateTime<Utc>,
    services: ServiceTiming,
}

#[derive(Debug, Deserialize)]
struct ServiceTiming {
    duration_min: i64,
    buffer_before_min: i64,
    buffer_after_min: i64,
}

pub struct BookingService {
    persistence: Arc<PersistenceClient>,
    lifecycle: AppointmentLifecycleService,
    windows: WorkWindowService,
    policies: PolicyService,
    notifier: NotificationDispatcher,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let persistence = Arc::new(PersistenceClient::new(config));

        Self {
            lifecycle: AppointmentLifecycleService::new(),
            windows: WorkWindowService::new(Arc::clone(&persistence)),
            policies: PolicyService::new(Arc::clone(&persistence)),
            notifier: NotificationDispatcher::new(Arc::clone(&persistence)),
            persistence,
        }
    }

    // ==========================================================================
    // SLOT LISTING
    // ==========================================================================

    /// Compute the ranked bookable slots for one staff member on one date.
    /// Returns an empty list when the business is closed that day.
    pub async fn list_slots(
        &self,
        query: SlotQuery,
        auth_token: &str,
    ) -> Result<Vec<SlotOption>, BookingError> {
        let service = self.get_service(query.service_id, auth_token).await?;
        if service.business_id != query.business_id {
            return Err(BookingError::ValidationError(
                "Service does not belong to this business".to_string(),
            ));
        }

        let day = self
            .windows
            .work_window_for(query.business_id, query.staff_id, query.date, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let Some(day) = day else {
            debug!("Business {} closed on {}, no slots", query.business_id, query.date);
            return Ok(vec![]);
        };

        let busy = self
            .busy_ranges_for(query.staff_id, query.date, auth_token)
            .await?;

        generate_slots(&SlotRequest {
            staff_id: query.staff_id,
            window: day.window,
            service_duration_min: service.duration_min,
            buffer_before_min: service.buffer_before_min,
            buffer_after_min: service.buffer_after_min,
            granularity_min: day.granularity_min,
            busy,
        })
    }

    /// Busy intervals for one staff member on one date, derived from
    /// non-cancelled appointments including each one's service buffers.
    async fn busy_ranges_for(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BusyRange>, BookingError> {
        let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = date.and_hms_opt(23, 59, 59).unwrap().and_utc();

        let blocking: Vec<String> = AppointmentStatus::ALL
            .iter()
            .filter(|status| status.blocks_schedule())
            .map(ToString::to_string)
            .collect();

        let path = format!(
            "/rest/v1/appointments?staff_id=eq.{}&starts_at=gte.{}&starts_at=lte.{}&status=in.({})&select=starts_at,services(duration_min,buffer_before_min,buffer_after_min)&order=starts_at.asc",
            staff_id,
            day_start.to_rfc3339(),
            day_end.to_rfc3339(),
            blocking.join(","),
        );

        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        let sources: Vec<BusySourceRow> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BusySourceRow>, _>>()
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        Ok(sources
            .into_iter()
            .map(|row| BusyRange {
                starts_at: row.starts_at
                    - ChronoDuration::minutes(row.services.buffer_before_min),
                ends_at: row.starts_at
                    + ChronoDuration::minutes(
                        row.services.duration_min + row.services.buffer_after_min,
                    ),
            })
            .collect())
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Create an appointment: resolve the deposit requirement from the
    /// business policy plus the client's global risk signal, pick the initial
    /// status, and insert through the overlap-safe persistence path. A
    /// constraint rejection means the slot was taken between read and write
    /// and surfaces as `SlotNotAvailable`.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let client_email = request
            .client_email
            .clone()
            .or_else(|| user.email.clone())
            .ok_or_else(|| {
                BookingError::ValidationError("A booking email is required".to_string())
            })?;

        info!(
            "Booking service {} with staff {} for {}",
            request.service_id, request.staff_id, client_email
        );

        let service = self.get_service(request.service_id, auth_token).await?;
        if service.business_id != request.business_id {
            return Err(BookingError::ValidationError(
                "Service does not belong to this business".to_string(),
            ));
        }

        let now = Utc::now();
        if request.starts_at <= now {
            return Err(BookingError::ValidationError(
                "Appointment must start in the future".to_string(),
            ));
        }

        let ends_at = request.starts_at + ChronoDuration::minutes(service.duration_min);

        let day = self
            .windows
            .work_window_for(
                request.business_id,
                request.staff_id,
                request.starts_at.date_naive(),
                auth_token,
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        let within_hours = day.is_some_and(|day| {
            request.starts_at >= day.window.starts_at && ends_at <= day.window.ends_at
        });
        if !within_hours {
            warn!(
                "Requested start {} is outside business {} working hours",
                request.starts_at, request.business_id
            );
            return Err(BookingError::SlotNotAvailable);
        }

        let policy = self
            .policies
            .deposit_policy(request.business_id, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let global_score = self.global_risk_score(&client_email, auth_token).await?;
        let blacklisted = self.is_soft_blacklisted(&client_email, auth_token).await?;

        let percent = required_deposit_percent(
            business_base_percent(&policy),
            global_score,
            blacklisted,
        );
        let deposit_cents = required_deposit_cents(&policy, percent, service.price_cents);

        let status =
            self.lifecycle
                .initial_status(&policy, service.requires_confirmation, deposit_cents);
        let payment_due_at = (status == AppointmentStatus::AwaitingPayment)
            .then(|| now + ChronoDuration::hours(PAYMENT_DUE_HOURS));

        let customer_id = Uuid::parse_str(&user.id).ok();

        let body = json!({
            "business_id": request.business_id,
            "service_id": request.service_id,
            "staff_id": request.staff_id,
            "starts_at": request.starts_at.to_rfc3339(),
            "ends_at": ends_at.to_rfc3339(),
            "client_email": client_email,
            "customer_id": customer_id,
            "status": status.to_string(),
            "required_deposit_percent": percent,
            "required_deposit_cents": deposit_cents,
            "total_price_cents": service.price_cents,
            "payment_due_at": payment_due_at.map(|t| t.to_rfc3339()),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .persistence
            .insert_returning("/rest/v1/appointments", Some(auth_token), body)
            .await
            .map_err(|e| match e {
                PersistError::Conflict(_) => {
                    warn!(
                        "Overlap constraint rejected booking for staff {} at {}",
                        request.staff_id, request.starts_at
                    );
                    BookingError::SlotNotAvailable
                }
                other => persist_err(other),
            })?;

        let appointment = single_appointment(rows)?;

        self.notifier
            .dispatch(
                NotificationRequest {
                    business_id: appointment.business_id,
                    appointment_id: Some(appointment.id),
                    user_id: None,
                    kind: NotificationKind::AppointmentBooked,
                    payload: json!({
                        "title": "New booking",
                        "body": format!("{} booked {}", client_email, service.name),
                    }),
                },
                auth_token,
            )
            .await;

        info!("Appointment {} created in status {}", appointment.id, appointment.status);
        Ok(appointment)
    }

    // ==========================================================================
    // LOOKUPS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        single_appointment(rows)
    }

    /// Appointments belonging to the authenticated client, matched by
    /// customer id or booking email.
    pub async fn my_appointments(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        let filter = match &user.email {
            Some(email) => format!("or=(customer_id.eq.{},client_email.eq.{})", user.id, email),
            None => format!("customer_id=eq.{}", user.id),
        };
        let path = format!("/rest/v1/appointments?{}&order=starts_at.asc", filter);

        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| BookingError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    // ==========================================================================
    // CLIENT ACTIONS
    // ==========================================================================

    /// Client-initiated cancellation. Guarded by ownership, status
    /// eligibility, and the policy's cancellation window. A cancellation
    /// close to the start still records a late-cancel strike.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.is_owned_by(&user.id, user.email.as_deref()) {
            return Err(BookingError::Unauthorized);
        }
        if !self.lifecycle.can_client_cancel(appointment.status) {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let policy = self
            .policies
            .deposit_policy(appointment.business_id, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let minutes_before = whole_minutes_between(appointment.starts_at, now);
        if !self
            .lifecycle
            .is_change_allowed(appointment.starts_at, now, policy.min_cancel_minutes)
        {
            return Err(BookingError::OutsideChangeWindow);
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "status": AppointmentStatus::CanceledByClient.to_string(),
            "canceled_at": now.to_rfc3339(),
            "cancel_reason": format!("client_canceled_{}m", policy.min_cancel_minutes),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .persistence
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(persist_err)?;
        let updated = single_appointment(rows)?;

        if self.lifecycle.is_late_cancel(minutes_before, &policy) {
            self.record_risk_event(
                &appointment.client_email,
                appointment.business_id,
                RiskEvent::LateCancel,
                auth_token,
            )
            .await;
        }

        self.notifier
            .dispatch(
                NotificationRequest {
                    business_id: appointment.business_id,
                    appointment_id: Some(appointment.id),
                    user_id: None,
                    kind: NotificationKind::AppointmentCanceledByClient,
                    payload: json!({
                        "title": "Cancellation",
                        "body": "The client canceled within the allowed window.",
                    }),
                },
                auth_token,
            )
            .await;

        Ok(updated)
    }

    /// Client-initiated reschedule request. Shares the cancellation window
    /// gate; never moves the appointment, only notifies the business, which
    /// must act manually.
    pub async fn request_reschedule(
        &self,
        appointment_id: Uuid,
        note: Option<String>,
        user: &User,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        if let Some(note) = &note {
            if note.chars().count() > MAX_RESCHEDULE_NOTE_CHARS {
                return Err(BookingError::ValidationError(format!(
                    "Note must be at most {} characters",
                    MAX_RESCHEDULE_NOTE_CHARS
                )));
            }
        }

        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.is_owned_by(&user.id, user.email.as_deref()) {
            return Err(BookingError::Unauthorized);
        }
        if !self.lifecycle.can_request_reschedule(appointment.status) {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let policy = self
            .policies
            .deposit_policy(appointment.business_id, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if !self
            .lifecycle
            .is_change_allowed(appointment.starts_at, now, policy.min_cancel_minutes)
        {
            return Err(BookingError::OutsideChangeWindow);
        }

        self.notifier
            .dispatch(
                NotificationRequest {
                    business_id: appointment.business_id,
                    appointment_id: Some(appointment.id),
                    user_id: None,
                    kind: NotificationKind::AppointmentRescheduleRequest,
                    payload: json!({
                        "title": "Reschedule request",
                        "body": note.unwrap_or_else(|| {
                            "The client asked to move this appointment.".to_string()
                        }),
                    }),
                },
                auth_token,
            )
            .await;

        Ok(())
    }

    /// Client submits proof of an external payment. Bumps a freshly created
    /// appointment into awaiting_payment so the business sees it on the
    /// verification queue.
    pub async fn submit_payment_proof(
        &self,
        appointment_id: Uuid,
        request: PaymentProofRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if let Some(customer_id) = appointment.customer_id {
            if customer_id.to_string() != user.id {
                return Err(BookingError::Unauthorized);
            }
        }
        if appointment.status.is_terminal() {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let next_status = if appointment.status == AppointmentStatus::PendingConfirmation {
            AppointmentStatus::AwaitingPayment
        } else {
            appointment.status
        };

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "external_payment_method": request.method,
            "external_payment_proof_url": request.proof_url,
            "external_payment_status": "submitted",
            "status": next_status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .persistence
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(persist_err)?;
        let updated = single_appointment(rows)?;

        self.notifier
            .dispatch(
                NotificationRequest {
                    business_id: appointment.business_id,
                    appointment_id: Some(appointment.id),
                    user_id: None,
                    kind: NotificationKind::PaymentProofSubmitted,
                    payload: json!({
                        "title": "Deposit submitted",
                        "body": "The client submitted a payment proof.",
                    }),
                },
                auth_token,
            )
            .await;

        Ok(updated)
    }

    // ==========================================================================
    // BUSINESS ACTIONS
    // ==========================================================================

    /// Business verifies a submitted payment. Full prepayment settles the
    /// appointment as paid; a partial deposit confirms it.
    pub async fn confirm_payment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.assert_business_owner(appointment.business_id, user, auth_token)
            .await?;

        self.apply_payment_verified(&appointment, auth_token).await
    }

    /// Business marks the final outcome of an appointment. Outcomes feed the
    /// client's risk profiles in both scopes.
    pub async fn record_outcome(
        &self,
        appointment_id: Uuid,
        outcome: AppointmentOutcome,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.assert_business_owner(appointment.business_id, user, auth_token)
            .await?;

        let new_status = match outcome {
            AppointmentOutcome::Completed => AppointmentStatus::Completed,
            AppointmentOutcome::NoShow => AppointmentStatus::NoShow,
        };
        self.lifecycle
            .validate_status_transition(appointment.status, new_status)?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "status": new_status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .persistence
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(persist_err)?;
        let updated = single_appointment(rows)?;

        let event = match outcome {
            AppointmentOutcome::Completed => RiskEvent::Completed,
            AppointmentOutcome::NoShow => RiskEvent::NoShow,
        };
        self.record_risk_event(&appointment.client_email, appointment.business_id, event, auth_token)
            .await;

        Ok(updated)
    }

    /// Completion event reported back by the payment processor. The core's
    /// only obligation is the state-machine transition.
    pub async fn handle_payment_event(
        &self,
        event: PaymentWebhookEvent,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        if !event.paid {
            info!(
                "Payment event for appointment {} reported not paid, nothing to do",
                event.appointment_id
            );
            return Ok(());
        }

        let appointment = self.get_appointment(event.appointment_id, auth_token).await?;
        self.apply_payment_verified(&appointment, auth_token).await?;
        Ok(())
    }

    async fn apply_payment_verified(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let next_status = self.lifecycle.status_after_payment_verified(
            appointment.required_deposit_cents,
            appointment.total_price_cents,
        );
        self.lifecycle
            .validate_status_transition(appointment.status, next_status)?;

        let now = Utc::now();
        let mut body = json!({
            "status": next_status.to_string(),
            "external_payment_status": "verified",
            "updated_at": now.to_rfc3339(),
        });
        if next_status == AppointmentStatus::Paid {
            body["paid_at"] = json!(now.to_rfc3339());
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let rows: Vec<Value> = self
            .persistence
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(persist_err)?;
        let updated = single_appointment(rows)?;

        self.notifier
            .dispatch(
                NotificationRequest {
                    business_id: appointment.business_id,
                    appointment_id: Some(appointment.id),
                    user_id: appointment.customer_id,
                    kind: NotificationKind::PaymentConfirmed,
                    payload: json!({
                        "title": "Payment confirmed",
                        "body": if next_status == AppointmentStatus::Paid {
                            "Your appointment is fully paid."
                        } else {
                            "Deposit confirmed. Your appointment is confirmed."
                        },
                    }),
                },
                auth_token,
            )
            .await;

        Ok(updated)
    }

    // ==========================================================================
    // RISK PROFILE PLUMBING
    // ==========================================================================

    async fn global_risk_score(
        &self,
        client_email: &str,
        auth_token: &str,
    ) -> Result<i32, BookingError> {
        let profile = self
            .risk_profile(client_email, RiskScope::Global, None, auth_token)
            .await?;
        Ok(profile.map(|profile| profile.score).unwrap_or(0))
    }

    async fn risk_profile(
        &self,
        client_email: &str,
        scope: RiskScope,
        business_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<ClientRiskProfile>, BookingError> {
        let mut path = format!(
            "/rest/v1/client_risk_profiles?client_email=eq.{}&scope=eq.{}",
            client_email, scope
        );
        if let Some(id) = business_id {
            path.push_str(&format!("&business_id=eq.{}", id));
        }

        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| BookingError::DatabaseError(e.to_string())),
            None => Ok(None),
        }
    }

    async fn is_soft_blacklisted(
        &self,
        client_email: &str,
        auth_token: &str,
    ) -> Result<bool, BookingError> {
        let path = format!("/rest/v1/soft_blacklist?client_email=eq.{}", client_email);
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        Ok(!rows.is_empty())
    }

    /// Record a behavioral event against both the business-scoped and the
    /// global risk profile. The appointment write has already landed at this
    /// point, so a failed strike write must not fail the caller's request;
    /// it is logged and dropped, like a failed notification.
    async fn record_risk_event(
        &self,
        client_email: &str,
        business_id: Uuid,
        event: RiskEvent,
        auth_token: &str,
    ) {
        for scope_business in [Some(business_id), None] {
            if let Err(e) = self
                .apply_risk_event(client_email, scope_business, event, auth_token)
                .await
            {
                warn!("Risk profile update for {} failed: {}", client_email, e);
            }
        }
    }

    /// Fold a behavioral event into one (client, scope) risk profile.
    /// `business_id = None` targets the global scope. The write is a
    /// compare-and-swap on the observed score with bounded retry, so
    /// concurrent outcome events never lose an update.
    async fn apply_risk_event(
        &self,
        client_email: &str,
        business_id: Option<Uuid>,
        event: RiskEvent,
        auth_token: &str,
    ) -> Result<i32, BookingError> {
        let scope = match business_id {
            Some(_) => RiskScope::Business,
            None => RiskScope::Global,
        };

        for attempt in 0..RISK_CAS_MAX_ATTEMPTS {
            let profile = self
                .risk_profile(client_email, scope, business_id, auth_token)
                .await?;

            let now = Utc::now();
            match profile {
                Some(profile) => {
                    let current = profile.score;
                    let next = apply_event(current, event);
                    let mut write_path = format!(
                        "/rest/v1/client_risk_profiles?client_email=eq.{}&scope=eq.{}&score=eq.{}",
                        client_email, scope, current
                    );
                    if let Some(id) = business_id {
                        write_path.push_str(&format!("&business_id=eq.{}", id));
                    }
                    let updated: Vec<Value> = self
                        .persistence
                        .update_returning(
                            &write_path,
                            Some(auth_token),
                            json!({ "score": next, "updated_at": now.to_rfc3339() }),
                        )
                        .await
                        .map_err(persist_err)?;

                    if !updated.is_empty() {
                        return Ok(next);
                    }
                    debug!(
                        "Risk CAS miss for {} (attempt {}), retrying",
                        client_email,
                        attempt + 1
                    );
                }
                None => {
                    let next = apply_event(0, event);
                    let insert = self
                        .persistence
                        .insert_returning::<Vec<Value>>(
                            "/rest/v1/client_risk_profiles",
                            Some(auth_token),
                            json!({
                                "client_email": client_email,
                                "scope": scope.to_string(),
                                "business_id": business_id,
                                "score": next,
                                "updated_at": now.to_rfc3339(),
                            }),
                        )
                        .await;

                    match insert {
                        Ok(_) => return Ok(next),
                        // Lost the creation race; re-read and CAS.
                        Err(PersistError::Conflict(_)) => continue,
                        Err(other) => return Err(persist_err(other)),
                    }
                }
            }
        }

        warn!("Risk score update for {} contended past retry budget", client_email);
        Err(BookingError::DatabaseError(
            "Risk score update lost the write race repeatedly".to_string(),
        ))
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn get_service(
        &self,
        service_id: Uuid,
        auth_token: &str,
    ) -> Result<ServiceItem, BookingError> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        let row = rows.into_iter().next().ok_or(BookingError::ServiceNotFound)?;
        serde_json::from_value(row).map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    async fn assert_business_owner(
        &self,
        business_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let path = format!("/rest/v1/businesses?id=eq.{}&select=owner_id", business_id);
        let rows: Vec<Value> = self
            .persistence
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(persist_err)?;

        let owner_id = rows
            .first()
            .and_then(|row| row["owner_id"].as_str())
            .ok_or(BookingError::NotFound)?;

        if owner_id != user.id {
            return Err(BookingError::Unauthorized);
        }
        Ok(())
    }
}

fn single_appointment(rows: Vec<Value>) -> Result<Appointment, BookingError> {
    let row = rows.into_iter().next().ok_or(BookingError::NotFound)?;
    serde_json::from_value(row).map_err(|e| BookingError::DatabaseError(e.to_string()))
}

fn persist_err(error: PersistError) -> BookingError {
    match error {
        PersistError::NotFound(_) => BookingError::NotFound,
        PersistError::Auth(msg) => BookingError::ExternalServiceError(msg),
        other => BookingError::DatabaseError(other.to_string()),
    }
}
