use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_database::PersistenceClient;

use crate::models::{NotificationRequest, StatusEmail};

/// Fire-and-forget dispatch for in-app notifications and status emails.
///
/// Every method swallows its error after logging it: a notification failure
/// must never roll back an otherwise-successful appointment transition.
pub struct NotificationDispatcher {
    persistence: Arc<PersistenceClient>,
}

impl NotificationDispatcher {
    pub fn new(persistence: Arc<PersistenceClient>) -> Self {
        Self { persistence }
    }

    /// Record an in-app notification row for the business (or a specific
    /// user when `user_id` is set).
    pub async fn dispatch(&self, request: NotificationRequest, auth_token: &str) {
        let body = json!({
            "user_id": request.user_id,
            "business_id": request.business_id,
            "appointment_id": request.appointment_id,
            "kind": request.kind.as_str(),
            "channel": "in_app",
            "payload": request.payload,
        });

        let result: Result<Vec<Value>, _> = self
            .persistence
            .insert_returning("/rest/v1/notifications", Some(auth_token), body)
            .await;

        match result {
            Ok(_) => debug!("Dispatched {} notification", request.kind.as_str()),
            Err(e) => warn!("Failed to dispatch {} notification: {}", request.kind.as_str(), e),
        }
    }

    /// Hand a status email to the transport collaborator. The transport is a
    /// black box; only the request shape is owned here.
    pub async fn send_status_email(&self, email: StatusEmail, auth_token: &str) {
        let body = json!({
            "to": email.to,
            "business_name": email.business_name,
            "service_name": email.service_name,
            "starts_at": email.starts_at.to_rfc3339(),
            "status": email.status,
        });

        let result: Result<Value, _> = self
            .persistence
            .request(
                Method::POST,
                "/functions/v1/send-status-email",
                Some(auth_token),
                Some(body),
            )
            .await;

        if let Err(e) = result {
            warn!("Failed to request status email for {}: {}", email.to, e);
        }
    }
}
