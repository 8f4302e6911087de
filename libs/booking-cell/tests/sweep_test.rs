// libs/booking-cell/tests/sweep_test.rs
//
// Payment-timeout sweep against a mocked persistence API.

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::services::sweep::SweepService;
use shared_config::AppConfig;

fn test_config(base_url: String) -> AppConfig {
    AppConfig {
        supabase_url: base_url,
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-jwt-secret".to_string(),
        cron_secret: "test-cron-secret".to_string(),
        webhook_secret: "test-webhook-secret".to_string(),
    }
}

fn expired_row(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": "canceled_by_business",
        "cancel_reason": "payment_timeout",
    })
}

#[tokio::test]
async fn expiry_sweep_reports_how_many_rows_it_touched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.awaiting_payment"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            expired_row("0b9fa5f2-54ef-4b39-9d60-59a2f4f5c9b1"),
            expired_row("4dc2f7ce-8f0f-4b7a-a3a2-3f22a5a1c70d"),
        ])))
        .mount(&mock_server)
        .await;

    let sweep = SweepService::new(&test_config(mock_server.uri()));
    let expired = sweep.expire_unpaid(Utc::now(), "token").await.unwrap();

    assert_eq!(expired, 2);
}

#[tokio::test]
async fn expiry_sweep_is_idempotent_once_nothing_matches() {
    let mock_server = MockServer::start().await;

    // A second run right after a sweep: the filter matches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.awaiting_payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let sweep = SweepService::new(&test_config(mock_server.uri()));
    let expired = sweep.expire_unpaid(Utc::now(), "token").await.unwrap();

    assert_eq!(expired, 0);
}

#[tokio::test]
async fn expiry_sweep_surfaces_persistence_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let sweep = SweepService::new(&test_config(mock_server.uri()));
    let result = sweep.expire_unpaid(Utc::now(), "token").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn reminder_sweep_counts_emails_handed_to_the_transport() {
    let mock_server = MockServer::start().await;

    let reminder_row = json!({
        "id": "0b9fa5f2-54ef-4b39-9d60-59a2f4f5c9b1",
        "business_id": "7b1e9f52-dc3a-4f0e-91a7-2f8f7d7f3db1",
        "customer_id": "550e8400-e29b-41d4-a716-446655440000",
        "client_email": "client@example.com",
        "starts_at": "2026-09-08T10:00:00Z",
        "status": "confirmed",
        "businesses": { "name": "Salon Mare" },
        "services": { "name": "Haircut" },
    });

    // One upcoming appointment in each lead-time window.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([reminder_row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/send-status-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let sweep = SweepService::new(&test_config(mock_server.uri()));
    let sent = sweep.send_reminders(Utc::now(), "token").await.unwrap();

    assert_eq!(sent, 2);
}

#[tokio::test]
async fn reminder_sweep_skips_malformed_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "client_email": "client@example.com" }
        ])))
        .mount(&mock_server)
        .await;

    let sweep = SweepService::new(&test_config(mock_server.uri()));
    let sent = sweep.send_reminders(Utc::now(), "token").await.unwrap();

    assert_eq!(sent, 0);
}
