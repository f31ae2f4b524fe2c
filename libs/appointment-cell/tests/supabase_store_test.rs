use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentStatus, StatusChange};
use appointment_cell::storage::{AppointmentStore, ObjectStore, SupabaseAppointmentStore, SupabaseObjectStore};
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn client_for(server: &MockServer) -> Arc<SupabaseClient> {
    let config = TestConfig::with_supabase(&server.uri()).to_app_config();
    Arc::new(SupabaseClient::new(&config))
}

fn approval(by: Uuid) -> StatusChange {
    StatusChange {
        status: AppointmentStatus::Accepted,
        decided_by: Some(by),
        completed_at: None,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn transition_is_conditional_on_current_status() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let mut row = MockSupabaseResponses::appointment_response(
        &therapist_id.to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "14:00:00",
        "15:00:00",
        "accepted",
    );
    let appointment_id = Uuid::new_v4();
    row["id"] = json!(appointment_id);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.pending"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client_for(&server));
    let updated = store
        .transition(appointment_id, AppointmentStatus::Pending, &approval(therapist_id), "token")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Accepted);
    assert_eq!(updated.start_time.to_string(), "14:00:00");
}

#[tokio::test]
async fn lost_transition_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client_for(&server));
    let outcome = store
        .transition(Uuid::new_v4(), AppointmentStatus::Pending, &approval(Uuid::new_v4()), "token")
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn day_query_filters_by_therapist_and_date() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("therapist_id", format!("eq.{}", therapist_id)))
        .and(query_param("date", "eq.2030-06-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&therapist_id, &patient_id, "2030-06-03", "09:00:00", "10:00:00", "pending"),
            MockSupabaseResponses::appointment_response(&therapist_id, &patient_id, "2030-06-03", "10:00:00", "11:00:00", "rejected"),
        ])))
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client_for(&server));
    let day = store
        .appointments_on(
            Uuid::parse_str(&therapist_id).unwrap(),
            NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            "token",
        )
        .await
        .unwrap();
    assert_eq!(day.len(), 2);
    assert_eq!(day[1].status, AppointmentStatus::Rejected);
}

#[tokio::test]
async fn delete_appointment_removes_reports_first() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/session_reports"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": appointment_id }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client_for(&server));
    assert!(store.delete_appointment(appointment_id, "token").await.unwrap());
}

#[tokio::test]
async fn object_upload_returns_public_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/session-reports/abc/report.pdf"))
        .and(header("content-type", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "session-reports/abc/report.pdf" })))
        .mount(&server)
        .await;

    let objects = SupabaseObjectStore::new(client_for(&server));
    let url = objects
        .put("session-reports", "abc/report.pdf", b"%PDF".to_vec(), "application/pdf", "token")
        .await
        .unwrap();
    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/session-reports/abc/report.pdf", server.uri())
    );
}
