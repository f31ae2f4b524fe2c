use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use therapist_cell::services::WorkingHoursService;
use therapist_cell::storage::{SupabaseTherapistStore, TherapistStore};
use therapist_cell::TimeRange;

async fn store_for(server: &MockServer) -> Arc<dyn TherapistStore> {
    let config = TestConfig::with_supabase(&server.uri()).to_app_config();
    Arc::new(SupabaseTherapistStore::new(Arc::new(SupabaseClient::new(&config))))
}

#[tokio::test]
async fn working_hours_come_from_schedule_and_exception_tables() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapists"))
        .and(query_param("id", format!("eq.{}", therapist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::therapist_response(&therapist_id, "Dana Speech")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_response(&therapist_id, "Mon", "09:00:00", "12:00:00"),
            MockSupabaseResponses::schedule_response(&therapist_id, "Wed", "13:00:00", "15:00:00"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "therapist_id": therapist_id,
            "date": "2030-06-03",
            "kind": "removed",
            "start_time": "10:00:00",
            "end_time": "10:30:00",
            "original_start": null,
            "original_end": null,
            "reason": null
        }])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let hours = WorkingHoursService::new(store)
        .for_date(
            Uuid::parse_str(&therapist_id).unwrap(),
            NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            "token",
        )
        .await
        .unwrap();

    assert_eq!(hours, vec![TimeRange::hm((9, 0), (10, 0)), TimeRange::hm((10, 30), (12, 0))]);
}

#[tokio::test]
async fn weekly_schedule_is_sorted_by_weekday() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_response(&therapist_id, "Fri", "08:00:00", "09:00:00"),
            MockSupabaseResponses::schedule_response(&therapist_id, "Mon", "09:00:00", "12:00:00"),
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let weekly = store
        .weekly_schedule(Uuid::parse_str(&therapist_id).unwrap(), "token")
        .await
        .unwrap();

    assert_eq!(weekly[0].day_of_week, Weekday::Mon);
    assert_eq!(weekly[1].day_of_week, Weekday::Fri);
}

fn tuesday_entry(therapist_id: Uuid) -> therapist_cell::ScheduleEntry {
    therapist_cell::ScheduleEntry {
        id: Uuid::new_v4(),
        therapist_id,
        day_of_week: Weekday::Tue,
        start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    }
}

async fn mount_existing_ids(server: &MockServer, table: &str, ids: &[Uuid]) {
    let rows: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
    Mock::given(method("GET"))
        .and(path(table))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn replace_schedule_inserts_then_drops_old_rows() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let old_id = Uuid::new_v4();
    let entry = tuesday_entry(therapist_id);

    mount_existing_ids(&server, "/rest/v1/therapist_schedules", &[old_id]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/therapist_schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": entry.id,
            "therapist_id": therapist_id,
            "day_of_week": "Tue",
            "start_time": "09:00:00",
            "end_time": "10:00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/therapist_schedules"))
        .and(query_param("id", format!("in.({})", old_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": old_id }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let stored = store
        .replace_weekly_schedule(therapist_id, &[entry], "token")
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn failed_schedule_insert_keeps_previous_rows() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    mount_existing_ids(&server, "/rest/v1/therapist_schedules", &[Uuid::new_v4()]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/therapist_schedules"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            MockSupabaseResponses::error_response("invalid input syntax", "22P02"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/therapist_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let result = store
        .replace_weekly_schedule(therapist_id, &[tuesday_entry(therapist_id)], "token")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn failed_exception_insert_keeps_previous_rows() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .and(query_param("date", "in.(2030-06-03)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let exception = therapist_cell::ScheduleException {
        id: Uuid::new_v4(),
        therapist_id,
        date,
        kind: therapist_cell::ExceptionKind::DayOff,
        start_time: None,
        end_time: None,
        original_start: None,
        original_end: None,
        reason: Some("Conference".to_string()),
    };

    let store = store_for(&server).await;
    let result = store
        .replace_exceptions(therapist_id, &[date], &[exception], "token")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn clearing_exceptions_deletes_only_the_listed_dates() {
    let server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let old_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .and(query_param("date", "in.(2030-06-03,2030-06-10)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": old_id }])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/therapist_schedule_exceptions"))
        .and(query_param("id", format!("in.({})", old_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": old_id }])))
        .expect(1)
        .mount(&server)
        .await;

    let dates = [
        NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
        NaiveDate::from_ymd_opt(2030, 6, 10).unwrap(),
    ];
    let store = store_for(&server).await;
    let stored = store
        .replace_exceptions(therapist_id, &dates, &[], "token")
        .await
        .unwrap();
    assert!(stored.is_empty());
}
