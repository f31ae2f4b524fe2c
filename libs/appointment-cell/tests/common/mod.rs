#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus, BookAppointment};
use appointment_cell::router::AppointmentState;
use appointment_cell::storage::{AppointmentStore, InMemoryAppointmentStore, InMemoryObjectStore};
use package_cell::models::{CreatePackageRequest, Package};
use package_cell::storage::InMemoryPackageStore;
use package_cell::LedgerService;
use shared_models::auth::Actor;
use shared_utils::clock::clinic_today;
use shared_utils::test_utils::{TestConfig, TestUser};
use therapist_cell::models::{ExceptionKind, RegisterTherapistRequest, ScheduleEntryInput, ScheduleExceptionInput};
use therapist_cell::services::ScheduleService;
use therapist_cell::storage::InMemoryTherapistStore;
use therapist_cell::TimeRange;

/// A clinic with one therapist working Mondays 09:00-12:00 and 14:00-17:00.
pub struct Clinic {
    pub state: Arc<AppointmentState>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub schedule: ScheduleService,
    pub ledger: LedgerService,
    pub therapist: TestUser,
    pub parent: TestUser,
    pub admin: TestUser,
    pub child_id: Uuid,
}

impl Clinic {
    pub async fn new() -> Self {
        let therapists = Arc::new(InMemoryTherapistStore::new());
        let packages = Arc::new(InMemoryPackageStore::new());
        let store = Arc::new(InMemoryAppointmentStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());

        let state = Arc::new(AppointmentState::new(
            TestConfig::default().to_arc(),
            therapists.clone(),
            packages.clone(),
            store.clone(),
            store.clone(),
            objects.clone(),
        ));

        let clinic = Self {
            state,
            store,
            objects,
            schedule: ScheduleService::new(therapists),
            ledger: LedgerService::new(packages),
            therapist: TestUser::therapist("therapist@example.com"),
            parent: TestUser::patient("parent@example.com"),
            admin: TestUser::admin("admin@example.com"),
            child_id: Uuid::new_v4(),
        };

        clinic.register_therapist(&clinic.therapist).await;
        clinic
    }

    pub async fn register_therapist(&self, therapist: &TestUser) {
        self.schedule
            .register_therapist(
                &self.admin.to_actor(),
                RegisterTherapistRequest {
                    id: therapist.uuid(),
                    full_name: "Dana Speech".to_string(),
                    specialties: vec!["Speech Therapy".to_string()],
                },
            )
            .await
            .unwrap();

        let monday = |range: TimeRange| ScheduleEntryInput {
            day_of_week: Weekday::Mon,
            start_time: range.start,
            end_time: range.end,
        };
        self.schedule
            .update_weekly_schedule(
                &therapist.to_actor(),
                therapist.uuid(),
                vec![
                    monday(TimeRange::hm((9, 0), (12, 0))),
                    monday(TimeRange::hm((14, 0), (17, 0))),
                ],
            )
            .await
            .unwrap();
    }

    pub async fn remove_time(&self, date: NaiveDate, range: TimeRange) {
        self.schedule
            .update_exceptions(
                &self.therapist.to_actor(),
                self.therapist.uuid(),
                vec![ScheduleExceptionInput {
                    date,
                    kind: ExceptionKind::Removed,
                    start_time: Some(range.start),
                    end_time: Some(range.end),
                    original_start: None,
                    original_end: None,
                    reason: Some("Team meeting".to_string()),
                }],
                Vec::new(),
            )
            .await
            .unwrap();
    }

    pub fn therapist_actor(&self) -> Actor {
        self.therapist.to_actor()
    }

    pub fn parent_actor(&self) -> Actor {
        self.parent.to_actor()
    }

    pub fn admin_actor(&self) -> Actor {
        self.admin.to_actor()
    }

    pub fn booking(&self, date: NaiveDate, range: TimeRange) -> BookAppointment {
        BookAppointment {
            therapist_id: self.therapist.uuid(),
            date,
            range,
            child_id: self.child_id,
            patient_id: self.parent.uuid(),
            package_id: None,
            notes: None,
        }
    }

    pub async fn book(&self, date: NaiveDate, range: TimeRange) -> Appointment {
        self.state
            .booking()
            .book(&self.parent_actor(), self.booking(date, range), clinic_today())
            .await
            .unwrap()
    }

    pub async fn book_accepted(&self, date: NaiveDate, range: TimeRange, package_id: Option<Uuid>) -> Appointment {
        let mut request = self.booking(date, range);
        request.package_id = package_id;
        let appointment = self
            .state
            .booking()
            .book(&self.parent_actor(), request, clinic_today())
            .await
            .unwrap();
        self.state
            .lifecycle()
            .approve(&self.therapist_actor(), appointment.id)
            .await
            .unwrap()
    }

    pub async fn package(&self, total: i32) -> Package {
        self.ledger
            .create_package(
                &self.admin_actor(),
                CreatePackageRequest {
                    child_id: self.child_id,
                    patient_id: self.parent.uuid(),
                    name: "Speech 10".to_string(),
                    category: Some("speech".to_string()),
                    total_sessions: total,
                    valid_until: clinic_today() + Duration::days(120),
                },
            )
            .await
            .unwrap()
    }

    /// Writes an appointment straight into the store, bypassing booking checks.
    pub async fn insert_raw(&self, date: NaiveDate, range: TimeRange, status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            therapist_id: self.therapist.uuid(),
            patient_id: self.parent.uuid(),
            child_id: self.child_id,
            date,
            start_time: range.start,
            end_time: range.end,
            status,
            package_id: None,
            notes: None,
            decided_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_appointment(&appointment, "token").await.unwrap()
    }
}

/// The first Monday strictly after today.
pub fn next_monday() -> NaiveDate {
    let mut date = clinic_today() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

/// Late on the given date, after every session has ended.
pub fn evening_of(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 0, 0).unwrap())
}
