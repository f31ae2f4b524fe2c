// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
    middleware,
};

use package_cell::{LedgerService, PackageStore};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use therapist_cell::TherapistStore;

use crate::handlers;
use crate::services::{AvailabilityService, BookingService, LifecycleService, ReportService, SlotLocks};
use crate::storage::{AppointmentStore, ObjectStore, ReportStore};

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub therapists: Arc<dyn TherapistStore>,
    pub packages: Arc<dyn PackageStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub reports: Arc<dyn ReportStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub locks: Arc<SlotLocks>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        therapists: Arc<dyn TherapistStore>,
        packages: Arc<dyn PackageStore>,
        appointments: Arc<dyn AppointmentStore>,
        reports: Arc<dyn ReportStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            therapists,
            packages,
            appointments,
            reports,
            objects,
            locks: Arc::new(SlotLocks::new()),
        }
    }

    pub fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(self.therapists.clone(), self.appointments.clone())
    }

    pub fn booking(&self) -> BookingService {
        BookingService::new(
            self.availability(),
            LedgerService::new(self.packages.clone()),
            self.appointments.clone(),
            self.locks.clone(),
        )
    }

    pub fn lifecycle(&self) -> LifecycleService {
        LifecycleService::new(
            self.appointments.clone(),
            LedgerService::new(self.packages.clone()),
            self.locks.clone(),
        )
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self.appointments.clone(), self.reports.clone(), self.objects.clone())
    }
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    let protected_routes = Router::new()
        // Patient portal
        .route("/patient/booking", post(handlers::check_availability))
        .route("/patient/book", post(handlers::book_appointment))
        .route("/patient/appointments", get(handlers::get_patient_appointments))
        .route("/patient/session-reports", post(handlers::list_session_reports))

        // Therapist portal
        .route("/therapist/appointments", get(handlers::get_therapist_appointments))
        .route("/therapist/appointments/pending", get(handlers::get_pending_appointments))
        .route("/therapist/appointments/approve", post(handlers::approve_appointment))
        .route("/therapist/appointments/reject", post(handlers::reject_appointment))
        .route("/therapist/appointments/complete", post(handlers::complete_appointment))
        .route("/therapist/availability", get(handlers::get_therapist_availability))
        .route("/therapist/week", get(handlers::get_weekly_overview))
        .route("/therapist/session-reports", post(handlers::list_session_reports))

        // Reports and documents
        .route("/session-reports/upload", post(handlers::upload_session_report))
        .route("/session-reports/{report_id}", delete(handlers::delete_session_report))
        .route("/documents/upload", post(handlers::upload_document))
        .route("/documents/{id}", get(handlers::list_documents).delete(handlers::delete_document))

        .route("/appointments/{appointment_id}", get(handlers::get_appointment))

        // Admin
        .route("/admin/appointments/{appointment_id}", delete(handlers::delete_appointment))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
