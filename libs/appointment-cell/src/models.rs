// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use package_cell::PackageError;
use shared_models::error::AppError;
use therapist_cell::models::clock_time;
use therapist_cell::{TherapistError, TimeRange};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub therapist_id: Uuid,
    /// Parent account that booked the session.
    pub patient_id: Uuid,
    pub child_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub package_id: Option<Uuid>,
    pub notes: Option<String>,
    pub decided_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }

    /// Scheduled end as a clinic-local timestamp.
    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.therapist_id == other.therapist_id
            && self.date == other.date
            && self.range().overlaps(&other.range())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl AppointmentStatus {
    /// Statuses whose time range is taken out of the therapist's free time.
    pub fn blocks_slot(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Accepted | AppointmentStatus::Completed
        )
    }

    /// Statuses that must never overlap for one therapist.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, AppointmentStatus::Accepted | AppointmentStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Accepted => write!(f, "accepted"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Fields written by a lifecycle transition.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub decided_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A validated booking, ready for the availability and package checks.
#[derive(Debug, Clone)]
pub struct BookAppointment {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub child_id: Uuid,
    pub patient_id: Uuid,
    pub package_id: Option<Uuid>,
    pub notes: Option<String>,
}

// ==============================================================================
// SESSION REPORTS AND DOCUMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDocument {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Where an uploaded file comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// Raw bytes to push to object storage.
    Inline { bytes: Vec<u8>, content_type: String },
    /// A link that is already hosted somewhere.
    Hosted(String),
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub description: Option<String>,
    pub source: FileSource,
    /// Date the file belongs to; the upload time when absent.
    pub dated: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// `POST /patient/booking`. The date stays a string so a malformed one
/// comes back as `INVALID_INPUT`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRequest {
    pub date: String,
    pub therapist_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityView {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub free: Vec<TimeRange>,
    pub slots: Vec<TimeRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub free: Vec<TimeRange>,
}

/// `POST /patient/book`
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub date: String,
    /// `"HH:MM-HH:MM"` or a start time alone.
    pub time: String,
    #[serde(rename = "userId", alias = "patient_id")]
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    #[serde(rename = "childId", alias = "child_id")]
    pub child_id: Uuid,
    #[serde(rename = "packageId", alias = "package_id", default)]
    pub package_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of the approve/reject/complete endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    #[serde(rename = "tbs_id", alias = "appointment_id", alias = "id")]
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionReportsRequest {
    #[serde(rename = "sessionId", alias = "appointment_id")]
    pub appointment_id: Uuid,
    #[serde(rename = "userId", default)]
    pub user_id: Option<Uuid>,
}

/// File payload shared by report and document uploads. Exactly one of
/// `file_data` (base64, optionally a `data:` URL) and `file_url` is expected.
#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReportRequest {
    #[serde(rename = "sessionId", alias = "appointment_id")]
    pub appointment_id: Uuid,
    #[serde(flatten)]
    pub file: FilePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadDocumentRequest {
    #[serde(rename = "userId", alias = "patient_id")]
    pub patient_id: Uuid,
    #[serde(flatten)]
    pub file: FilePayload,
}

// ==============================================================================
// ERROR MODELS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Therapist not found: {0}")]
    TherapistNotFound(Uuid),

    #[error("{0} not found")]
    RecordNotFound(String),

    #[error("Requested time is not available: {0}")]
    SlotUnavailable(String),

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidTransition { from: AppointmentStatus, action: &'static str },

    #[error("Appointment cannot be completed yet: {0}")]
    NotElapsed(String),

    #[error("Package has no remaining sessions: {0}")]
    PackageExhausted(String),

    #[error("Package cannot be used: {0}")]
    PackageInvalid(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("File storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Database(err.to_string())
    }
}

impl From<TherapistError> for AppointmentError {
    fn from(err: TherapistError) -> Self {
        match err {
            TherapistError::NotFound(id) => AppointmentError::TherapistNotFound(id),
            TherapistError::InvalidInput(msg) => AppointmentError::InvalidInput(msg),
            TherapistError::ScheduleOverlap(msg) => AppointmentError::InvalidInput(msg),
            TherapistError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            TherapistError::Database(msg) => AppointmentError::Database(msg),
        }
    }
}

impl From<PackageError> for AppointmentError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Exhausted(_) => AppointmentError::PackageExhausted(err.to_string()),
            PackageError::Invalid(msg) => AppointmentError::PackageInvalid(msg),
            PackageError::NotFound(_) => AppointmentError::PackageInvalid(err.to_string()),
            PackageError::InvalidInput(msg) => AppointmentError::InvalidInput(msg),
            PackageError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            PackageError::Contention(_) => AppointmentError::Conflict(err.to_string()),
            PackageError::Database(msg) => AppointmentError::Database(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_)
            | AppointmentError::TherapistNotFound(_)
            | AppointmentError::RecordNotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::SlotUnavailable(_) => AppError::SlotUnavailable(err.to_string()),
            AppointmentError::InvalidTransition { .. } | AppointmentError::NotElapsed(_) => {
                AppError::InvalidTransition(err.to_string())
            }
            AppointmentError::PackageExhausted(msg) => AppError::PackageExhausted(msg),
            AppointmentError::PackageInvalid(msg) => AppError::PackageInvalid(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidInput(msg) => AppError::InvalidInput(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Storage(msg) => AppError::ExternalService(msg),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booking_request_accepts_client_field_names() {
        let therapist_id = Uuid::new_v4();
        let request: BookingRequest = serde_json::from_value(json!({
            "date": "2030-06-03",
            "time": "14:00-15:00",
            "userId": Uuid::new_v4(),
            "therapist_id": therapist_id,
            "childId": Uuid::new_v4(),
        }))
        .unwrap();
        assert_eq!(request.therapist_id, therapist_id);
        assert!(request.package_id.is_none());
    }

    #[test]
    fn transition_request_reads_tbs_id() {
        let id = Uuid::new_v4();
        let request: TransitionRequest = serde_json::from_value(json!({ "tbs_id": id })).unwrap();
        assert_eq!(request.appointment_id, id);
    }

    #[test]
    fn status_classes() {
        assert!(AppointmentStatus::Pending.blocks_slot());
        assert!(!AppointmentStatus::Rejected.blocks_slot());
        assert!(!AppointmentStatus::Pending.is_confirmed());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert_eq!(AppointmentStatus::Accepted.to_string(), "accepted");
    }

    #[test]
    fn lost_package_update_is_a_conflict() {
        let err = AppointmentError::from(PackageError::Contention(Uuid::new_v4()));
        assert!(matches!(err, AppointmentError::Conflict(_)));

        let app_err = AppError::from(err);
        assert_eq!(app_err.code(), "CONFLICT");
        assert_eq!(app_err.status(), axum::http::StatusCode::CONFLICT);
    }
}
