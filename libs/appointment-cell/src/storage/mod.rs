//! Persistence for appointments, their session reports, patient documents
//! and uploaded files.

mod memory;
mod objects;
mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use objects::{InMemoryObjectStore, ObjectStore, SupabaseObjectStore};
pub use supabase::SupabaseAppointmentStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, PatientDocument, SessionReport, StatusChange};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>>;

    async fn insert_appointment(&self, appointment: &Appointment, auth_token: &str) -> Result<Appointment>;

    /// Every appointment of the therapist on `date`, any status.
    async fn appointments_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>>;

    async fn list_for_therapist(
        &self,
        therapist_id: Uuid,
        status: Option<AppointmentStatus>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>>;

    async fn list_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Appointment>>;

    /// Accepted appointments dated on or before `date`.
    async fn accepted_through(&self, date: NaiveDate, auth_token: &str) -> Result<Vec<Appointment>>;

    /// Applies `change` only while the appointment is still in `from`.
    /// `None` means the appointment moved on (or vanished) in the meantime.
    async fn transition(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        change: &StatusChange,
        auth_token: &str,
    ) -> Result<Option<Appointment>>;

    /// Deletes the appointment together with its session reports.
    async fn delete_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<bool>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: &SessionReport, auth_token: &str) -> Result<SessionReport>;

    /// Newest first.
    async fn reports_for_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<SessionReport>>;

    async fn get_report(&self, report_id: Uuid, auth_token: &str) -> Result<Option<SessionReport>>;

    async fn delete_report(&self, report_id: Uuid, auth_token: &str) -> Result<bool>;

    async fn insert_document(&self, document: &PatientDocument, auth_token: &str) -> Result<PatientDocument>;

    /// Newest first.
    async fn documents_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<PatientDocument>>;

    async fn get_document(&self, document_id: Uuid, auth_token: &str) -> Result<Option<PatientDocument>>;

    async fn delete_document(&self, document_id: Uuid, auth_token: &str) -> Result<bool>;
}
