// libs/appointment-cell/src/services/reports.rs
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};

use crate::models::{
    Appointment, AppointmentError, FilePayload, FileSource, FileUpload, PatientDocument, SessionReport,
};
use crate::storage::{AppointmentStore, ObjectStore, ReportStore};

pub const REPORTS_BUCKET: &str = "session-reports";
pub const DOCUMENTS_BUCKET: &str = "patient-documents";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Turns an upload payload into a file source. Inline data may be plain
/// base64 or a `data:<type>;base64,<data>` URL.
pub fn resolve_file(payload: FilePayload) -> Result<FileUpload, AppointmentError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppointmentError::InvalidInput("File name cannot be empty".to_string()));
    }

    let source = match (payload.file_data, payload.file_url) {
        (Some(data), None) => {
            let (content_type, encoded) = match data.strip_prefix("data:") {
                Some(rest) => {
                    let (meta, encoded) = rest.split_once(',').ok_or_else(|| {
                        AppointmentError::InvalidInput("Malformed data URL".to_string())
                    })?;
                    let content_type = meta.trim_end_matches(";base64");
                    (Some(content_type.to_string()), encoded.to_string())
                }
                None => (None, data),
            };

            let bytes = general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| AppointmentError::InvalidInput(format!("File is not valid base64: {}", e)))?;
            if bytes.is_empty() {
                return Err(AppointmentError::InvalidInput("File is empty".to_string()));
            }

            let content_type = payload
                .content_type
                .or(content_type)
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            FileSource::Inline { bytes, content_type }
        }
        (None, Some(url)) if url.starts_with("http://") || url.starts_with("https://") => {
            FileSource::Hosted(url)
        }
        (None, Some(url)) => {
            return Err(AppointmentError::InvalidInput(format!("Unsupported file link: {}", url)));
        }
        _ => {
            return Err(AppointmentError::InvalidInput(
                "Provide either file_data or file_url".to_string(),
            ));
        }
    };

    Ok(FileUpload {
        name,
        description: payload.description,
        source,
        dated: payload.date.map(|date| date.and_time(NaiveTime::MIN).and_utc()),
    })
}

pub struct ReportService {
    appointments: Arc<dyn AppointmentStore>,
    reports: Arc<dyn ReportStore>,
    objects: Arc<dyn ObjectStore>,
}

impl ReportService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        reports: Arc<dyn ReportStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { appointments, reports, objects }
    }

    async fn load_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    async fn store_file(
        &self,
        bucket: &str,
        owner_id: Uuid,
        upload: &FileUpload,
        auth_token: &str,
    ) -> Result<String, AppointmentError> {
        match &upload.source {
            FileSource::Hosted(url) => Ok(url.clone()),
            FileSource::Inline { bytes, content_type } => {
                let object_path = format!(
                    "{}/{}-{}",
                    owner_id,
                    Uuid::new_v4(),
                    urlencoding::encode(&upload.name)
                );
                debug!("Storing {} byte(s) at {}/{}", bytes.len(), bucket, object_path);
                self.objects
                    .put(bucket, &object_path, bytes.clone(), content_type, auth_token)
                    .await
                    .map_err(|e| AppointmentError::Storage(e.to_string()))
            }
        }
    }

    /// Whether the actor treats this patient, i.e. has at least one
    /// appointment with them.
    async fn treats_patient(&self, actor: &Actor, patient_id: Uuid) -> Result<bool, AppointmentError> {
        if !actor.is_therapist() {
            return Ok(false);
        }
        let appointments = self.appointments.list_for_patient(patient_id, &actor.token).await?;
        Ok(appointments.iter().any(|a| actor.is(a.therapist_id)))
    }

    // ==========================================================================
    // SESSION REPORTS
    // ==========================================================================

    pub async fn attach_report(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        upload: FileUpload,
    ) -> Result<SessionReport, AppointmentError> {
        let appointment = self.load_appointment(appointment_id, &actor.token).await?;
        if !actor.is(appointment.therapist_id) && !actor.is(appointment.patient_id) {
            warn!("{} tried to attach a report to appointment {}", actor.user_id, appointment_id);
            return Err(AppointmentError::Forbidden(
                "Only the session's therapist or patient can attach reports".to_string(),
            ));
        }

        let file_url = self
            .store_file(REPORTS_BUCKET, appointment.id, &upload, &actor.token)
            .await?;

        let report = SessionReport {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            uploaded_by: actor.user_id,
            name: upload.name,
            description: upload.description,
            file_url,
            uploaded_at: upload.dated.unwrap_or_else(Utc::now),
        };

        let stored = self.reports.insert_report(&report, &actor.token).await?;
        info!("Report {} attached to appointment {}", stored.id, appointment_id);
        Ok(stored)
    }

    pub async fn list_reports(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Vec<SessionReport>, AppointmentError> {
        let appointment = self.load_appointment(appointment_id, &actor.token).await?;
        if !actor.is(appointment.therapist_id)
            && !actor.is(appointment.patient_id)
            && !actor.can(Capability::Appointments)
        {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view reports of this session".to_string(),
            ));
        }
        Ok(self.reports.reports_for_appointment(appointment_id, &actor.token).await?)
    }

    pub async fn delete_report(&self, actor: &Actor, report_id: Uuid) -> Result<(), AppointmentError> {
        let report = self
            .reports
            .get_report(report_id, &actor.token)
            .await?
            .ok_or_else(|| AppointmentError::RecordNotFound(format!("Report {}", report_id)))?;

        let allowed = actor.is(report.uploaded_by) || actor.can(Capability::Appointments) || {
            match self.appointments.get_appointment(report.appointment_id, &actor.token).await? {
                Some(appointment) => actor.is(appointment.therapist_id),
                None => false,
            }
        };
        if !allowed {
            return Err(AppointmentError::Forbidden(
                "Not authorized to delete this report".to_string(),
            ));
        }

        self.reports.delete_report(report_id, &actor.token).await?;
        info!("Report {} deleted by {}", report_id, actor.user_id);
        Ok(())
    }

    // ==========================================================================
    // PATIENT DOCUMENTS
    // ==========================================================================

    async fn ensure_document_access(&self, actor: &Actor, patient_id: Uuid) -> Result<(), AppointmentError> {
        if actor.is(patient_id) || actor.can(Capability::Appointments) || self.treats_patient(actor, patient_id).await? {
            return Ok(());
        }
        Err(AppointmentError::Forbidden(
            "Not authorized to access this patient's documents".to_string(),
        ))
    }

    pub async fn attach_document(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        upload: FileUpload,
    ) -> Result<PatientDocument, AppointmentError> {
        self.ensure_document_access(actor, patient_id).await?;

        let file_url = self
            .store_file(DOCUMENTS_BUCKET, patient_id, &upload, &actor.token)
            .await?;

        let document = PatientDocument {
            id: Uuid::new_v4(),
            patient_id,
            uploaded_by: actor.user_id,
            name: upload.name,
            description: upload.description,
            file_url,
            uploaded_at: upload.dated.unwrap_or_else(Utc::now),
        };

        let stored = self.reports.insert_document(&document, &actor.token).await?;
        info!("Document {} stored for patient {}", stored.id, patient_id);
        Ok(stored)
    }

    pub async fn list_documents(
        &self,
        actor: &Actor,
        patient_id: Uuid,
    ) -> Result<Vec<PatientDocument>, AppointmentError> {
        self.ensure_document_access(actor, patient_id).await?;
        Ok(self.reports.documents_for_patient(patient_id, &actor.token).await?)
    }

    pub async fn delete_document(&self, actor: &Actor, document_id: Uuid) -> Result<(), AppointmentError> {
        let document = self
            .reports
            .get_document(document_id, &actor.token)
            .await?
            .ok_or_else(|| AppointmentError::RecordNotFound(format!("Document {}", document_id)))?;

        if !actor.is(document.uploaded_by)
            && !actor.is(document.patient_id)
            && !actor.can(Capability::Appointments)
        {
            return Err(AppointmentError::Forbidden(
                "Not authorized to delete this document".to_string(),
            ));
        }

        self.reports.delete_document(document_id, &actor.token).await?;
        info!("Document {} deleted by {}", document_id, actor.user_id);
        Ok(())
    }

    /// Admin-only. The appointment's reports go with it.
    pub async fn delete_appointment(&self, actor: &Actor, appointment_id: Uuid) -> Result<(), AppointmentError> {
        if !actor.can(Capability::Appointments) {
            return Err(AppointmentError::Forbidden(
                "Only administrators can delete appointments".to_string(),
            ));
        }
        if !self.appointments.delete_appointment(appointment_id, &actor.token).await? {
            return Err(AppointmentError::NotFound(appointment_id));
        }
        info!("Appointment {} and its reports deleted by {}", appointment_id, actor.user_id);
        Ok(())
    }
}
