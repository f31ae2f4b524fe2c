use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, PatientDocument, SessionReport, StatusChange};
use super::{AppointmentStore, ReportStore};

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    reports: HashMap<Uuid, SessionReport>,
    documents: HashMap<Uuid, PatientDocument>,
}

/// Process-local store used for local runs and tests. Appointments and
/// reports share one lock so deleting an appointment takes its reports along.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    tables: RwLock<Tables>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.date, a.start_time));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_appointment(&self, appointment_id: Uuid, _auth_token: &str) -> Result<Option<Appointment>> {
        Ok(self.tables.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: &Appointment, _auth_token: &str) -> Result<Appointment> {
        self.tables
            .write()
            .await
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn appointments_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let tables = self.tables.read().await;
        Ok(sorted(
            tables
                .appointments
                .values()
                .filter(|a| a.therapist_id == therapist_id && a.date == date)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_therapist(
        &self,
        therapist_id: Uuid,
        status: Option<AppointmentStatus>,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let tables = self.tables.read().await;
        Ok(sorted(
            tables
                .appointments
                .values()
                .filter(|a| a.therapist_id == therapist_id)
                .filter(|a| status.map_or(true, |s| a.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_patient(&self, patient_id: Uuid, _auth_token: &str) -> Result<Vec<Appointment>> {
        let tables = self.tables.read().await;
        Ok(sorted(
            tables
                .appointments
                .values()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }

    async fn accepted_through(&self, date: NaiveDate, _auth_token: &str) -> Result<Vec<Appointment>> {
        let tables = self.tables.read().await;
        Ok(sorted(
            tables
                .appointments
                .values()
                .filter(|a| a.status == AppointmentStatus::Accepted && a.date <= date)
                .cloned()
                .collect(),
        ))
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        change: &StatusChange,
        _auth_token: &str,
    ) -> Result<Option<Appointment>> {
        let mut tables = self.tables.write().await;
        match tables.appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = change.status;
                appointment.updated_at = change.updated_at;
                if change.decided_by.is_some() {
                    appointment.decided_by = change.decided_by;
                }
                if change.completed_at.is_some() {
                    appointment.completed_at = change.completed_at;
                }
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_appointment(&self, appointment_id: Uuid, _auth_token: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.appointments.remove(&appointment_id).is_some();
        tables.reports.retain(|_, r| r.appointment_id != appointment_id);
        Ok(removed)
    }
}

#[async_trait]
impl ReportStore for InMemoryAppointmentStore {
    async fn insert_report(&self, report: &SessionReport, _auth_token: &str) -> Result<SessionReport> {
        self.tables.write().await.reports.insert(report.id, report.clone());
        Ok(report.clone())
    }

    async fn reports_for_appointment(&self, appointment_id: Uuid, _auth_token: &str) -> Result<Vec<SessionReport>> {
        let tables = self.tables.read().await;
        let mut reports: Vec<SessionReport> = tables
            .reports
            .values()
            .filter(|r| r.appointment_id == appointment_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(reports)
    }

    async fn get_report(&self, report_id: Uuid, _auth_token: &str) -> Result<Option<SessionReport>> {
        Ok(self.tables.read().await.reports.get(&report_id).cloned())
    }

    async fn delete_report(&self, report_id: Uuid, _auth_token: &str) -> Result<bool> {
        Ok(self.tables.write().await.reports.remove(&report_id).is_some())
    }

    async fn insert_document(&self, document: &PatientDocument, _auth_token: &str) -> Result<PatientDocument> {
        self.tables.write().await.documents.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn documents_for_patient(&self, patient_id: Uuid, _auth_token: &str) -> Result<Vec<PatientDocument>> {
        let tables = self.tables.read().await;
        let mut documents: Vec<PatientDocument> = tables
            .documents
            .values()
            .filter(|d| d.patient_id == patient_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn get_document(&self, document_id: Uuid, _auth_token: &str) -> Result<Option<PatientDocument>> {
        Ok(self.tables.read().await.documents.get(&document_id).cloned())
    }

    async fn delete_document(&self, document_id: Uuid, _auth_token: &str) -> Result<bool> {
        Ok(self.tables.write().await.documents.remove(&document_id).is_some())
    }
}
