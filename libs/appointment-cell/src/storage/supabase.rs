use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, PatientDocument, SessionReport, StatusChange};
use super::{AppointmentStore, ReportStore};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const SESSION_REPORTS: &str = "/rest/v1/session_reports";
const PATIENT_DOCUMENTS: &str = "/rest/v1/patient_documents";

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn insert_row<T>(&self, table: &str, row: Value, auth_token: &str) -> Result<T>
    where T: serde::de::DeserializeOwned {
        let rows: Vec<T> = self.supabase
            .write_returning(Method::POST, table, auth_token, row)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert into {} returned no row", table))
    }

    /// `DELETE` with representation so we can tell whether a row existed.
    async fn delete_rows(&self, path: &str, auth_token: &str) -> Result<usize> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                path,
                Some(auth_token),
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        let rows: Vec<Appointment> = self.supabase.select(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_appointment(&self, appointment: &Appointment, auth_token: &str) -> Result<Appointment> {
        self.insert_row(APPOINTMENTS, serde_json::to_value(appointment)?, auth_token).await
    }

    async fn appointments_on(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let path = format!(
            "{}?therapist_id=eq.{}&date=eq.{}&order=start_time.asc",
            APPOINTMENTS, therapist_id, date
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn list_for_therapist(
        &self,
        therapist_id: Uuid,
        status: Option<AppointmentStatus>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let mut path = format!("{}?therapist_id=eq.{}", APPOINTMENTS, therapist_id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=date.asc,start_time.asc");
        self.supabase.select(&path, auth_token).await
    }

    async fn list_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Appointment>> {
        let path = format!(
            "{}?patient_id=eq.{}&order=date.asc,start_time.asc",
            APPOINTMENTS, patient_id
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn accepted_through(&self, date: NaiveDate, auth_token: &str) -> Result<Vec<Appointment>> {
        let path = format!(
            "{}?status=eq.{}&date=lte.{}&order=date.asc,start_time.asc",
            APPOINTMENTS,
            AppointmentStatus::Accepted,
            date
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        change: &StatusChange,
        auth_token: &str,
    ) -> Result<Option<Appointment>> {
        // Filtering on the current status turns the update into a compare-and-set.
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, appointment_id, from);

        let mut body = json!({
            "status": change.status,
            "updated_at": change.updated_at,
        });
        if let Some(decided_by) = change.decided_by {
            body["decided_by"] = json!(decided_by);
        }
        if let Some(completed_at) = change.completed_at {
            body["completed_at"] = json!(completed_at);
        }

        debug!("Appointment {} {} -> {}", appointment_id, from, change.status);
        let rows: Vec<Appointment> = self.supabase
            .write_returning(Method::PATCH, &path, auth_token, body)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<bool> {
        let reports = self
            .delete_rows(&format!("{}?appointment_id=eq.{}", SESSION_REPORTS, appointment_id), auth_token)
            .await?;
        debug!("Deleted {} report(s) of appointment {}", reports, appointment_id);

        let deleted = self
            .delete_rows(&format!("{}?id=eq.{}", APPOINTMENTS, appointment_id), auth_token)
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ReportStore for SupabaseAppointmentStore {
    async fn insert_report(&self, report: &SessionReport, auth_token: &str) -> Result<SessionReport> {
        self.insert_row(SESSION_REPORTS, serde_json::to_value(report)?, auth_token).await
    }

    async fn reports_for_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<SessionReport>> {
        let path = format!(
            "{}?appointment_id=eq.{}&order=uploaded_at.desc",
            SESSION_REPORTS, appointment_id
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn get_report(&self, report_id: Uuid, auth_token: &str) -> Result<Option<SessionReport>> {
        let path = format!("{}?id=eq.{}", SESSION_REPORTS, report_id);
        let rows: Vec<SessionReport> = self.supabase.select(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_report(&self, report_id: Uuid, auth_token: &str) -> Result<bool> {
        let deleted = self
            .delete_rows(&format!("{}?id=eq.{}", SESSION_REPORTS, report_id), auth_token)
            .await?;
        Ok(deleted > 0)
    }

    async fn insert_document(&self, document: &PatientDocument, auth_token: &str) -> Result<PatientDocument> {
        self.insert_row(PATIENT_DOCUMENTS, serde_json::to_value(document)?, auth_token).await
    }

    async fn documents_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<PatientDocument>> {
        let path = format!(
            "{}?patient_id=eq.{}&order=uploaded_at.desc",
            PATIENT_DOCUMENTS, patient_id
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn get_document(&self, document_id: Uuid, auth_token: &str) -> Result<Option<PatientDocument>> {
        let path = format!("{}?id=eq.{}", PATIENT_DOCUMENTS, document_id);
        let rows: Vec<PatientDocument> = self.supabase.select(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_document(&self, document_id: Uuid, auth_token: &str) -> Result<bool> {
        let deleted = self
            .delete_rows(&format!("{}?id=eq.{}", PATIENT_DOCUMENTS, document_id), auth_token)
            .await?;
        Ok(deleted > 0)
    }
}
