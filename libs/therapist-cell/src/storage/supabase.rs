use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header::HeaderValue, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{ScheduleEntry, ScheduleException, Therapist};
use super::TherapistStore;

const THERAPISTS: &str = "/rest/v1/therapists";
const SCHEDULES: &str = "/rest/v1/therapist_schedules";
const EXCEPTIONS: &str = "/rest/v1/therapist_schedule_exceptions";

#[derive(Deserialize)]
struct RowId {
    id: Uuid,
}

fn in_list<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

pub struct SupabaseTherapistStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseTherapistStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn row_ids(&self, path: &str, auth_token: &str) -> Result<Vec<Uuid>> {
        let rows: Vec<RowId> = self.supabase.select(path, auth_token).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Deletes the rows that were replaced. Runs only after the new rows are
    /// stored, so a failed insert leaves the previous rows in place.
    async fn drop_replaced(&self, table: &str, ids: &[Uuid], auth_token: &str) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let path = format!("{}?id=in.({})", table, in_list(ids));
        let removed: Vec<Value> = self.supabase.delete_returning(&path, auth_token).await?;
        if removed.len() != ids.len() {
            warn!("Expected to remove {} row(s) from {}, removed {}", ids.len(), table, removed.len());
        }
        Ok(())
    }
}

#[async_trait]
impl TherapistStore for SupabaseTherapistStore {
    async fn get_therapist(&self, therapist_id: Uuid, auth_token: &str) -> Result<Option<Therapist>> {
        let path = format!("{}?id=eq.{}", THERAPISTS, therapist_id);
        let rows: Vec<Therapist> = self.supabase.select(&path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_therapists(&self, auth_token: &str) -> Result<Vec<Therapist>> {
        let path = format!("{}?order=full_name.asc", THERAPISTS);
        self.supabase.select(&path, auth_token).await
    }

    async fn upsert_therapist(&self, therapist: &Therapist, auth_token: &str) -> Result<Therapist> {
        let mut headers = SupabaseClient::representation_headers();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Therapist> = self.supabase.request_with_headers(
            Method::POST,
            THERAPISTS,
            Some(auth_token),
            Some(serde_json::to_value(therapist)?),
            Some(headers),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to store therapist {}", therapist.id))
    }

    async fn weekly_schedule(&self, therapist_id: Uuid, auth_token: &str) -> Result<Vec<ScheduleEntry>> {
        let path = format!(
            "{}?therapist_id=eq.{}&order=start_time.asc",
            SCHEDULES, therapist_id
        );
        let mut entries: Vec<ScheduleEntry> = self.supabase.select(&path, auth_token).await?;
        // Day names do not sort chronologically in the database.
        entries.sort_by_key(|e| (e.day_of_week.num_days_from_monday(), e.start_time));
        Ok(entries)
    }

    async fn replace_weekly_schedule(
        &self,
        therapist_id: Uuid,
        entries: &[ScheduleEntry],
        auth_token: &str,
    ) -> Result<Vec<ScheduleEntry>> {
        debug!("Replacing {} weekly entries for therapist {}", entries.len(), therapist_id);

        let replaced = self
            .row_ids(&format!("{}?therapist_id=eq.{}&select=id", SCHEDULES, therapist_id), auth_token)
            .await?;

        let mut stored: Vec<ScheduleEntry> = if entries.is_empty() {
            Vec::new()
        } else {
            self.supabase
                .write_returning(Method::POST, SCHEDULES, auth_token, serde_json::to_value(entries)?)
                .await?
        };

        let replaced: Vec<Uuid> = replaced
            .into_iter()
            .filter(|id| !stored.iter().any(|e| e.id == *id))
            .collect();
        self.drop_replaced(SCHEDULES, &replaced, auth_token).await?;

        stored.sort_by_key(|e| (e.day_of_week.num_days_from_monday(), e.start_time));
        Ok(stored)
    }

    async fn exceptions_between(
        &self,
        therapist_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ScheduleException>> {
        let path = format!(
            "{}?therapist_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            EXCEPTIONS, therapist_id, from, to
        );
        self.supabase.select(&path, auth_token).await
    }

    async fn replace_exceptions(
        &self,
        therapist_id: Uuid,
        dates: &[NaiveDate],
        exceptions: &[ScheduleException],
        auth_token: &str,
    ) -> Result<Vec<ScheduleException>> {
        let replaced = if dates.is_empty() {
            Vec::new()
        } else {
            let path = format!(
                "{}?therapist_id=eq.{}&date=in.({})&select=id",
                EXCEPTIONS, therapist_id, in_list(dates)
            );
            self.row_ids(&path, auth_token).await?
        };

        let stored: Vec<ScheduleException> = if exceptions.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<Value> = exceptions
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<_, _>>()?;
            self.supabase
                .write_returning(Method::POST, EXCEPTIONS, auth_token, json!(rows))
                .await?
        };

        let replaced: Vec<Uuid> = replaced
            .into_iter()
            .filter(|id| !stored.iter().any(|e| e.id == *id))
            .collect();
        self.drop_replaced(EXCEPTIONS, &replaced, auth_token).await?;

        Ok(stored)
    }
}
