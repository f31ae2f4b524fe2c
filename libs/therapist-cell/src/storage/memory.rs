use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ScheduleEntry, ScheduleException, Therapist};
use super::TherapistStore;

#[derive(Default)]
struct Tables {
    therapists: HashMap<Uuid, Therapist>,
    schedules: HashMap<Uuid, Vec<ScheduleEntry>>,
    exceptions: HashMap<Uuid, Vec<ScheduleException>>,
}

/// Process-local store used for development runs and tests.
#[derive(Default)]
pub struct InMemoryTherapistStore {
    tables: RwLock<Tables>,
}

impl InMemoryTherapistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TherapistStore for InMemoryTherapistStore {
    async fn get_therapist(&self, therapist_id: Uuid, _auth_token: &str) -> Result<Option<Therapist>> {
        Ok(self.tables.read().await.therapists.get(&therapist_id).cloned())
    }

    async fn list_therapists(&self, _auth_token: &str) -> Result<Vec<Therapist>> {
        let mut therapists: Vec<Therapist> =
            self.tables.read().await.therapists.values().cloned().collect();
        therapists.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(therapists)
    }

    async fn upsert_therapist(&self, therapist: &Therapist, _auth_token: &str) -> Result<Therapist> {
        self.tables
            .write()
            .await
            .therapists
            .insert(therapist.id, therapist.clone());
        Ok(therapist.clone())
    }

    async fn weekly_schedule(&self, therapist_id: Uuid, _auth_token: &str) -> Result<Vec<ScheduleEntry>> {
        let mut entries = self
            .tables
            .read()
            .await
            .schedules
            .get(&therapist_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(|e| (e.day_of_week.num_days_from_monday(), e.start_time));
        Ok(entries)
    }

    async fn replace_weekly_schedule(
        &self,
        therapist_id: Uuid,
        entries: &[ScheduleEntry],
        auth_token: &str,
    ) -> Result<Vec<ScheduleEntry>> {
        self.tables
            .write()
            .await
            .schedules
            .insert(therapist_id, entries.to_vec());
        self.weekly_schedule(therapist_id, auth_token).await
    }

    async fn exceptions_between(
        &self,
        therapist_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        _auth_token: &str,
    ) -> Result<Vec<ScheduleException>> {
        let mut found: Vec<ScheduleException> = self
            .tables
            .read()
            .await
            .exceptions
            .get(&therapist_id)
            .map(|all| {
                all.iter()
                    .filter(|e| e.date >= from && e.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|e| (e.date, e.start_time));
        Ok(found)
    }

    async fn replace_exceptions(
        &self,
        therapist_id: Uuid,
        dates: &[NaiveDate],
        exceptions: &[ScheduleException],
        _auth_token: &str,
    ) -> Result<Vec<ScheduleException>> {
        let mut tables = self.tables.write().await;
        let stored = tables.exceptions.entry(therapist_id).or_default();
        stored.retain(|e| !dates.contains(&e.date));
        stored.extend(exceptions.iter().cloned());
        Ok(exceptions.to_vec())
    }
}
