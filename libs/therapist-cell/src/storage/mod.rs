//! Storage abstraction for therapists and their working hours.

mod memory;
mod supabase;

pub use memory::InMemoryTherapistStore;
pub use supabase::SupabaseTherapistStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{ScheduleEntry, ScheduleException, Therapist};

#[async_trait]
pub trait TherapistStore: Send + Sync {
    async fn get_therapist(&self, therapist_id: Uuid, auth_token: &str) -> Result<Option<Therapist>>;

    async fn list_therapists(&self, auth_token: &str) -> Result<Vec<Therapist>>;

    /// Inserts or replaces the profile with the same id.
    async fn upsert_therapist(&self, therapist: &Therapist, auth_token: &str) -> Result<Therapist>;

    /// Weekly entries ordered by day then start time.
    async fn weekly_schedule(&self, therapist_id: Uuid, auth_token: &str) -> Result<Vec<ScheduleEntry>>;

    /// Stores `entries` as the therapist's weekly schedule. The previous entries
    /// are dropped only once the new ones are stored.
    async fn replace_weekly_schedule(
        &self,
        therapist_id: Uuid,
        entries: &[ScheduleEntry],
        auth_token: &str,
    ) -> Result<Vec<ScheduleEntry>>;

    /// Exceptions with `from <= date <= to`, ordered by date.
    async fn exceptions_between(
        &self,
        therapist_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ScheduleException>>;

    /// Stores `exceptions` in place of the therapist's exceptions on `dates`.
    /// The previous rows are dropped only once the new ones are stored.
    async fn replace_exceptions(
        &self,
        therapist_id: Uuid,
        dates: &[NaiveDate],
        exceptions: &[ScheduleException],
        auth_token: &str,
    ) -> Result<Vec<ScheduleException>>;
}
