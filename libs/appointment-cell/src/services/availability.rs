// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use futures::future::try_join_all;
use tracing::debug;
use uuid::Uuid;

use therapist_cell::intervals;
use therapist_cell::services::WorkingHoursService;
use therapist_cell::storage::TherapistStore;
use therapist_cell::TimeRange;

use crate::models::{Appointment, AppointmentError, DayAvailability};
use crate::storage::AppointmentStore;

/// Parses a wire date (`YYYY-MM-DD`).
pub fn parse_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::InvalidInput(format!("Invalid date: {}", raw)))
}

/// Working hours minus whatever is already booked.
pub fn free_from(working: &[TimeRange], appointments: &[Appointment]) -> Vec<TimeRange> {
    let taken: Vec<TimeRange> = appointments
        .iter()
        .filter(|a| a.status.blocks_slot())
        .map(|a| a.range())
        .collect();
    intervals::subtract(working, &taken)
}

pub struct AvailabilityService {
    working_hours: WorkingHoursService,
    appointments: Arc<dyn AppointmentStore>,
}

impl AvailabilityService {
    pub fn new(therapists: Arc<dyn TherapistStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self {
            working_hours: WorkingHoursService::new(therapists),
            appointments,
        }
    }

    pub async fn free_intervals(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeRange>, AppointmentError> {
        let working = self.working_hours.for_date(therapist_id, date, auth_token).await?;
        if working.is_empty() {
            return Ok(working);
        }

        let booked = self.appointments.appointments_on(therapist_id, date, auth_token).await?;
        let free = free_from(&working, &booked);
        debug!(
            "Therapist {} on {}: {} working block(s), {} booked, {} free",
            therapist_id,
            date,
            working.len(),
            booked.len(),
            free.len()
        );
        Ok(free)
    }

    pub async fn free_slots(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        slot_minutes: i64,
        auth_token: &str,
    ) -> Result<Vec<TimeRange>, AppointmentError> {
        if slot_minutes <= 0 {
            return Err(AppointmentError::InvalidInput(
                "Slot length must be positive".to_string(),
            ));
        }
        let free = self.free_intervals(therapist_id, date, auth_token).await?;
        Ok(intervals::split_into_slots(&free, slot_minutes))
    }

    /// Free intervals for the seven days starting at `week_start`.
    pub async fn weekly_overview(
        &self,
        therapist_id: Uuid,
        week_start: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<DayAvailability>, AppointmentError> {
        let days = (0..7).map(|offset| {
            let date = week_start + Duration::days(offset);
            async move {
                let free = self.free_intervals(therapist_id, date, auth_token).await?;
                Ok::<_, AppointmentError>(DayAvailability { date, free })
            }
        });
        try_join_all(days).await
    }
}
