use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc, Weekday};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};

use crate::models::{
    ExceptionKind, RegisterTherapistRequest, ScheduleEntry, ScheduleEntryInput, ScheduleException,
    ScheduleExceptionInput, Therapist, TherapistError, TherapistScheduleView, TimeRange,
};
use crate::storage::TherapistStore;

/// How far ahead the schedule view lists exceptions.
const EXCEPTION_HORIZON_DAYS: i64 = 90;

pub struct ScheduleService {
    store: Arc<dyn TherapistStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn TherapistStore>) -> Self {
        Self { store }
    }

    /// Only the therapist or an admin holding the appointments capability
    /// may change a therapist's working hours.
    pub fn ensure_can_manage(actor: &Actor, therapist_id: Uuid) -> Result<(), TherapistError> {
        if actor.is(therapist_id) || actor.can(Capability::Appointments) {
            return Ok(());
        }
        warn!("{} tried to manage the schedule of therapist {}", actor.user_id, therapist_id);
        Err(TherapistError::Forbidden(
            "Not authorized to manage this therapist's schedule".to_string(),
        ))
    }

    pub async fn register_therapist(
        &self,
        actor: &Actor,
        request: RegisterTherapistRequest,
    ) -> Result<Therapist, TherapistError> {
        if !actor.can(Capability::Appointments) {
            return Err(TherapistError::Forbidden(
                "Only administrators can register therapists".to_string(),
            ));
        }
        if request.full_name.trim().is_empty() {
            return Err(TherapistError::InvalidInput("Full name cannot be empty".to_string()));
        }

        let therapist = Therapist {
            id: request.id,
            full_name: request.full_name.trim().to_string(),
            specialties: request.specialties,
            is_active: true,
            created_at: Utc::now(),
        };

        let stored = self.store.upsert_therapist(&therapist, &actor.token).await?;
        info!("Registered therapist {}", stored.id);
        Ok(stored)
    }

    pub async fn list_therapists(&self, auth_token: &str) -> Result<Vec<Therapist>, TherapistError> {
        Ok(self.store.list_therapists(auth_token).await?)
    }

    /// Replaces the therapist's weekly schedule after checking that no two
    /// entries on the same day overlap.
    pub async fn update_weekly_schedule(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        inputs: Vec<ScheduleEntryInput>,
    ) -> Result<Vec<ScheduleEntry>, TherapistError> {
        Self::ensure_can_manage(actor, therapist_id)?;
        self.require_therapist(therapist_id, &actor.token).await?;

        let entries: Vec<ScheduleEntry> = inputs
            .into_iter()
            .map(|input| {
                TimeRange::new(input.start_time, input.end_time)?;
                Ok(ScheduleEntry {
                    id: Uuid::new_v4(),
                    therapist_id,
                    day_of_week: input.day_of_week,
                    start_time: input.start_time,
                    end_time: input.end_time,
                })
            })
            .collect::<Result<_, TherapistError>>()?;

        check_no_overlap(&entries)?;

        let stored = self.store
            .replace_weekly_schedule(therapist_id, &entries, &actor.token)
            .await?;
        info!("Weekly schedule of therapist {} now has {} entries", therapist_id, stored.len());
        Ok(stored)
    }

    /// Replaces the exceptions of every date mentioned in `inputs` or
    /// `clear_dates`.
    pub async fn update_exceptions(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        inputs: Vec<ScheduleExceptionInput>,
        clear_dates: Vec<NaiveDate>,
    ) -> Result<Vec<ScheduleException>, TherapistError> {
        Self::ensure_can_manage(actor, therapist_id)?;
        self.require_therapist(therapist_id, &actor.token).await?;

        let exceptions: Vec<ScheduleException> = inputs
            .into_iter()
            .map(|input| build_exception(therapist_id, input))
            .collect::<Result<_, _>>()?;

        let dates: Vec<NaiveDate> = exceptions
            .iter()
            .map(|e| e.date)
            .chain(clear_dates)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!("Replacing exceptions of therapist {} on {} date(s)", therapist_id, dates.len());
        let stored = self.store
            .replace_exceptions(therapist_id, &dates, &exceptions, &actor.token)
            .await?;
        info!("Stored {} schedule exception(s) for therapist {}", stored.len(), therapist_id);
        Ok(stored)
    }

    pub async fn schedule_view(
        &self,
        therapist_id: Uuid,
        from: NaiveDate,
        auth_token: &str,
    ) -> Result<TherapistScheduleView, TherapistError> {
        let therapist = self.require_therapist(therapist_id, auth_token).await?;
        let weekly = self.store.weekly_schedule(therapist_id, auth_token).await?;
        let exceptions = self.store
            .exceptions_between(
                therapist_id,
                from,
                from + Duration::days(EXCEPTION_HORIZON_DAYS),
                auth_token,
            )
            .await?;

        Ok(TherapistScheduleView { therapist, weekly, exceptions })
    }

    async fn require_therapist(&self, therapist_id: Uuid, auth_token: &str) -> Result<Therapist, TherapistError> {
        self.store
            .get_therapist(therapist_id, auth_token)
            .await?
            .ok_or(TherapistError::NotFound(therapist_id))
    }
}

fn check_no_overlap(entries: &[ScheduleEntry]) -> Result<(), TherapistError> {
    for day in [
        Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu,
        Weekday::Fri, Weekday::Sat, Weekday::Sun,
    ] {
        let mut ranges: Vec<TimeRange> = entries
            .iter()
            .filter(|e| e.day_of_week == day)
            .map(ScheduleEntry::range)
            .collect();
        ranges.sort_by_key(|r| r.start);

        if let Some(pair) = ranges.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
            return Err(TherapistError::ScheduleOverlap(format!(
                "{} and {} on {}",
                pair[0], pair[1], day
            )));
        }
    }
    Ok(())
}

fn build_exception(
    therapist_id: Uuid,
    input: ScheduleExceptionInput,
) -> Result<ScheduleException, TherapistError> {
    let range = match (input.start_time, input.end_time) {
        (Some(start), Some(end)) => Some(TimeRange::new(start, end)?),
        (None, None) => None,
        _ => {
            return Err(TherapistError::InvalidInput(
                "Exception needs both start and end time".to_string(),
            ))
        }
    };
    let original = match (input.original_start, input.original_end) {
        (Some(start), Some(end)) => Some(TimeRange::new(start, end)?),
        (None, None) => None,
        _ => {
            return Err(TherapistError::InvalidInput(
                "Edited exception needs both original start and end".to_string(),
            ))
        }
    };

    match input.kind {
        ExceptionKind::Added | ExceptionKind::Removed if range.is_none() => {
            return Err(TherapistError::InvalidInput(format!(
                "A {} exception needs a time range",
                input.kind
            )));
        }
        ExceptionKind::Edited if range.is_none() || original.is_none() => {
            return Err(TherapistError::InvalidInput(
                "An edited exception needs both the original and the new range".to_string(),
            ));
        }
        _ => {}
    }

    Ok(ScheduleException {
        id: Uuid::new_v4(),
        therapist_id,
        date: input.date,
        kind: input.kind,
        start_time: range.map(|r| r.start),
        end_time: range.map(|r| r.end),
        original_start: original.map(|r| r.start),
        original_end: original.map(|r| r.end),
        reason: input.reason,
    })
}

// Unit tests for the validation helpers; service flows live in tests/.
#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(day: Weekday, start: NaiveTime, end: NaiveTime) -> ScheduleEntry {
        ScheduleEntry { id: Uuid::new_v4(), therapist_id: Uuid::nil(), day_of_week: day, start_time: start, end_time: end }
    }

    #[test]
    fn overlapping_entries_on_same_day_are_rejected() {
        let entries = vec![entry(Weekday::Mon, t(9, 0), t(12, 0)), entry(Weekday::Mon, t(11, 0), t(13, 0))];
        assert_matches!(check_no_overlap(&entries), Err(TherapistError::ScheduleOverlap(_)));
    }

    #[test]
    fn same_range_on_different_days_is_fine() {
        let entries = vec![
            entry(Weekday::Mon, t(9, 0), t(12, 0)),
            entry(Weekday::Tue, t(9, 0), t(12, 0)),
            entry(Weekday::Mon, t(12, 0), t(13, 0)),
        ];
        assert!(check_no_overlap(&entries).is_ok());
    }

    #[test]
    fn removed_exception_without_range_is_invalid() {
        let input = ScheduleExceptionInput {
            date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            kind: ExceptionKind::Removed,
            start_time: None,
            end_time: None,
            original_start: None,
            original_end: None,
            reason: None,
        };
        assert_matches!(build_exception(Uuid::nil(), input), Err(TherapistError::InvalidInput(_)));
    }
}
