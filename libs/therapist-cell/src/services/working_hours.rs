use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use crate::intervals;
use crate::models::{ExceptionKind, ScheduleEntry, ScheduleException, TherapistError, TimeRange};
use crate::storage::TherapistStore;

/// Working time on `date`: the weekly entries for that weekday, overridden by
/// the date's exceptions.
///
/// Exceptions apply in a fixed order so the result does not depend on how
/// they were stored: a `DayOff` empties the day, `Edited` moves blocks,
/// `Removed` cuts time out and `Added` puts time back in.
pub fn working_intervals(
    weekly: &[ScheduleEntry],
    exceptions: &[ScheduleException],
    date: NaiveDate,
) -> Vec<TimeRange> {
    let todays: Vec<&ScheduleException> = exceptions.iter().filter(|e| e.date == date).collect();
    let has = |kind: ExceptionKind| todays.iter().filter(move |e| e.kind == kind);

    let mut hours: Vec<TimeRange> = if has(ExceptionKind::DayOff).next().is_some() {
        Vec::new()
    } else {
        weekly
            .iter()
            .filter(|entry| entry.day_of_week == date.weekday())
            .map(ScheduleEntry::range)
            .collect()
    };
    hours = intervals::normalize(hours);

    for edit in has(ExceptionKind::Edited) {
        if let Some(original) = edit.original_range() {
            hours = intervals::subtract(&hours, &[original]);
        }
        if let Some(moved) = edit.range() {
            hours = intervals::union(&hours, &[moved]);
        }
    }

    let removed: Vec<TimeRange> = has(ExceptionKind::Removed).filter_map(|e| e.range()).collect();
    hours = intervals::subtract(&hours, &removed);

    let added: Vec<TimeRange> = has(ExceptionKind::Added).filter_map(|e| e.range()).collect();
    intervals::union(&hours, &added)
}

pub struct WorkingHoursService {
    store: Arc<dyn TherapistStore>,
}

impl WorkingHoursService {
    pub fn new(store: Arc<dyn TherapistStore>) -> Self {
        Self { store }
    }

    /// Working intervals of an existing therapist on `date`. Inactive
    /// therapists have none.
    pub async fn for_date(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeRange>, TherapistError> {
        let therapist = self.store
            .get_therapist(therapist_id, auth_token)
            .await?
            .ok_or(TherapistError::NotFound(therapist_id))?;

        if !therapist.is_active {
            debug!("Therapist {} is inactive, no working hours", therapist_id);
            return Ok(Vec::new());
        }

        let weekly = self.store.weekly_schedule(therapist_id, auth_token).await?;
        let exceptions = self.store
            .exceptions_between(therapist_id, date, date, auth_token)
            .await?;

        let hours = working_intervals(&weekly, &exceptions, date);
        debug!("Therapist {} works {} block(s) on {}", therapist_id, hours.len(), date);
        Ok(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn entry(therapist_id: Uuid, day: Weekday, range: TimeRange) -> ScheduleEntry {
        ScheduleEntry {
            id: Uuid::new_v4(),
            therapist_id,
            day_of_week: day,
            start_time: range.start,
            end_time: range.end,
        }
    }

    fn exception(
        therapist_id: Uuid,
        date: NaiveDate,
        kind: ExceptionKind,
        range: Option<TimeRange>,
        original: Option<TimeRange>,
    ) -> ScheduleException {
        ScheduleException {
            id: Uuid::new_v4(),
            therapist_id,
            date,
            kind,
            start_time: range.map(|r| r.start),
            end_time: range.map(|r| r.end),
            original_start: original.map(|r| r.start),
            original_end: original.map(|r| r.end),
            reason: None,
        }
    }

    // 2030-06-03 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 3).unwrap()
    }

    #[test]
    fn weekly_entries_for_matching_weekday_only() {
        let t = Uuid::new_v4();
        let weekly = vec![
            entry(t, Weekday::Mon, TimeRange::hm((9, 0), (12, 0))),
            entry(t, Weekday::Tue, TimeRange::hm((13, 0), (17, 0))),
        ];
        assert_eq!(working_intervals(&weekly, &[], monday()), vec![TimeRange::hm((9, 0), (12, 0))]);
    }

    #[test]
    fn removed_exception_cuts_the_monday_block() {
        let t = Uuid::new_v4();
        let weekly = vec![entry(t, Weekday::Mon, TimeRange::hm((9, 0), (12, 0)))];
        let exceptions = vec![exception(
            t,
            monday(),
            ExceptionKind::Removed,
            Some(TimeRange::hm((10, 0), (10, 30))),
            None,
        )];

        assert_eq!(
            working_intervals(&weekly, &exceptions, monday()),
            vec![TimeRange::hm((9, 0), (10, 0)), TimeRange::hm((10, 30), (12, 0))]
        );

        // The following Monday is untouched.
        let next = monday() + chrono::Duration::days(7);
        assert_eq!(working_intervals(&weekly, &exceptions, next), vec![TimeRange::hm((9, 0), (12, 0))]);
    }

    #[test]
    fn edited_exception_moves_a_block() {
        let t = Uuid::new_v4();
        let weekly = vec![
            entry(t, Weekday::Mon, TimeRange::hm((9, 0), (12, 0))),
            entry(t, Weekday::Mon, TimeRange::hm((14, 0), (16, 0))),
        ];
        let exceptions = vec![exception(
            t,
            monday(),
            ExceptionKind::Edited,
            Some(TimeRange::hm((15, 0), (18, 0))),
            Some(TimeRange::hm((14, 0), (16, 0))),
        )];
        assert_eq!(
            working_intervals(&weekly, &exceptions, monday()),
            vec![TimeRange::hm((9, 0), (12, 0)), TimeRange::hm((15, 0), (18, 0))]
        );
    }

    #[test]
    fn day_off_keeps_only_added_time() {
        let t = Uuid::new_v4();
        let weekly = vec![entry(t, Weekday::Mon, TimeRange::hm((9, 0), (12, 0)))];
        let exceptions = vec![
            exception(t, monday(), ExceptionKind::DayOff, None, None),
            exception(t, monday(), ExceptionKind::Added, Some(TimeRange::hm((18, 0), (19, 0))), None),
        ];
        assert_eq!(
            working_intervals(&weekly, &exceptions, monday()),
            vec![TimeRange::hm((18, 0), (19, 0))]
        );
    }
}
