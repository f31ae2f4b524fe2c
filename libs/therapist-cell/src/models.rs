use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CLOCK TIMES
// ==============================================================================

/// Wall-clock times travel as `HH:MM`; `HH:MM:SS` (what Postgres `time`
/// columns return) is accepted on the way in.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S%.f"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(s) if s.trim().is_empty() => Ok(None),
                Some(s) => super::parse(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", s))),
            }
        }
    }
}

/// Half-open `[start, end)` range of wall-clock time within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TherapistError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Convenience for literals such as `TimeRange::hm((9, 0), (12, 0))`.
    pub fn hm(start: (u32, u32), end: (u32, u32)) -> Self {
        let at = |(h, m): (u32, u32)| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
        Self { start: at(start), end: at(end) }
    }

    /// Parses `"HH:MM-HH:MM"`.
    pub fn parse(raw: &str) -> Result<Self, TherapistError> {
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| TherapistError::InvalidInput(format!("Invalid time range: {}", raw)))?;
        let start = clock_time::parse(start)
            .ok_or_else(|| TherapistError::InvalidInput(format!("Invalid start time: {}", start)))?;
        let end = clock_time::parse(end)
            .ok_or_else(|| TherapistError::InvalidInput(format!("Invalid end time: {}", end)))?;
        Self::new(start, end)
    }

    pub fn validate(&self) -> Result<(), TherapistError> {
        if self.start >= self.end {
            return Err(TherapistError::InvalidInput(format!(
                "Start time must be before end time ({})",
                self
            )));
        }
        if self.start.second() != 0 || self.end.second() != 0 {
            return Err(TherapistError::InvalidInput(
                "Times must be whole minutes".to_string(),
            ));
        }
        Ok(())
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

// ==============================================================================
// THERAPIST AND SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One recurring weekly working block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub day_of_week: Weekday,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
}

impl ScheduleEntry {
    pub fn range(&self) -> TimeRange {
        TimeRange { start: self.start_time, end: self.end_time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Extra working time on the date.
    Added,
    /// Time taken out of the date's working hours.
    Removed,
    /// A recurring block moved to a different range on the date.
    Edited,
    /// No working time on the date apart from `Added` exceptions.
    DayOff,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::Added => write!(f, "added"),
            ExceptionKind::Removed => write!(f, "removed"),
            ExceptionKind::Edited => write!(f, "edited"),
            ExceptionKind::DayOff => write!(f, "day_off"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub kind: ExceptionKind,
    #[serde(default, with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub original_start: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub original_end: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl ScheduleException {
    pub fn range(&self) -> Option<TimeRange> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        }
    }

    pub fn original_range(&self) -> Option<TimeRange> {
        match (self.original_start, self.original_end) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryInput {
    #[serde(alias = "day")]
    pub day_of_week: Weekday,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    /// Admins may edit another therapist's schedule; therapists edit their own.
    pub therapist_id: Option<Uuid>,
    pub schedules: Vec<ScheduleEntryInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleExceptionInput {
    pub date: NaiveDate,
    #[serde(alias = "type")]
    pub kind: ExceptionKind,
    #[serde(default, with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub original_start: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub original_end: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExceptionsRequest {
    pub therapist_id: Option<Uuid>,
    pub exceptions: Vec<ScheduleExceptionInput>,
    /// Dates whose exceptions are cleared even if `exceptions` holds none for them.
    #[serde(default)]
    pub clear_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTherapistRequest {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistScheduleView {
    pub therapist: Therapist,
    pub weekly: Vec<ScheduleEntry>,
    pub exceptions: Vec<ScheduleException>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum TherapistError {
    #[error("Therapist not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Schedule entries overlap: {0}")]
    ScheduleOverlap(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for TherapistError {
    fn from(err: anyhow::Error) -> Self {
        TherapistError::Database(err.to_string())
    }
}

impl From<TherapistError> for AppError {
    fn from(err: TherapistError) -> Self {
        match err {
            TherapistError::NotFound(_) => AppError::NotFound(err.to_string()),
            TherapistError::InvalidInput(msg) => AppError::InvalidInput(msg),
            TherapistError::ScheduleOverlap(_) => AppError::Conflict(err.to_string()),
            TherapistError::Forbidden(msg) => AppError::Forbidden(msg),
            TherapistError::Database(msg) => AppError::Database(msg),
        }
    }
}
