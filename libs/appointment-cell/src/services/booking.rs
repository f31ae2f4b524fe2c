// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use package_cell::LedgerService;
use shared_models::auth::{Actor, Capability};
use therapist_cell::models::clock_time;
use therapist_cell::{intervals, TimeRange};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointment};
use crate::services::availability::AvailabilityService;
use crate::services::locks::SlotLocks;
use crate::storage::AppointmentStore;

/// Reads the `time` field of a booking: either `"HH:MM-HH:MM"` or a start
/// time that gets the default session length.
pub fn parse_booking_time(raw: &str, default_minutes: i64) -> Result<TimeRange, AppointmentError> {
    if raw.contains('-') {
        return TimeRange::parse(raw).map_err(AppointmentError::from);
    }

    let start = clock_time::parse(raw)
        .ok_or_else(|| AppointmentError::InvalidInput(format!("Invalid time: {}", raw)))?;
    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(default_minutes));
    if wrapped != 0 {
        return Err(AppointmentError::InvalidInput(format!(
            "A {} minute session starting at {} runs past midnight",
            default_minutes,
            start.format("%H:%M")
        )));
    }
    TimeRange::new(start, end).map_err(AppointmentError::from)
}

pub struct BookingService {
    availability: AvailabilityService,
    ledger: LedgerService,
    appointments: Arc<dyn AppointmentStore>,
    locks: Arc<SlotLocks>,
}

impl BookingService {
    pub fn new(
        availability: AvailabilityService,
        ledger: LedgerService,
        appointments: Arc<dyn AppointmentStore>,
        locks: Arc<SlotLocks>,
    ) -> Self {
        Self { availability, ledger, appointments, locks }
    }

    /// Creates a pending appointment after checking the slot is free and,
    /// when a package is given, that it can pay for the session. The package
    /// balance is left alone until the session is completed.
    pub async fn book(
        &self,
        actor: &Actor,
        request: BookAppointment,
        today: NaiveDate,
    ) -> Result<Appointment, AppointmentError> {
        if !actor.is(request.patient_id) && !actor.can(Capability::Appointments) {
            warn!("{} tried to book on behalf of patient {}", actor.user_id, request.patient_id);
            return Err(AppointmentError::Forbidden(
                "Not authorized to book for this patient".to_string(),
            ));
        }
        if request.date < today {
            return Err(AppointmentError::InvalidInput(format!(
                "Cannot book a date in the past ({})",
                request.date
            )));
        }
        request.range.validate()?;

        let _guard = self.locks.lock(request.therapist_id).await;
        debug!(
            "Booking {} {} with therapist {}",
            request.date, request.range, request.therapist_id
        );

        let free = self
            .availability
            .free_intervals(request.therapist_id, request.date, &actor.token)
            .await?;
        if !intervals::covers(&free, &request.range) {
            return Err(AppointmentError::SlotUnavailable(format!(
                "{} on {} is not free",
                request.range, request.date
            )));
        }

        if let Some(package_id) = request.package_id {
            self.ledger
                .validate_for_booking(package_id, request.child_id, request.date, today, &actor.token)
                .await?;
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            therapist_id: request.therapist_id,
            patient_id: request.patient_id,
            child_id: request.child_id,
            date: request.date,
            start_time: request.range.start,
            end_time: request.range.end,
            status: AppointmentStatus::Pending,
            package_id: request.package_id,
            notes: request.notes,
            decided_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.appointments.insert_appointment(&appointment, &actor.token).await?;
        info!(
            therapist_id = %stored.therapist_id,
            appointment_id = %stored.id,
            "New booking request {} {} awaiting therapist approval",
            stored.date,
            stored.range()
        );
        Ok(stored)
    }
}
