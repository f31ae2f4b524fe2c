// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use package_cell::LedgerService;
use shared_models::auth::{Actor, Capability};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusChange};
use crate::services::locks::SlotLocks;
use crate::storage::AppointmentStore;

/// Outcome of one `complete_elapsed` sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

pub struct LifecycleService {
    appointments: Arc<dyn AppointmentStore>,
    ledger: LedgerService,
    locks: Arc<SlotLocks>,
}

impl LifecycleService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        ledger: LedgerService,
        locks: Arc<SlotLocks>,
    ) -> Self {
        Self { appointments, ledger, locks }
    }

    /// The assigned therapist decides; an admin may step in only with the
    /// appointments capability.
    fn ensure_can_decide(actor: &Actor, appointment: &Appointment) -> Result<(), AppointmentError> {
        if actor.is(appointment.therapist_id) || actor.can(Capability::Appointments) {
            return Ok(());
        }
        warn!("{} is not allowed to decide appointment {}", actor.user_id, appointment.id);
        Err(AppointmentError::Forbidden(
            "Only the assigned therapist can manage this appointment".to_string(),
        ))
    }

    fn ensure_status(
        appointment: &Appointment,
        expected: AppointmentStatus,
        action: &'static str,
    ) -> Result<(), AppointmentError> {
        if appointment.status != expected {
            return Err(AppointmentError::InvalidTransition { from: appointment.status, action });
        }
        Ok(())
    }

    async fn load(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    /// Writes the change if the appointment is still in `from`. Losing the
    /// race reports the status the other writer left behind.
    async fn apply(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        change: StatusChange,
        action: &'static str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if let Some(updated) = self
            .appointments
            .transition(appointment_id, from, &change, auth_token)
            .await?
        {
            return Ok(updated);
        }

        let current = self.load(appointment_id, auth_token).await?;
        Err(AppointmentError::InvalidTransition { from: current.status, action })
    }

    pub async fn get(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, &actor.token).await?;
        if actor.is(appointment.therapist_id)
            || actor.is(appointment.patient_id)
            || actor.can(Capability::Appointments)
        {
            return Ok(appointment);
        }
        Err(AppointmentError::Forbidden("Not authorized to view this appointment".to_string()))
    }

    pub async fn approve(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, &actor.token).await?;
        Self::ensure_can_decide(actor, &appointment)?;
        Self::ensure_status(&appointment, AppointmentStatus::Pending, "approve")?;

        let _guard = self.locks.lock(appointment.therapist_id).await;

        let same_day = self
            .appointments
            .appointments_on(appointment.therapist_id, appointment.date, &actor.token)
            .await?;
        if let Some(clash) = same_day
            .iter()
            .find(|other| other.id != appointment.id && other.status.is_confirmed() && other.overlaps(&appointment))
        {
            return Err(AppointmentError::SlotUnavailable(format!(
                "{} on {} overlaps confirmed appointment {}",
                appointment.range(),
                appointment.date,
                clash.id
            )));
        }

        let change = StatusChange {
            status: AppointmentStatus::Accepted,
            decided_by: Some(actor.user_id),
            completed_at: None,
            updated_at: Utc::now(),
        };
        let updated = self
            .apply(appointment_id, AppointmentStatus::Pending, change, "approve", &actor.token)
            .await?;

        info!("Appointment {} approved by {}", appointment_id, actor.user_id);
        Ok(updated)
    }

    pub async fn reject(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, &actor.token).await?;
        Self::ensure_can_decide(actor, &appointment)?;
        Self::ensure_status(&appointment, AppointmentStatus::Pending, "reject")?;

        let change = StatusChange {
            status: AppointmentStatus::Rejected,
            decided_by: Some(actor.user_id),
            completed_at: None,
            updated_at: Utc::now(),
        };
        let updated = self
            .apply(appointment_id, AppointmentStatus::Pending, change, "reject", &actor.token)
            .await?;

        info!("Appointment {} rejected by {}", appointment_id, actor.user_id);
        Ok(updated)
    }

    /// Marks a held session as completed once its scheduled end has passed.
    /// A package-backed session takes its session from the ledger first; if
    /// the status write then fails the session is handed back.
    pub async fn complete(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, &actor.token).await?;
        Self::ensure_can_decide(actor, &appointment)?;
        Self::ensure_status(&appointment, AppointmentStatus::Accepted, "complete")?;

        if now < appointment.ends_at() {
            return Err(AppointmentError::NotElapsed(format!(
                "session ends at {}",
                appointment.ends_at().format("%Y-%m-%d %H:%M")
            )));
        }

        let _guard = self.locks.lock(appointment.therapist_id).await;

        // Another completion may have finished while waiting on the lock.
        let appointment = self.load(appointment_id, &actor.token).await?;
        Self::ensure_status(&appointment, AppointmentStatus::Accepted, "complete")?;

        if let Some(package_id) = appointment.package_id {
            self.ledger.consume(package_id, &actor.token).await?;
        }

        let change = StatusChange {
            status: AppointmentStatus::Completed,
            decided_by: None,
            completed_at: Some(Utc::now()),
            updated_at: Utc::now(),
        };
        let outcome = self
            .apply(appointment_id, AppointmentStatus::Accepted, change, "complete", &actor.token)
            .await;

        match outcome {
            Ok(updated) => {
                info!("Appointment {} completed", appointment_id);
                Ok(updated)
            }
            Err(err) => {
                if let Some(package_id) = appointment.package_id {
                    if let Err(release_err) = self.ledger.release(package_id, &actor.token).await {
                        error!(
                            "Could not return session to package {} after failed completion of {}: {}",
                            package_id, appointment_id, release_err
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Completes every accepted appointment whose end has passed. Failures
    /// are logged and left for the next sweep.
    pub async fn complete_elapsed(&self, actor: &Actor, now: NaiveDateTime) -> Result<SweepReport, AppointmentError> {
        let candidates = self.appointments.accepted_through(now.date(), &actor.token).await?;
        let mut report = SweepReport::default();

        for appointment in candidates.into_iter().filter(|a| a.ends_at() <= now) {
            match self.complete(actor, appointment.id, now).await {
                Ok(_) => report.completed.push(appointment.id),
                Err(err) => {
                    warn!("Auto-completion of appointment {} failed: {}", appointment.id, err);
                    report.failed.push(appointment.id);
                }
            }
        }

        debug!(
            "Completion sweep: {} completed, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub async fn list_for_therapist(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.is(therapist_id) && !actor.can(Capability::Appointments) {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this therapist's appointments".to_string(),
            ));
        }
        Ok(self.appointments.list_for_therapist(therapist_id, status, &actor.token).await?)
    }

    pub async fn list_pending(&self, actor: &Actor, therapist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_for_therapist(actor, therapist_id, Some(AppointmentStatus::Pending)).await
    }

    pub async fn list_for_patient(&self, actor: &Actor, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.is(patient_id) && !actor.can(Capability::Appointments) {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this patient's appointments".to_string(),
            ));
        }
        Ok(self.appointments.list_for_patient(patient_id, &actor.token).await?)
    }
}
