use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};

use crate::models::{CreatePackageRequest, Package, PackageError, PackageStatus, PackageView};
use crate::storage::PackageStore;

/// Attempts at the compare-and-set before giving up with `Contention`.
const MAX_CAS_ATTEMPTS: usize = 5;

/// Owns every change to a package's session balance.
pub struct LedgerService {
    store: Arc<dyn PackageStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    pub async fn get_package(&self, package_id: Uuid, auth_token: &str) -> Result<Package, PackageError> {
        self.store
            .get_package(package_id, auth_token)
            .await?
            .ok_or(PackageError::NotFound(package_id))
    }

    /// Uses one session. Each attempt re-reads the balance and writes it back
    /// conditionally, so two consumers can never both take the last session.
    pub async fn consume(&self, package_id: Uuid, auth_token: &str) -> Result<Package, PackageError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let package = self.get_package(package_id, auth_token).await?;
            if package.remaining() < 1 {
                debug!("Package {} exhausted ({}/{})", package_id, package.used_sessions, package.total_sessions);
                return Err(PackageError::Exhausted(package_id));
            }

            let expected = package.used_sessions;
            if let Some(updated) = self
                .store
                .compare_and_set_used(package_id, expected, expected + 1, auth_token)
                .await?
            {
                info!(
                    "Consumed session from package {} ({}/{})",
                    package_id, updated.used_sessions, updated.total_sessions
                );
                return Ok(updated);
            }
            debug!("Package {} changed under us, attempt {}", package_id, attempt);
        }

        warn!("Gave up consuming package {} after {} attempts", package_id, MAX_CAS_ATTEMPTS);
        Err(PackageError::Contention(package_id))
    }

    /// Gives back a session taken by `consume`. Only used to compensate a
    /// completion that failed after the session was taken.
    pub async fn release(&self, package_id: Uuid, auth_token: &str) -> Result<Package, PackageError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let package = self.get_package(package_id, auth_token).await?;
            if package.used_sessions == 0 {
                return Err(PackageError::InvalidInput(format!(
                    "Package {} has no used sessions to release",
                    package_id
                )));
            }

            let expected = package.used_sessions;
            if let Some(updated) = self
                .store
                .compare_and_set_used(package_id, expected, expected - 1, auth_token)
                .await?
            {
                info!("Released session back to package {}", package_id);
                return Ok(updated);
            }
        }

        Err(PackageError::Contention(package_id))
    }

    /// Checks that a package can back a booking for `child_id` on `date`.
    /// Nothing is consumed here.
    pub async fn validate_for_booking(
        &self,
        package_id: Uuid,
        child_id: Uuid,
        date: NaiveDate,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Package, PackageError> {
        let package = match self.store.get_package(package_id, auth_token).await? {
            Some(package) => package,
            None => {
                return Err(PackageError::Invalid(format!("Package {} does not exist", package_id)));
            }
        };

        if package.child_id != child_id {
            return Err(PackageError::Invalid(format!(
                "Package {} does not belong to child {}",
                package_id, child_id
            )));
        }

        match package.status_on(today) {
            PackageStatus::Exhausted => Err(PackageError::Exhausted(package_id)),
            PackageStatus::Expired => Err(PackageError::Invalid(format!(
                "Package {} expired on {}",
                package_id, package.valid_until
            ))),
            PackageStatus::Active if package.valid_until < date => Err(PackageError::Invalid(format!(
                "Package {} is only valid until {}",
                package_id, package.valid_until
            ))),
            PackageStatus::Active => Ok(package),
        }
    }

    /// Usable packages of a child, soonest to expire first.
    pub async fn list_active(
        &self,
        child_id: Uuid,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<PackageView>, PackageError> {
        let mut active: Vec<Package> = self
            .store
            .packages_for_child(child_id, auth_token)
            .await?
            .into_iter()
            .filter(|p| p.status_on(today) == PackageStatus::Active)
            .collect();
        active.sort_by_key(|p| (p.valid_until, p.created_at));

        Ok(active.iter().map(|p| p.view(today)).collect())
    }

    /// Every package of a child regardless of status. Patients only see the
    /// packages they bought.
    pub async fn list_for_child(
        &self,
        actor: &Actor,
        child_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PackageView>, PackageError> {
        let packages = self.store.packages_for_child(child_id, &actor.token).await?;

        let visible = packages
            .iter()
            .filter(|p| actor.can(Capability::Appointments) || actor.is_therapist() || actor.is(p.patient_id))
            .map(|p| p.view(today))
            .collect();
        Ok(visible)
    }

    pub async fn create_package(
        &self,
        actor: &Actor,
        request: CreatePackageRequest,
    ) -> Result<Package, PackageError> {
        if !actor.can(Capability::Appointments) {
            return Err(PackageError::Forbidden(
                "Only administrators can create packages".to_string(),
            ));
        }
        if request.name.trim().is_empty() {
            return Err(PackageError::InvalidInput("Package name cannot be empty".to_string()));
        }
        if request.total_sessions < 1 {
            return Err(PackageError::InvalidInput(
                "Package must contain at least one session".to_string(),
            ));
        }

        let package = Package {
            id: Uuid::new_v4(),
            child_id: request.child_id,
            patient_id: request.patient_id,
            name: request.name.trim().to_string(),
            category: request.category,
            total_sessions: request.total_sessions,
            used_sessions: 0,
            valid_until: request.valid_until,
            created_at: Utc::now(),
        };

        let stored = self.store.insert_package(&package, &actor.token).await?;
        info!(
            "Created package {} with {} sessions for child {}",
            stored.id, stored.total_sessions, stored.child_id
        );
        Ok(stored)
    }
}
