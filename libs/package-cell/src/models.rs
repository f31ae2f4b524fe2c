use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

/// A prepaid bundle of therapy sessions for one child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub child_id: Uuid,
    /// Parent account that owns the child.
    pub patient_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub total_sessions: i32,
    pub used_sessions: i32,
    pub valid_until: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Package {
    pub fn remaining(&self) -> i32 {
        (self.total_sessions - self.used_sessions).max(0)
    }

    pub fn status_on(&self, today: NaiveDate) -> PackageStatus {
        if self.remaining() == 0 {
            PackageStatus::Exhausted
        } else if self.valid_until < today {
            PackageStatus::Expired
        } else {
            PackageStatus::Active
        }
    }

    pub fn view(&self, today: NaiveDate) -> PackageView {
        PackageView {
            package: self.clone(),
            remaining: self.remaining(),
            status: self.status_on(today),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Active,
    Expired,
    Exhausted,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::Active => write!(f, "active"),
            PackageStatus::Expired => write!(f, "expired"),
            PackageStatus::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Package as shown to clients, with the derived fields filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageView {
    #[serde(flatten)]
    pub package: Package,
    pub remaining: i32,
    pub status: PackageStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePackageRequest {
    pub child_id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub total_sessions: i32,
    pub valid_until: NaiveDate,
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Package not found: {0}")]
    NotFound(Uuid),

    #[error("Package {0} has no remaining sessions")]
    Exhausted(Uuid),

    #[error("Package cannot be used: {0}")]
    Invalid(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Package {0} is being updated concurrently, try again")]
    Contention(Uuid),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for PackageError {
    fn from(err: anyhow::Error) -> Self {
        PackageError::Database(err.to_string())
    }
}

impl From<PackageError> for AppError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::NotFound(_) => AppError::NotFound(err.to_string()),
            PackageError::Exhausted(_) => AppError::PackageExhausted(err.to_string()),
            PackageError::Invalid(msg) => AppError::PackageInvalid(msg),
            PackageError::InvalidInput(msg) => AppError::InvalidInput(msg),
            PackageError::Forbidden(msg) => AppError::Forbidden(msg),
            PackageError::Contention(_) => AppError::Conflict(err.to_string()),
            PackageError::Database(msg) => AppError::Database(msg),
        }
    }
}
