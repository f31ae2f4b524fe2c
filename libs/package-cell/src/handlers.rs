use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, Capability};
use shared_models::error::AppError;
use shared_utils::clock::clinic_today;

use crate::models::CreatePackageRequest;
use crate::router::PackageState;
use crate::services::LedgerService;

#[derive(Debug, Deserialize)]
pub struct ChildQuery {
    #[serde(rename = "childId", alias = "child_id")]
    pub child_id: Uuid,
}

pub async fn list_active_packages(
    State(state): State<Arc<PackageState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ChildQuery>,
) -> Result<Json<Value>, AppError> {
    let ledger = LedgerService::new(state.store.clone());
    let today = clinic_today();

    let packages: Vec<_> = ledger
        .list_active(query.child_id, today, &actor.token)
        .await?
        .into_iter()
        .filter(|view| actor.is(view.package.patient_id) || actor.is_therapist() || actor.can(Capability::Appointments))
        .collect();

    Ok(Json(json!({
        "child_id": query.child_id,
        "packages": packages,
    })))
}

pub async fn get_package(
    State(state): State<Arc<PackageState>>,
    Extension(actor): Extension<Actor>,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ledger = LedgerService::new(state.store.clone());
    let package = ledger.get_package(package_id, &actor.token).await?;

    if !(actor.is(package.patient_id) || actor.is_therapist() || actor.can(Capability::Appointments)) {
        return Err(AppError::Forbidden("Not authorized to view this package".to_string()));
    }

    Ok(Json(json!(package.view(clinic_today()))))
}

pub async fn create_package(
    State(state): State<Arc<PackageState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreatePackageRequest>,
) -> Result<Json<Value>, AppError> {
    let ledger = LedgerService::new(state.store.clone());
    let package = ledger.create_package(&actor, request).await?;
    Ok(Json(json!({
        "success": true,
        "package": package.view(clinic_today()),
    })))
}

pub async fn list_child_packages(
    State(state): State<Arc<PackageState>>,
    Extension(actor): Extension<Actor>,
    Path(child_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !actor.can(Capability::Appointments) {
        return Err(AppError::Forbidden("Administrator access required".to_string()));
    }
    let ledger = LedgerService::new(state.store.clone());
    let packages = ledger
        .list_for_child(&actor, child_id, clinic_today())
        .await?;
    Ok(Json(json!({
        "child_id": child_id,
        "packages": packages,
    })))
}
