use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::clock::clinic_today;

use crate::models::{RegisterTherapistRequest, UpdateExceptionsRequest, UpdateScheduleRequest};
use crate::router::TherapistState;
use crate::services::ScheduleService;

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: Option<NaiveDate>,
}

pub async fn update_schedule(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = request.therapist_id.unwrap_or(actor.user_id);
    let service = ScheduleService::new(state.store.clone());

    let schedules = service
        .update_weekly_schedule(&actor, therapist_id, request.schedules)
        .await?;

    Ok(Json(json!({
        "success": true,
        "therapist_id": therapist_id,
        "schedules": schedules,
    })))
}

pub async fn update_schedule_exceptions(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateExceptionsRequest>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = request.therapist_id.unwrap_or(actor.user_id);
    let service = ScheduleService::new(state.store.clone());

    let exceptions = service
        .update_exceptions(&actor, therapist_id, request.exceptions, request.clear_dates)
        .await?;

    Ok(Json(json!({
        "success": true,
        "therapist_id": therapist_id,
        "exceptions": exceptions,
    })))
}

pub async fn get_own_schedule(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());
    let from = query.from.unwrap_or_else(clinic_today);
    let view = service.schedule_view(actor.user_id, from, &actor.token).await?;
    Ok(Json(json!(view)))
}

pub async fn get_therapist_schedule(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
    Path(therapist_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());
    let from = query.from.unwrap_or_else(clinic_today);
    let view = service.schedule_view(therapist_id, from, &actor.token).await?;
    Ok(Json(json!(view)))
}

pub async fn list_therapists(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());
    let therapists = service.list_therapists(&actor.token).await?;
    Ok(Json(json!({ "therapists": therapists })))
}

pub async fn register_therapist(
    State(state): State<Arc<TherapistState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());
    let therapist = service.register_therapist(&actor, request).await?;
    Ok(Json(json!({
        "success": true,
        "therapist": therapist,
    })))
}
