// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::clock::{clinic_now, clinic_today};

use crate::models::{
    AppointmentStatus, AvailabilityRequest, AvailabilityView, BookAppointment, BookingRequest,
    SessionReportsRequest, TransitionRequest, UploadDocumentRequest, UploadReportRequest,
};
use crate::router::AppointmentState;
use crate::services::availability::parse_date;
use crate::services::booking::parse_booking_time;
use crate::services::reports::resolve_file;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub therapist_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub start: Option<String>,
    pub therapist_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TherapistListQuery {
    pub therapist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PatientListQuery {
    pub patient_id: Option<Uuid>,
}

// ==============================================================================
// AVAILABILITY AND BOOKING HANDLERS
// ==============================================================================

pub async fn check_availability(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&request.date)?;
    let availability = state.availability();

    let free = availability
        .free_intervals(request.therapist_id, date, &actor.token)
        .await?;
    let slots = therapist_cell::intervals::split_into_slots(&free, state.config.slot_minutes);

    Ok(Json(json!(AvailabilityView {
        therapist_id: request.therapist_id,
        date,
        free,
        slots,
    })))
}

pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&request.date)?;
    let range = parse_booking_time(&request.time, state.config.default_session_minutes)?;

    let appointment = state
        .booking()
        .book(
            &actor,
            BookAppointment {
                therapist_id: request.therapist_id,
                date,
                range,
                child_id: request.child_id,
                patient_id: request.patient_id,
                package_id: request.package_id,
                notes: request.notes,
            },
            clinic_today(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Booking request sent to the therapist for approval",
    })))
}

pub async fn get_therapist_availability(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;
    let therapist_id = query.therapist_id.unwrap_or(actor.user_id);
    let availability = state.availability();

    let free = availability.free_intervals(therapist_id, date, &actor.token).await?;
    let slots = therapist_cell::intervals::split_into_slots(&free, state.config.slot_minutes);

    Ok(Json(json!(AvailabilityView { therapist_id, date, free, slots })))
}

pub async fn get_weekly_overview(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Value>, AppError> {
    let week_start = match query.start.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => clinic_today(),
    };
    let therapist_id = query.therapist_id.unwrap_or(actor.user_id);

    let days = state
        .availability()
        .weekly_overview(therapist_id, week_start, &actor.token)
        .await?;

    Ok(Json(json!({
        "therapist_id": therapist_id,
        "week_start": week_start,
        "days": days,
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    let patient_id = query.patient_id.unwrap_or(actor.user_id);
    let appointments = state.lifecycle().list_for_patient(&actor, patient_id).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn get_therapist_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TherapistListQuery>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = query.therapist_id.unwrap_or(actor.user_id);
    let appointments = state
        .lifecycle()
        .list_for_therapist(&actor, therapist_id, query.status)
        .await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn get_pending_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TherapistListQuery>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = query.therapist_id.unwrap_or(actor.user_id);
    let appointments = state.lifecycle().list_pending(&actor, therapist_id).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle().get(&actor, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

pub async fn approve_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle().approve(&actor, request.appointment_id).await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn reject_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle().reject(&actor, request.appointment_id).await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .lifecycle()
        .complete(&actor, request.appointment_id, clinic_now())
        .await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.reports().delete_appointment(&actor, appointment_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted",
    })))
}

// ==============================================================================
// REPORT AND DOCUMENT HANDLERS
// ==============================================================================

pub async fn list_session_reports(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<SessionReportsRequest>,
) -> Result<Json<Value>, AppError> {
    if let Some(user_id) = request.user_id.filter(|id| *id != actor.user_id) {
        debug!("Ignoring userId {} in favour of the token's user {}", user_id, actor.user_id);
    }
    let reports = state.reports().list_reports(&actor, request.appointment_id).await?;
    Ok(Json(json!({
        "session_id": request.appointment_id,
        "reports": reports,
    })))
}

pub async fn upload_session_report(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UploadReportRequest>,
) -> Result<Json<Value>, AppError> {
    let upload = resolve_file(request.file)?;
    let report = state
        .reports()
        .attach_report(&actor, request.appointment_id, upload)
        .await?;
    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

pub async fn delete_session_report(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.reports().delete_report(&actor, report_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn upload_document(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UploadDocumentRequest>,
) -> Result<Json<Value>, AppError> {
    let upload = resolve_file(request.file)?;
    let document = state
        .reports()
        .attach_document(&actor, request.patient_id, upload)
        .await?;
    Ok(Json(json!({
        "success": true,
        "document": document,
    })))
}

pub async fn list_documents(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let documents = state.reports().list_documents(&actor, patient_id).await?;
    Ok(Json(json!({
        "patient_id": patient_id,
        "documents": documents,
    })))
}

pub async fn delete_document(
    State(state): State<Arc<AppointmentState>>,
    Extension(actor): Extension<Actor>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.reports().delete_document(&actor, document_id).await?;
    Ok(Json(json!({ "success": true })))
}
