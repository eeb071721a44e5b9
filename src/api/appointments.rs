use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    AgendaEntry, AgendaQuery, Appointment, AppointmentCreated, CompleteAppointmentRequest,
    CompletionResult, CreateAppointmentRequest, FirstAvailableQuery, FullDatesQuery, SlotQuery,
    UpdateAppointmentRequest,
};

/// Agenda, the booking wizard and appointment status transitions.
pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(agenda).post(create_appointment))
        .route("/overdue", get(overdue))
        .route("/slots", get(available_slots))
        .route("/full-dates", get(full_dates))
        .route("/first-available", get(first_available))
        .route(
            "/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/:id/complete", post(complete_appointment))
        .route("/:id/cancel", post(cancel_appointment))
        .route("/:id/no-show", post(mark_no_show))
}

async fn agenda(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<AgendaQuery>, AppError>,
) -> Result<Json<Vec<AgendaEntry>>, AppError> {
    Ok(Json(state.appointments.agenda(staff.business_id, &query).await?))
}

async fn overdue(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<AgendaEntry>>, AppError> {
    Ok(Json(state.appointments.overdue(staff.business_id).await?))
}

/// Staff view of the day: past slots stay bookable for walk-ins.
async fn available_slots(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<SlotQuery>, AppError>,
) -> Result<Json<Vec<String>>, AppError> {
    let query = SlotQuery {
        is_professional: true,
        ..query
    };
    Ok(Json(
        state
            .scheduling
            .get_available_slots(staff.business_id, &query)
            .await?,
    ))
}

async fn full_dates(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<FullDatesQuery>, AppError>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    Ok(Json(state.scheduling.get_full_dates(staff.business_id, &query).await?))
}

#[derive(Debug, Serialize)]
struct FirstAvailable {
    professional_id: Option<Uuid>,
}

async fn first_available(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<FirstAvailableQuery>, AppError>,
) -> Result<Json<FirstAvailable>, AppError> {
    let professional_id = state
        .scheduling
        .get_first_available_professional(staff.business_id, &query)
        .await?;
    Ok(Json(FirstAvailable { professional_id }))
}

async fn get_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.appointments.get(staff.business_id, id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateAppointmentRequest>, AppError>,
) -> Result<(StatusCode, Json<AppointmentCreated>), AppError> {
    request.validate()?;
    let created = state
        .appointments
        .create(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAppointmentRequest>, AppError>,
) -> Result<Json<Appointment>, AppError> {
    request.validate()?;
    let appointment = state
        .appointments
        .update(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(appointment))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn complete_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    request: Option<Json<CompleteAppointmentRequest>>,
) -> Result<Json<CompletionResult>, AppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let result = state
        .appointments
        .complete(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(result))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn cancel_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .appointments
            .cancel(staff.business_id, id, &staff.audit)
            .await?,
    ))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn mark_no_show(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .appointments
            .mark_no_show(staff.business_id, id, &staff.audit)
            .await?,
    ))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_appointment(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .appointments
        .delete(staff.business_id, id, &staff.audit)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
