use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{PublicBooking, QueueEntry, QueueMetrics, QueueTransitionRequest};

/// Staff side of online bookings: pending requests awaiting a decision.
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/reject", post(reject_booking))
}

/// Staff side of the walk-in queue.
pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_queue))
        .route("/metrics", get(queue_metrics))
        .route("/:id/status", put(transition_entry))
}

async fn list_pending(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<PublicBooking>>, AppError> {
    Ok(Json(state.bookings.list_pending(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn confirm_booking(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<PublicBooking>, AppError> {
    Ok(Json(
        state
            .bookings
            .confirm(staff.business_id, id, &staff.audit)
            .await?,
    ))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn reject_booking(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<PublicBooking>, AppError> {
    Ok(Json(
        state
            .bookings
            .reject(staff.business_id, id, &staff.audit)
            .await?,
    ))
}

async fn list_queue(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    Ok(Json(state.queue.list(staff.business_id).await?))
}

async fn queue_metrics(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<QueueMetrics>, AppError> {
    Ok(Json(state.queue.metrics(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn transition_entry(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<QueueTransitionRequest>, AppError>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = state
        .queue
        .transition(staff.business_id, id, request.status, &staff.audit)
        .await?;
    Ok(Json(entry))
}
