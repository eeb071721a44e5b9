//! Unauthenticated booking page routes, and the customer portal opened by
//! phone identification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use super::extract::ClientCaller;
use super::state::AppState;
use crate::auth::{
    client_session_middleware, jwt_auth_middleware, rate_limit_middleware, AuthError, AuthService,
    ClientSessionResponse, PublicIdentifyRequest, RateLimiter,
};
use crate::error::AppError;
use crate::models::{
    ActiveBookingQuery, AgendaEntry, FullDatesQuery, JoinQueueRequest, PublicBooking,
    PublicBookingRequest, PublicBookingResult, PublicBusinessCard, QueuePosition,
    RescheduleQuery, RescheduleRequest, SlotQuery,
};

pub fn public_routes(rate_limiter: RateLimiter) -> Router<AppState> {
    let reads = Router::new()
        .route("/:slug", get(business_card))
        .route("/:slug/slots", get(available_slots))
        .route("/:slug/full-dates", get(full_dates))
        .route("/:slug/active-booking", get(active_booking))
        .route("/bookings/:id", get(booking_with_token))
        .route("/queue/:id", get(queue_position));

    let writes = Router::new()
        .route("/:slug/bookings", post(submit_booking))
        .route("/:slug/queue", post(join_queue))
        .route("/:slug/identify", post(identify_client))
        .route("/bookings/:id/reschedule", post(reschedule_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route_layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    reads.merge(writes)
}

/// Routes for a customer holding a client session token.
pub fn client_portal_routes(auth_service: AuthService) -> Router<AppState> {
    Router::new()
        .route("/appointments", get(my_appointments))
        .route_layer(middleware::from_fn(client_session_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
}

async fn business_card(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicBusinessCard>, AppError> {
    Ok(Json(state.bookings.card(&slug).await?))
}

async fn available_slots(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<SlotQuery>, AppError>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.bookings.slots(&slug, query).await?))
}

async fn full_dates(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<FullDatesQuery>, AppError>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    Ok(Json(state.bookings.full_dates(&slug, &query).await?))
}

async fn active_booking(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<ActiveBookingQuery>, AppError>,
) -> Result<Json<Option<PublicBooking>>, AppError> {
    Ok(Json(state.bookings.active_booking(&slug, &query.phone).await?))
}

#[tracing::instrument(skip(state, request))]
async fn submit_booking(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    WithRejection(Json(request), _): WithRejection<Json<PublicBookingRequest>, AppError>,
) -> Result<(StatusCode, Json<PublicBookingResult>), AppError> {
    request.validate()?;
    let result = state.bookings.submit(&slug, request).await?;
    let status = if result.existing {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)))
}

async fn booking_with_token(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<RescheduleQuery>, AppError>,
) -> Result<Json<PublicBooking>, AppError> {
    Ok(Json(state.bookings.get_with_token(id, &query.token).await?))
}

#[tracing::instrument(skip(state, request))]
async fn reschedule_booking(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<RescheduleRequest>, AppError>,
) -> Result<Json<PublicBooking>, AppError> {
    Ok(Json(state.bookings.reschedule(id, request).await?))
}

#[tracing::instrument(skip(state, query))]
async fn cancel_booking(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<RescheduleQuery>, AppError>,
) -> Result<Json<PublicBooking>, AppError> {
    Ok(Json(state.bookings.cancel(id, &query.token).await?))
}

#[tracing::instrument(skip(state, request))]
async fn join_queue(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    WithRejection(Json(request), _): WithRejection<Json<JoinQueueRequest>, AppError>,
) -> Result<(StatusCode, Json<QueuePosition>), AppError> {
    request.validate()?;
    let position = state.queue.join(&slug, request).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

async fn queue_position(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<QueuePosition>, AppError> {
    Ok(Json(state.queue.position(id).await?))
}

#[tracing::instrument(skip(state, request))]
async fn identify_client(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<PublicIdentifyRequest>,
) -> Result<Json<ClientSessionResponse>, AuthError> {
    let session = state.auth.identify_public_client(&slug, &request.phone).await?;
    Ok(Json(session))
}

async fn my_appointments(
    State(state): State<AppState>,
    caller: ClientCaller,
) -> Result<Json<Vec<AgendaEntry>>, AppError> {
    let appointments = state
        .bookings
        .client_appointments(caller.business_id, caller.client_id)
        .await?;
    Ok(Json(appointments))
}
