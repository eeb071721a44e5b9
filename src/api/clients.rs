use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{Client, ClientDetail, ClientQuery, CreateClientRequest, UpdateClientRequest};

/// CRM: clients with loyalty tier, next-visit prediction and history.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/lookup", get(lookup_by_phone))
        .route("/:id", get(client_detail).put(update_client).delete(delete_client))
}

async fn list_clients(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<ClientQuery>, AppError>,
) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.clients.list(staff.business_id, &query).await?))
}

#[derive(Debug, Deserialize)]
struct PhoneQuery {
    phone: String,
}

/// Exact match on the normalized phone digits.
async fn lookup_by_phone(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<PhoneQuery>, AppError>,
) -> Result<Json<Option<Client>>, AppError> {
    Ok(Json(state.clients.find_by_phone(staff.business_id, &query.phone).await?))
}

async fn client_detail(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<ClientDetail>, AppError> {
    Ok(Json(state.clients.detail(staff.business_id, id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_client(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateClientRequest>, AppError>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    request.validate()?;
    let client = state
        .clients
        .create(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_client(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateClientRequest>, AppError>,
) -> Result<Json<Client>, AppError> {
    request.validate()?;
    let client = state
        .clients
        .update(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(client))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_client(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state.clients.delete(staff.business_id, id, &staff.audit).await?;
    Ok(StatusCode::NO_CONTENT)
}
