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
use crate::models::{CreateTeamMemberRequest, TeamMember, UpdateTeamMemberRequest};

pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route("/:id", get(get_member).put(update_member).delete(delete_member))
}

#[derive(Debug, Default, Deserialize)]
struct TeamQuery {
    #[serde(default)]
    active_only: bool,
}

async fn list_members(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<TeamQuery>, AppError>,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    Ok(Json(state.team.list(staff.business_id, query.active_only).await?))
}

async fn get_member(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<TeamMember>, AppError> {
    Ok(Json(state.team.get(staff.business_id, id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_member(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateTeamMemberRequest>, AppError>,
) -> Result<(StatusCode, Json<TeamMember>), AppError> {
    request.validate()?;
    let member = state
        .team
        .create(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_member(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateTeamMemberRequest>, AppError>,
) -> Result<Json<TeamMember>, AppError> {
    request.validate()?;
    let member = state
        .team
        .update(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(member))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_member(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state.team.delete(staff.business_id, id, &staff.audit).await?;
    Ok(StatusCode::NO_CONTENT)
}
