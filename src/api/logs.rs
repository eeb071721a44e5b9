use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::auth::{extract_bearer_token, AuthService};
use crate::error::AppError;
use crate::models::{LogErrorRequest, SystemLog, SystemLogQuery};

/// Error reports forwarded by the UI. Anonymous reports are accepted.
pub fn report_routes() -> Router<AppState> {
    Router::new().route("/", post(report_error))
}

pub fn log_routes() -> Router<AppState> {
    Router::new().route("/", get(list_logs))
}

/// Owner of a valid bearer token, if one was presented.
async fn optional_user(auth: &AuthService, headers: &HeaderMap) -> Option<Uuid> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = extract_bearer_token(header).ok()?;
    auth.validate_session(token).await.ok().map(|s| s.user_id)
}

#[tracing::instrument(skip(state, headers, request))]
async fn report_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(request), _): WithRejection<Json<LogErrorRequest>, AppError>,
) -> Result<(StatusCode, Json<SystemLog>), AppError> {
    request.validate()?;
    let user_id = optional_user(&state.auth, &headers).await;
    let log = state.system_log.log_error(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn list_logs(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<SystemLogQuery>, AppError>,
) -> Result<Json<Vec<SystemLog>>, AppError> {
    Ok(Json(state.system_log.list(staff.session.user_id, &query).await?))
}
