use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    AiosCampaign, AiosDiagnostic, CampaignStats, LogCampaignRequest, ReactivationMessage,
    ReactivationQuery,
};

/// Client recovery: churn diagnostic, campaign log and reactivation copy.
pub fn aios_routes() -> Router<AppState> {
    Router::new()
        .route("/diagnostic", get(diagnostic))
        .route("/campaigns", get(list_campaigns).post(log_campaign))
        .route("/campaigns/stats", get(campaign_stats))
        .route("/reactivation", get(reactivation))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn diagnostic(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<AiosDiagnostic>, AppError> {
    Ok(Json(state.aios.diagnostic(staff.business_id).await?))
}

async fn list_campaigns(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<AiosCampaign>>, AppError> {
    Ok(Json(state.aios.campaigns(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn log_campaign(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<LogCampaignRequest>, AppError>,
) -> Result<(StatusCode, Json<AiosCampaign>), AppError> {
    request.validate()?;
    let campaign = state.aios.log_campaign(staff.business_id, request).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

async fn campaign_stats(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<CampaignStats>, AppError> {
    Ok(Json(state.aios.campaign_stats(staff.business_id).await?))
}

async fn reactivation(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<ReactivationQuery>, AppError>,
) -> Result<Json<ReactivationMessage>, AppError> {
    Ok(Json(state.aios.reactivation(staff.business_id, &query).await?))
}
