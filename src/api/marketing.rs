use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    AnalyzePhotoRequest, CalendarDay, CampaignSignals, CampaignSuggestion, PhotoAnalysis,
    SocialContent, SocialContentRequest,
};

/// AI-assisted marketing. Every route answers 503 while no API key is set.
pub fn marketing_routes() -> Router<AppState> {
    Router::new()
        .route("/photo-analysis", post(analyze_photo))
        .route("/social-content", post(social_content))
        .route("/content-calendar", post(content_calendar))
        .route("/campaign-signals", get(campaign_signals))
        .route("/campaign-opportunities", get(campaign_opportunities))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn analyze_photo(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<AnalyzePhotoRequest>, AppError>,
) -> Result<Json<PhotoAnalysis>, AppError> {
    request.validate()?;
    Ok(Json(state.marketing.analyze_photo(staff.business_id, request).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn social_content(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<SocialContentRequest>, AppError>,
) -> Result<Json<SocialContent>, AppError> {
    request.validate()?;
    Ok(Json(state.marketing.social_content(staff.business_id, request).await?))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn content_calendar(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    Ok(Json(state.marketing.content_calendar(staff.business_id).await?))
}

async fn campaign_signals(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<CampaignSignals>, AppError> {
    Ok(Json(state.marketing.campaign_signals(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn campaign_opportunities(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<CampaignSuggestion>>, AppError> {
    Ok(Json(
        state
            .marketing
            .campaign_opportunities(staff.business_id)
            .await?,
    ))
}
