use axum::{
    extract::State,
    response::Json,
    routing::{get, put},
    Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    BusinessHours, BusinessProfile, OnboardingStatus, OnboardingStepRequest, UpdateBusinessRequest,
};

/// Business profile, opening hours and onboarding progress.
pub fn business_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/hours", put(update_hours))
        .route("/onboarding", get(onboarding_status).put(update_onboarding_step))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn get_profile(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<BusinessProfile>, AppError> {
    Ok(Json(state.business.get_profile(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_profile(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<UpdateBusinessRequest>, AppError>,
) -> Result<Json<BusinessProfile>, AppError> {
    request.validate()?;
    let profile = state
        .business
        .update_profile(staff.business_id, request, &staff.audit)
        .await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state, staff, hours), fields(business_id = %staff.business_id))]
async fn update_hours(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(hours), _): WithRejection<Json<BusinessHours>, AppError>,
) -> Result<Json<BusinessHours>, AppError> {
    let hours = state
        .business
        .update_hours(staff.business_id, hours, &staff.audit)
        .await?;
    Ok(Json(hours))
}

async fn onboarding_status(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<OnboardingStatus>, AppError> {
    Ok(Json(state.business.onboarding_status(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn update_onboarding_step(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<OnboardingStepRequest>, AppError>,
) -> Result<Json<OnboardingStatus>, AppError> {
    let status = state
        .business
        .update_onboarding_step(staff.business_id, request.step)
        .await?;
    Ok(Json(status))
}
