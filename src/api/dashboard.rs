use axum::{
    extract::State,
    response::Json,
    routing::{get, put},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    ActionItem, DashboardOverview, DashboardStats, DataMaturity, FinancialDoctorReport,
    GoalHistoryEntry, ProfitMetrics, UpcomingAppointment, UpdateGoalRequest,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/stats", get(stats))
        .route("/upcoming", get(upcoming))
        .route("/goal", put(update_goal))
        .route("/goal-history", get(goal_history))
        .route("/maturity", get(maturity))
        .route("/profit-metrics", get(profit_metrics))
        .route("/financial-doctor", get(financial_doctor))
        .route("/action-items", get(action_items))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn overview(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<DashboardOverview>, AppError> {
    Ok(Json(state.dashboard.overview(staff.business_id).await?))
}

async fn stats(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.dashboard.stats(staff.business_id).await?))
}

async fn upcoming(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<UpcomingAppointment>>, AppError> {
    Ok(Json(state.dashboard.upcoming(staff.business_id).await?))
}

#[derive(Debug, Serialize)]
struct GoalUpdated {
    monthly_goal: f64,
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_goal(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<UpdateGoalRequest>, AppError>,
) -> Result<Json<GoalUpdated>, AppError> {
    request.validate()?;
    let monthly_goal = state
        .dashboard
        .update_goal(staff.business_id, request.monthly_goal)
        .await?;
    Ok(Json(GoalUpdated { monthly_goal }))
}

async fn goal_history(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<GoalHistoryEntry>>, AppError> {
    Ok(Json(state.dashboard.goal_history(staff.business_id).await?))
}

async fn maturity(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<DataMaturity>, AppError> {
    Ok(Json(state.dashboard.maturity(staff.business_id).await?))
}

async fn profit_metrics(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<ProfitMetrics>, AppError> {
    Ok(Json(state.dashboard.profit_metrics(staff.business_id).await?))
}

async fn financial_doctor(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<FinancialDoctorReport>, AppError> {
    Ok(Json(state.dashboard.financial_doctor(staff.business_id).await?))
}

async fn action_items(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<ActionItem>>, AppError> {
    Ok(Json(state.dashboard.action_items(staff.business_id).await?))
}
