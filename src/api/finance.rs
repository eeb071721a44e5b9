use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    CommissionDue, CommissionsPaid, CreateExpenseRequest, FinanceRecord, FinanceStats,
    MarkCommissionsPaidRequest, PeriodQuery, UpdateExpenseRequest,
};

pub fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(finance_stats))
        .route("/records", get(list_records))
        .route("/expenses", post(create_expense))
        .route("/expenses/:id", put(update_expense).delete(delete_expense))
        .route("/commissions", get(commissions_due))
        .route("/commissions/pay", post(mark_commissions_paid))
        .route("/commissions/:professional_id", get(commission_details))
}

/// Revenue, expenses, commissions and profit; last 30 days by default.
async fn finance_stats(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<PeriodQuery>, AppError>,
) -> Result<Json<FinanceStats>, AppError> {
    Ok(Json(state.finance.stats(staff.business_id, &query).await?))
}

async fn list_records(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<PeriodQuery>, AppError>,
) -> Result<Json<Vec<FinanceRecord>>, AppError> {
    Ok(Json(state.finance.list_records(staff.business_id, &query).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_expense(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateExpenseRequest>, AppError>,
) -> Result<(StatusCode, Json<FinanceRecord>), AppError> {
    request.validate()?;
    let record = state
        .finance
        .create_expense(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_expense(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateExpenseRequest>, AppError>,
) -> Result<Json<FinanceRecord>, AppError> {
    request.validate()?;
    let record = state
        .finance
        .update_expense(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(record))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_expense(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .finance
        .delete_expense(staff.business_id, id, &staff.audit)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn commissions_due(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<CommissionDue>>, AppError> {
    Ok(Json(state.finance.commissions_due(staff.business_id).await?))
}

async fn commission_details(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(professional_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Vec<FinanceRecord>>, AppError> {
    let records = state
        .finance
        .commission_details(staff.business_id, professional_id)
        .await?;
    Ok(Json(records))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn mark_commissions_paid(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<MarkCommissionsPaidRequest>, AppError>,
) -> Result<Json<CommissionsPaid>, AppError> {
    let paid = state
        .finance
        .mark_commissions_paid(staff.business_id, request, &staff.audit)
        .await?;
    Ok(Json(paid))
}
