use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde_json::json;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    AuditAction, AuditLog, AuditLogFilters, AuditLogView, CreateAuditLogRequest, DeletedItem,
    NewAuditEntry, RestoreRequest,
};

pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs).post(create_audit_log))
        .route("/export", get(export_audit_logs))
}

pub fn recycle_bin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deleted))
        .route("/restore", post(restore_item))
}

async fn list_audit_logs(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(filters), _): WithRejection<Query<AuditLogFilters>, AppError>,
) -> Result<Json<Vec<AuditLogView>>, AppError> {
    Ok(Json(state.audit.list(staff.session.user_id, &filters).await?))
}

/// Records an action performed on the client side.
#[tracing::instrument(skip(state, staff, request), fields(user_id = %staff.session.user_id))]
async fn create_audit_log(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateAuditLogRequest>, AppError>,
) -> Result<(StatusCode, Json<AuditLog>), AppError> {
    if request.action.trim().is_empty() || request.resource_type.trim().is_empty() {
        return Err(AppError::validation("action and resource_type are required"));
    }

    let mut entry = NewAuditEntry::custom(staff.audit.user_id, request.action.trim(), request.resource_type.trim())
        .origin(staff.audit.origin.clone())
        .values(request.old_values, request.new_values);
    if let Some(name) = staff.audit.user_name.clone() {
        entry = entry.user_name(name);
    }
    if let Some(id) = request.resource_id {
        entry = entry.resource(id);
    }
    if let Some(metadata) = request.metadata {
        entry = entry.metadata(metadata);
    }

    let log = state.audit.record(entry).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// CSV download of the filtered audit trail, times in the business offset.
#[tracing::instrument(skip(state, staff, filters), fields(user_id = %staff.session.user_id))]
async fn export_audit_logs(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(filters), _): WithRejection<Query<AuditLogFilters>, AppError>,
) -> Result<Response, AppError> {
    let offset = state
        .business
        .get_profile(staff.business_id)
        .await?
        .region()
        .offset();
    let csv = state
        .audit
        .export_csv(staff.session.user_id, &filters, offset)
        .await?;

    state
        .audit
        .record_quietly(
            staff
                .audit
                .entry(AuditAction::Export, "audit_logs")
                .metadata(json!({ "bytes": csv.len() })),
        )
        .await;

    let filename = format!(
        "attachment; filename=\"audit-logs-{}.csv\"",
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    )
        .into_response())
}

async fn list_deleted(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<DeletedItem>>, AppError> {
    Ok(Json(state.recycle_bin.list(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn restore_item(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<RestoreRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .recycle_bin
        .restore(staff.business_id, request.kind, request.id, &staff.audit)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
