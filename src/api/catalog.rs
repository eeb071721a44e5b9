use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use super::extract::Staff;
use super::state::AppState;
use crate::error::AppError;
use crate::models::{
    CreateCategoryRequest, CreateServiceRequest, Service, ServiceCategory, ServiceQuery,
    UpdateCategoryRequest, UpdateServiceRequest,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route(
            "/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    staff: Staff,
) -> Result<Json<Vec<ServiceCategory>>, AppError> {
    Ok(Json(state.catalog.list_categories(staff.business_id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_category(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateCategoryRequest>, AppError>,
) -> Result<(StatusCode, Json<ServiceCategory>), AppError> {
    request.validate()?;
    let category = state
        .catalog
        .create_category(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_category(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateCategoryRequest>, AppError>,
) -> Result<Json<ServiceCategory>, AppError> {
    request.validate()?;
    let category = state
        .catalog
        .update_category(staff.business_id, id, request)
        .await?;
    Ok(Json(category))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_category(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .catalog
        .delete_category(staff.business_id, id, &staff.audit)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_services(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Query(query), _): WithRejection<Query<ServiceQuery>, AppError>,
) -> Result<Json<Vec<Service>>, AppError> {
    Ok(Json(state.catalog.list_services(staff.business_id, &query).await?))
}

async fn get_service(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(state.catalog.get_service(staff.business_id, id).await?))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn create_service(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Json(request), _): WithRejection<Json<CreateServiceRequest>, AppError>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    request.validate()?;
    let service = state
        .catalog
        .create_service(staff.business_id, request, &staff.audit)
        .await?;
    Ok((StatusCode::CREATED, Json(service)))
}

#[tracing::instrument(skip(state, staff, request), fields(business_id = %staff.business_id))]
async fn update_service(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateServiceRequest>, AppError>,
) -> Result<Json<Service>, AppError> {
    request.validate()?;
    let service = state
        .catalog
        .update_service(staff.business_id, id, request, &staff.audit)
        .await?;
    Ok(Json(service))
}

#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn delete_service(
    State(state): State<AppState>,
    staff: Staff,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .catalog
        .delete_service(staff.business_id, id, &staff.audit)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
