use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{
    admin_only_middleware, extract_bearer_token, jwt_auth_middleware, request_origin, AuthError,
    AuthResponse, AuthService, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    MessageResponse, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenResponse,
    UserInfo, UserRole, UserSession,
};

/// Account routes: registration, sessions and password management.
pub fn auth_routes(auth_service: AuthService) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route(
            "/me",
            get(current_user).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .route(
            "/change-password",
            post(change_password).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .with_state(auth_service)
}

#[tracing::instrument(skip(auth_service, request))]
async fn register(
    State(auth_service): State<AuthService>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let response = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(auth_service, headers, request))]
async fn login(
    State(auth_service): State<AuthService>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = auth_service.login(request, request_origin(&headers)).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn refresh_token(
    State(auth_service): State<AuthService>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = auth_service.refresh_token(request).await?;
    Ok(Json(response))
}

/// Blacklists the presented access token.
#[tracing::instrument(skip(auth_service, headers))]
async fn logout(
    State(auth_service): State<AuthService>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let response = auth_service.logout(token, request_origin(&headers)).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, session))]
async fn current_user(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UserInfo>, AuthError> {
    Ok(Json(auth_service.current_user(&session).await?))
}

#[tracing::instrument(skip(auth_service, session, headers, request))]
async fn change_password(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = auth_service
        .change_password(&session, request, request_origin(&headers))
        .await?;
    Ok(Json(response))
}

/// Always answers with the same message, whether or not the e-mail exists.
#[tracing::instrument(skip(auth_service, request))]
async fn forgot_password(
    State(auth_service): State<AuthService>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    Ok(Json(auth_service.forgot_password(request).await?))
}

#[tracing::instrument(skip(auth_service, request))]
async fn reset_password(
    State(auth_service): State<AuthService>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    Ok(Json(auth_service.reset_password(request).await?))
}

/// Platform administration.
pub fn admin_routes(auth_service: AuthService) -> Router {
    Router::new()
        .route("/users/:id/role", put(update_user_role))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service.clone(),
            jwt_auth_middleware,
        ))
        .with_state(auth_service)
}

#[derive(Deserialize)]
struct UpdateRoleRequest {
    role: UserRole,
}

#[tracing::instrument(skip(auth_service, request))]
async fn update_user_role(
    State(auth_service): State<AuthService>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    auth_service.update_user_role(user_id, &request.role).await?;
    Ok(Json(MessageResponse {
        message: format!("Role updated to {}", request.role.as_str()),
    }))
}
