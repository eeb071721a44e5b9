use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::aios::aios_routes;
use super::appointments::appointment_routes;
use super::audit::{audit_routes, recycle_bin_routes};
use super::auth::{admin_routes, auth_routes};
use super::bookings::{booking_routes, queue_routes};
use super::business::business_routes;
use super::catalog::{category_routes, service_routes};
use super::clients::client_routes;
use super::dashboard::dashboard_routes;
use super::error_log::record_server_errors;
use super::events::event_routes;
use super::finance::finance_routes;
use super::health::health_check;
use super::logs::{log_routes, report_routes};
use super::marketing::marketing_routes;
use super::public::{client_portal_routes, public_routes};
use super::state::AppState;
use super::team::team_routes;
use crate::auth::{cors_layer, jwt_auth_middleware, owner_only_middleware, security_headers_layer};

pub fn create_routes(state: AppState) -> Router {
    let business = Router::new()
        .nest("/business", business_routes())
        .nest("/categories", category_routes())
        .nest("/services", service_routes())
        .nest("/team", team_routes())
        .nest("/clients", client_routes())
        .nest("/appointments", appointment_routes())
        .nest("/bookings", booking_routes())
        .nest("/queue", queue_routes())
        .nest("/finance", finance_routes())
        .nest("/dashboard", dashboard_routes())
        .nest("/aios", aios_routes())
        .nest("/marketing", marketing_routes())
        .nest("/audit-logs", audit_routes())
        .nest("/recycle-bin", recycle_bin_routes())
        .nest("/logs", log_routes())
        .nest("/events", event_routes())
        .route_layer(middleware::from_fn(owner_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ));

    let api = Router::new()
        .nest("/api", business)
        .nest("/api/public", public_routes(state.rate_limiter.clone()))
        .nest("/api/client", client_portal_routes(state.auth.clone()))
        .merge(Router::new().nest("/api/logs", report_routes()))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes(state.auth.clone()))
        .nest("/api/admin", admin_routes(state.auth.clone()))
        .merge(api)
        .layer(middleware::from_fn_with_state(
            state.system_log.clone(),
            record_server_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
}
