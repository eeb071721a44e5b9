use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::auth::UserSession;
use crate::error::ServerErrorReport;
use crate::models::LogSeverity;
use crate::services::SystemLogService;

/// Persists every 5xx answer in the system log.
pub async fn record_server_errors(
    State(system_log): State<SystemLogService>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if let Some(report) = response.extensions().get::<ServerErrorReport>() {
        let user_id = response.extensions().get::<UserSession>().map(|s| s.user_id);
        let context = json!({
            "code": report.code,
            "method": method,
            "path": path,
            "status": response.status().as_u16(),
        });
        if let Err(err) = system_log
            .record(user_id, LogSeverity::Error, &report.message, None, None, context)
            .await
        {
            tracing::warn!(error = %err, "failed to persist server error");
        }
    }

    response
}
