use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{LogErrorRequest, LogSeverity, SystemLog, SystemLogQuery};

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 500;

/// Persistent error log, fed by client applications and by failed requests.
#[derive(Clone)]
pub struct SystemLogService {
    db: PgPool,
}

impl SystemLogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        severity: LogSeverity,
        message: &str,
        stack: Option<&str>,
        component_stack: Option<&str>,
        context: Value,
    ) -> Result<SystemLog, AppError> {
        match severity {
            LogSeverity::Critical | LogSeverity::Error => {
                tracing::error!(user_id = ?user_id, severity = severity.as_str(), %message, "system log")
            }
            LogSeverity::Warning => tracing::warn!(user_id = ?user_id, %message, "system log"),
            LogSeverity::Info => tracing::info!(user_id = ?user_id, %message, "system log"),
        }

        let log = sqlx::query_as::<_, SystemLog>(
            "INSERT INTO system_logs (id, user_id, message, stack, component_stack, severity, context)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, user_id, message, stack, component_stack, severity, context, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .bind(stack)
        .bind(component_stack)
        .bind(severity.as_str())
        .bind(context)
        .fetch_one(&self.db)
        .await?;

        Ok(log)
    }

    /// Error forwarded by a client application.
    pub async fn log_error(
        &self,
        user_id: Option<Uuid>,
        request: LogErrorRequest,
    ) -> Result<SystemLog, AppError> {
        self.record(
            user_id,
            request.severity,
            &request.message,
            request.stack.as_deref(),
            request.component_stack.as_deref(),
            request.context.unwrap_or_else(|| json!({})),
        )
        .await
    }

    pub async fn list(&self, user_id: Uuid, query: &SystemLogQuery) -> Result<Vec<SystemLog>, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);

        let mut sql = "SELECT id, user_id, message, stack, component_stack, severity, context, created_at
             FROM system_logs WHERE user_id = $1"
            .to_string();
        if query.severity.is_some() {
            sql.push_str(" AND severity = $2");
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT {limit}"));

        let mut builder = sqlx::query_as::<_, SystemLog>(&sql).bind(user_id);
        if let Some(severity) = query.severity {
            builder = builder.bind(severity.as_str());
        }

        Ok(builder.fetch_all(&self.db).await?)
    }
}
