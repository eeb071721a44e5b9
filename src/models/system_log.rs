use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub message: String,
    pub stack: Option<String>,
    pub component_stack: Option<String>,
    pub severity: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

/// Error forwarded by a client application.
#[derive(Debug, Deserialize, Validate)]
pub struct LogErrorRequest {
    #[validate(length(min = 1, max = 4000, message = "message is required"))]
    pub message: String,
    pub stack: Option<String>,
    pub component_stack: Option<String>,
    #[serde(default)]
    pub severity: LogSeverity,
    pub context: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemLogQuery {
    pub severity: Option<LogSeverity>,
    pub limit: Option<i64>,
}
