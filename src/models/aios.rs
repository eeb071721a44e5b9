use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Days without a visit after which a returning client counts as at risk.
pub const AT_RISK_DAYS: i64 = 30;
/// Appointments below which an open day counts as a gap.
pub const GAP_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AtRiskClient {
    pub client_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub total_visits: i32,
    pub last_visit: DateTime<Utc>,
    pub avg_ticket: f64,
    pub days_away: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GapKind {
    Empty,
    Light,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgendaGap {
    pub date: NaiveDate,
    pub appointments: i64,
    pub kind: GapKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiosDiagnostic {
    pub at_risk_clients: Vec<AtRiskClient>,
    pub recoverable_revenue: f64,
    pub gaps: Vec<AgendaGap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiosCampaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub agent_name: String,
    pub campaign_type: String,
    pub sent_at: DateTime<Utc>,
    pub converted_appointment_id: Option<Uuid>,
    pub recovered_revenue: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogCampaignRequest {
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 60, message = "agent name is required"))]
    pub agent_name: String,
    #[validate(length(min = 1, max = 60, message = "campaign type is required"))]
    pub campaign_type: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, PartialEq)]
pub struct CampaignStats {
    pub campaigns_sent: i64,
    pub conversions: i64,
    pub recovered_revenue: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReactivationQuery {
    pub client_id: Uuid,
    pub days_missing: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReactivationMessage {
    pub message: String,
    pub encoded_message: String,
    pub whatsapp_url: Option<String>,
}
