use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_profit: f64,
    pub current_month_revenue: f64,
    /// Last seven days against the seven before, as a whole percentage.
    pub weekly_growth: i64,
    pub monthly_goal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpcomingAppointment {
    pub id: Uuid,
    pub client_name: Option<String>,
    pub service: String,
    pub appointment_time: DateTime<Utc>,
    pub status: String,
    pub price: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[validate(range(min = 0.0, message = "monthly goal cannot be negative"))]
    pub monthly_goal: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GoalHistoryEntry {
    pub month: String,
    pub year: i32,
    pub goal: f64,
    pub achieved: f64,
    pub percentage: i64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataMaturity {
    pub appointments_total: i64,
    pub account_days_old: i64,
    pub has_public_bookings: bool,
    pub completed_this_month: i64,
    pub score: i64,
    pub label: String,
    pub show_badge: bool,
    pub hint: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfitMetrics {
    pub total_profit: f64,
    pub recovered_revenue: f64,
    pub avoided_no_shows: f64,
    pub filled_slots: i64,
    pub weekly_growth: i64,
    pub campaigns_sent: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Growth,
    Risk,
    Opportunity,
    Achievement,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialInsight {
    pub id: &'static str,
    pub category: InsightCategory,
    pub title: String,
    pub description: String,
    pub action: Option<String>,
    pub impact: Impact,
    pub value: Option<String>,
}

/// Inputs of the financial health evaluation.
#[derive(Debug, Clone, Default)]
pub struct DoctorInputs {
    pub weekly_growth: i64,
    pub churn_risk_count: i64,
    pub repeat_client_rate: i64,
    pub avg_ticket: f64,
    pub top_service: Option<String>,
    pub completed_this_month: i64,
    pub current_month_revenue: f64,
    pub monthly_goal: f64,
    pub campaigns_sent: i64,
    pub maturity_score: i64,
    pub appointments_total: i64,
    pub account_days_old: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialDoctorReport {
    pub health_score: i64,
    pub health_label: String,
    pub has_data: bool,
    pub repeat_client_rate: i64,
    pub churn_risk_count: i64,
    pub avg_ticket: f64,
    pub top_service: Option<String>,
    pub insights: Vec<FinancialInsight>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Recovery,
    Gap,
    Upsell,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionItem {
    pub kind: ActionKind,
    pub title: String,
    pub description: String,
    pub client_id: Option<Uuid>,
    pub date: Option<chrono::NaiveDate>,
    pub potential_revenue: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub upcoming: Vec<UpcomingAppointment>,
    pub maturity: DataMaturity,
    pub business_slug: String,
}
