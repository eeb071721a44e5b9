use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Revenue,
    Expense,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Revenue => "revenue",
            RecordType::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FinanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub barber_name: Option<String>,
    pub client_name: Option<String>,
    pub service_name: Option<String>,
    pub record_type: String,
    pub description: Option<String>,
    pub revenue: f64,
    pub expense: f64,
    pub commission_rate: f64,
    pub commission_value: f64,
    pub commission_paid: bool,
    pub commission_paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Revenue entry written when a service is delivered.
#[derive(Debug, Clone)]
pub struct NewRevenueRecord {
    pub business_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub professional_name: Option<String>,
    pub client_name: Option<String>,
    pub service_name: String,
    pub revenue: f64,
    pub commission_rate: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 200, message = "description is required"))]
    pub description: String,
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 200, message = "description is required"))]
    pub description: Option<String>,
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FinanceStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub revenue: f64,
    pub expenses: f64,
    pub commissions: f64,
    pub profit: f64,
    pub appointment_count: i64,
    pub average_ticket: f64,
}

impl FinanceStats {
    pub fn compute(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        revenue: f64,
        expenses: f64,
        commissions: f64,
        appointment_count: i64,
    ) -> Self {
        let average_ticket = if appointment_count > 0 {
            round_cents(revenue / appointment_count as f64)
        } else {
            0.0
        };
        Self {
            start,
            end,
            revenue: round_cents(revenue),
            expenses: round_cents(expenses),
            commissions: round_cents(commissions),
            profit: round_cents(revenue - commissions - expenses),
            appointment_count,
            average_ticket,
        }
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CommissionDue {
    pub professional_id: Uuid,
    pub professional_name: String,
    pub total_due: f64,
    pub record_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct MarkCommissionsPaidRequest {
    pub professional_id: Uuid,
    /// Restrict to these records; all unpaid records otherwise.
    pub record_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct CommissionsPaid {
    pub records_updated: u64,
    pub total_paid: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_subtracts_commissions_and_expenses() {
        let now = Utc::now();
        let stats = FinanceStats::compute(now, now, 1000.0, 200.0, 300.0, 8);
        assert_eq!(stats.profit, 500.0);
        assert_eq!(stats.average_ticket, 125.0);

        let empty = FinanceStats::compute(now, now, 0.0, 50.0, 0.0, 0);
        assert_eq!(empty.average_ticket, 0.0);
        assert_eq!(empty.profit, -50.0);
    }
}
