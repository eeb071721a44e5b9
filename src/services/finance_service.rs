use chrono::{DateTime, Duration, FixedOffset, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    commission_for, AuditAction, AuditContext, CommissionDue, CommissionsPaid,
    CreateExpenseRequest, FinanceRecord, FinanceStats, MarkCommissionsPaidRequest,
    NewRevenueRecord, PeriodQuery, Region, UpdateExpenseRequest,
};
use crate::services::audit_service::AuditService;
use crate::utils::dates::day_bounds;

pub(crate) const FINANCE_COLUMNS: &str = "id, user_id, appointment_id, professional_id, barber_name, \
     client_name, service_name, record_type, description, revenue, expense, commission_rate, \
     commission_value, commission_paid, commission_paid_at, created_at";

const DEFAULT_PERIOD_DAYS: i64 = 30;
const MAX_RECORDS: i64 = 500;

#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
    audit: AuditService,
}

/// Resolves an optional date range to UTC bounds; the default is the last 30 days.
pub fn resolve_period(
    query: &PeriodQuery,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    if let (Some(first), Some(last)) = (query.start, query.end) {
        if last < first {
            return Err(AppError::validation("end must not be before start"));
        }
    }
    let start = match query.start {
        Some(date) => day_bounds(date, offset).0,
        None => now - Duration::days(DEFAULT_PERIOD_DAYS),
    };
    let end = match query.end {
        Some(date) => day_bounds(date, offset).1,
        None => now,
    };
    if end < start {
        return Err(AppError::validation("end must not be before start"));
    }
    Ok((start, end))
}

impl FinanceService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    async fn business_offset(&self, business_id: Uuid) -> Result<FixedOffset, AppError> {
        let region: Option<String> = sqlx::query_scalar("SELECT region FROM profiles WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.db)
            .await?;
        region
            .map(|r| Region::from_str(&r).offset())
            .ok_or_else(|| AppError::not_found("Business"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, business_id: Uuid, query: &PeriodQuery) -> Result<FinanceStats, AppError> {
        let offset = self.business_offset(business_id).await?;
        let (start, end) = resolve_period(query, offset, Utc::now())?;

        let (revenue, expenses, commissions, count): (f64, f64, f64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(revenue) FILTER (WHERE record_type = 'revenue'), 0),
                COALESCE(SUM(expense) FILTER (WHERE record_type = 'expense'), 0),
                COALESCE(SUM(commission_value) FILTER (WHERE record_type = 'revenue'), 0),
                COUNT(*) FILTER (WHERE record_type = 'revenue')
             FROM finance_records
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(business_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(FinanceStats::compute(start, end, revenue, expenses, commissions, count))
    }

    pub async fn list_records(&self, business_id: Uuid, query: &PeriodQuery) -> Result<Vec<FinanceRecord>, AppError> {
        let offset = self.business_offset(business_id).await?;
        let (start, end) = resolve_period(query, offset, Utc::now())?;

        let records = sqlx::query_as::<_, FinanceRecord>(&format!(
            "SELECT {FINANCE_COLUMNS} FROM finance_records
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
             ORDER BY created_at DESC
             LIMIT {MAX_RECORDS}"
        ))
        .bind(business_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    pub async fn create_expense(
        &self,
        business_id: Uuid,
        request: CreateExpenseRequest,
        ctx: &AuditContext,
    ) -> Result<FinanceRecord, AppError> {
        let created_at = match request.date {
            Some(date) => day_bounds(date, self.business_offset(business_id).await?).0,
            None => Utc::now(),
        };

        let record = sqlx::query_as::<_, FinanceRecord>(&format!(
            "INSERT INTO finance_records (id, user_id, record_type, description, expense, created_at)
             VALUES ($1, $2, 'expense', $3, $4, $5)
             RETURNING {FINANCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.description.trim())
        .bind(request.amount)
        .bind(created_at)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "financial_records")
                    .resource(record.id)
                    .values(None, serde_json::to_value(&record).ok()),
            )
            .await;

        Ok(record)
    }

    pub async fn update_expense(
        &self,
        business_id: Uuid,
        record_id: Uuid,
        request: UpdateExpenseRequest,
        ctx: &AuditContext,
    ) -> Result<FinanceRecord, AppError> {
        let before = self.get_expense(business_id, record_id).await?;
        let created_at = match request.date {
            Some(date) => Some(day_bounds(date, self.business_offset(business_id).await?).0),
            None => None,
        };

        let record = sqlx::query_as::<_, FinanceRecord>(&format!(
            "UPDATE finance_records SET
                description = COALESCE($3, description),
                expense = COALESCE($4, expense),
                created_at = COALESCE($5, created_at)
             WHERE id = $1 AND user_id = $2 AND record_type = 'expense'
             RETURNING {FINANCE_COLUMNS}"
        ))
        .bind(record_id)
        .bind(business_id)
        .bind(request.description.as_deref().map(str::trim))
        .bind(request.amount)
        .bind(created_at)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Expense"))?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "financial_records")
                    .resource(record.id)
                    .values(serde_json::to_value(&before).ok(), serde_json::to_value(&record).ok()),
            )
            .await;

        Ok(record)
    }

    pub async fn delete_expense(&self, business_id: Uuid, record_id: Uuid, ctx: &AuditContext) -> Result<(), AppError> {
        let before = self.get_expense(business_id, record_id).await?;

        sqlx::query("DELETE FROM finance_records WHERE id = $1 AND user_id = $2 AND record_type = 'expense'")
            .bind(record_id)
            .bind(business_id)
            .execute(&self.db)
            .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Delete, "financial_records")
                    .resource(record_id)
                    .values(serde_json::to_value(&before).ok(), None),
            )
            .await;
        Ok(())
    }

    async fn get_expense(&self, business_id: Uuid, record_id: Uuid) -> Result<FinanceRecord, AppError> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "SELECT {FINANCE_COLUMNS} FROM finance_records
             WHERE id = $1 AND user_id = $2 AND record_type = 'expense'"
        ))
        .bind(record_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Expense"))
    }

    /// Unpaid commission per professional.
    pub async fn commissions_due(&self, business_id: Uuid) -> Result<Vec<CommissionDue>, AppError> {
        let due = sqlx::query_as::<_, CommissionDue>(
            "SELECT f.professional_id AS professional_id,
                    t.name AS professional_name,
                    SUM(f.commission_value) AS total_due,
                    COUNT(*) AS record_count
             FROM finance_records f
             JOIN team_members t ON t.id = f.professional_id
             WHERE f.user_id = $1
               AND f.record_type = 'revenue'
               AND f.commission_paid = FALSE
               AND f.commission_value > 0
             GROUP BY f.professional_id, t.name
             ORDER BY t.name",
        )
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;

        Ok(due)
    }

    pub async fn commission_details(
        &self,
        business_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Vec<FinanceRecord>, AppError> {
        let records = sqlx::query_as::<_, FinanceRecord>(&format!(
            "SELECT {FINANCE_COLUMNS} FROM finance_records
             WHERE user_id = $1 AND professional_id = $2
               AND record_type = 'revenue' AND commission_value > 0
             ORDER BY commission_paid ASC, created_at DESC
             LIMIT {MAX_RECORDS}"
        ))
        .bind(business_id)
        .bind(professional_id)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    pub async fn mark_commissions_paid(
        &self,
        business_id: Uuid,
        request: MarkCommissionsPaidRequest,
        ctx: &AuditContext,
    ) -> Result<CommissionsPaid, AppError> {
        let paid: Vec<f64> = sqlx::query_scalar(
            "UPDATE finance_records SET commission_paid = TRUE, commission_paid_at = NOW()
             WHERE user_id = $1
               AND professional_id = $2
               AND record_type = 'revenue'
               AND commission_paid = FALSE
               AND ($3::uuid[] IS NULL OR id = ANY($3))
             RETURNING commission_value",
        )
        .bind(business_id)
        .bind(request.professional_id)
        .bind(request.record_ids.as_deref())
        .fetch_all(&self.db)
        .await?;

        let result = CommissionsPaid {
            records_updated: paid.len() as u64,
            total_paid: crate::models::round_cents(paid.iter().sum()),
        };

        if result.records_updated > 0 {
            self.audit
                .record_quietly(
                    ctx.entry(AuditAction::Update, "financial_records")
                        .resource(request.professional_id)
                        .metadata(serde_json::json!({
                            "commissions_paid": result.records_updated,
                            "total_paid": result.total_paid,
                        })),
                )
                .await;
        }

        Ok(result)
    }
}

/// Writes the revenue entry of a delivered service inside an open transaction.
pub(crate) async fn insert_revenue(
    conn: &mut PgConnection,
    record: NewRevenueRecord,
) -> Result<FinanceRecord, AppError> {
    let commission = commission_for(record.revenue, record.commission_rate);

    let inserted = sqlx::query_as::<_, FinanceRecord>(&format!(
        "INSERT INTO finance_records (
            id, user_id, appointment_id, professional_id, barber_name, client_name,
            service_name, record_type, revenue, commission_rate, commission_value
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'revenue', $8, $9, $10)
         RETURNING {FINANCE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(record.business_id)
    .bind(record.appointment_id)
    .bind(record.professional_id)
    .bind(&record.professional_name)
    .bind(&record.client_name)
    .bind(&record.service_name)
    .bind(record.revenue)
    .bind(record.commission_rate)
    .bind(commission)
    .fetch_one(&mut *conn)
    .await?;

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn default_period_is_last_thirty_days() {
        let now = Utc.with_ymd_and_hms(2024, 7, 31, 15, 0, 0).unwrap();
        let (start, end) = resolve_period(&PeriodQuery::default(), Region::Br.offset(), now).unwrap();
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn explicit_period_covers_whole_local_days() {
        let query = PeriodQuery {
            start: NaiveDate::from_ymd_opt(2024, 7, 1),
            end: NaiveDate::from_ymd_opt(2024, 7, 1),
        };
        let (start, end) = resolve_period(&query, Region::Br.offset(), Utc::now()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 7, 2, 3, 0, 0).unwrap());

        let inverted = PeriodQuery {
            start: NaiveDate::from_ymd_opt(2024, 7, 2),
            end: NaiveDate::from_ymd_opt(2024, 7, 1),
        };
        assert!(resolve_period(&inverted, Region::Br.offset(), Utc::now()).is_err());
    }

    #[test]
    fn start_in_the_future_without_end_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 7, 31, 15, 0, 0).unwrap();
        let query = PeriodQuery {
            start: NaiveDate::from_ymd_opt(2024, 8, 5),
            end: None,
        };
        assert!(resolve_period(&query, Region::Br.offset(), now).is_err());
    }
}
