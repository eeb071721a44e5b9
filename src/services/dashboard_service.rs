use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    round_cents, ActionItem, BusinessProfile, DashboardOverview, DashboardStats, DataMaturity,
    DoctorInputs, FinancialDoctorReport, GoalHistoryEntry, ProfitMetrics, UpcomingAppointment,
    AT_RISK_DAYS,
};
use crate::services::aios_service::AiosService;
use crate::services::business_service::BusinessService;
use crate::services::financial_doctor;
use crate::utils::dates::{local_date, local_to_utc, month_start, shift_month};
use crate::utils::formatters::month_name_pt;

const UPCOMING_LIMIT: i64 = 5;
const GOAL_HISTORY_MONTHS: u32 = 6;
const UNKNOWN_CLIENT: &str = "Cliente Desconhecido";

/// Revenue and profit of a window, net of commissions and expenses.
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
struct Totals {
    revenue: f64,
    commissions: f64,
    expenses: f64,
}

impl Totals {
    fn profit(&self) -> f64 {
        round_cents(self.revenue - self.commissions - self.expenses)
    }
}

/// Goal achievement of a past month.
pub fn goal_entry(month: u32, year: i32, goal: f64, achieved: f64) -> GoalHistoryEntry {
    let percentage = if goal > 0.0 {
        (achieved / goal * 100.0).round() as i64
    } else {
        0
    };
    let name = month_name_pt(month);
    let mut chars = name.chars();
    let month = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default();

    GoalHistoryEntry {
        month,
        year,
        goal,
        achieved: round_cents(achieved),
        percentage,
        success: percentage >= 100,
    }
}

#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    business: BusinessService,
    aios: AiosService,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self {
            business: BusinessService::new(db.clone()),
            aios: AiosService::new(db.clone()),
            db,
        }
    }

    async fn totals(&self, business_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Totals, AppError> {
        let totals = sqlx::query_as::<_, Totals>(
            "SELECT
                COALESCE(SUM(revenue) FILTER (WHERE record_type = 'revenue'), 0)::float8 AS revenue,
                COALESCE(SUM(commission_value) FILTER (WHERE record_type = 'revenue'), 0)::float8 AS commissions,
                COALESCE(SUM(expense) FILTER (WHERE record_type = 'expense'), 0)::float8 AS expenses
             FROM finance_records
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(business_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;
        Ok(totals)
    }

    /// UTC start of the current business-local month.
    fn month_bounds(profile: &BusinessProfile, now: DateTime<Utc>) -> DateTime<Utc> {
        let offset = profile.region().offset();
        local_to_utc(month_start(local_date(now, offset)), NaiveTime::MIN, offset)
    }

    async fn weekly_growth(&self, business_id: Uuid, now: DateTime<Utc>) -> Result<i64, AppError> {
        let week_ago = now - Duration::days(7);
        let current = self.totals(business_id, week_ago, now).await?;
        let previous = self.totals(business_id, week_ago - Duration::days(7), week_ago).await?;
        Ok(financial_doctor::weekly_growth(current.revenue, previous.revenue))
    }

    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, business_id: Uuid) -> Result<DashboardStats, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        self.stats_for(&profile, Utc::now()).await
    }

    async fn stats_for(&self, profile: &BusinessProfile, now: DateTime<Utc>) -> Result<DashboardStats, AppError> {
        let month = self.totals(profile.id, Self::month_bounds(profile, now), now).await?;
        Ok(DashboardStats {
            total_profit: month.profit(),
            current_month_revenue: round_cents(month.revenue),
            weekly_growth: self.weekly_growth(profile.id, now).await?,
            monthly_goal: profile.monthly_goal,
        })
    }

    /// Next confirmed appointments from now on.
    pub async fn upcoming(&self, business_id: Uuid) -> Result<Vec<UpcomingAppointment>, AppError> {
        let upcoming = sqlx::query_as::<_, UpcomingAppointment>(
            "SELECT a.id, COALESCE(c.name, $3) AS client_name, a.service, a.appointment_time, a.status, a.price
             FROM appointments a
             LEFT JOIN clients c ON c.id = a.client_id
             WHERE a.user_id = $1 AND a.deleted_at IS NULL
               AND a.status = 'Confirmed' AND a.appointment_time >= NOW()
             ORDER BY a.appointment_time ASC
             LIMIT $2",
        )
        .bind(business_id)
        .bind(UPCOMING_LIMIT)
        .bind(UNKNOWN_CLIENT)
        .fetch_all(&self.db)
        .await?;
        Ok(upcoming)
    }

    pub async fn update_goal(&self, business_id: Uuid, monthly_goal: f64) -> Result<f64, AppError> {
        self.business.update_goal(business_id, monthly_goal).await
    }

    /// The last six closed months, oldest first, each against the current goal.
    pub async fn goal_history(&self, business_id: Uuid) -> Result<Vec<GoalHistoryEntry>, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let offset = profile.region().offset();
        let today = local_date(Utc::now(), offset);

        let mut history = Vec::with_capacity(GOAL_HISTORY_MONTHS as usize);
        for months_back in (1..=GOAL_HISTORY_MONTHS).rev() {
            let first = shift_month(today, months_back);
            let next = shift_month(today, months_back - 1);
            let totals = self
                .totals(
                    business_id,
                    local_to_utc(first, NaiveTime::MIN, offset),
                    local_to_utc(next, NaiveTime::MIN, offset),
                )
                .await?;
            history.push(goal_entry(first.month(), first.year(), profile.monthly_goal, totals.revenue));
        }
        Ok(history)
    }

    pub async fn maturity(&self, business_id: Uuid) -> Result<DataMaturity, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        self.maturity_for(&profile, Utc::now()).await
    }

    async fn maturity_for(&self, profile: &BusinessProfile, now: DateTime<Utc>) -> Result<DataMaturity, AppError> {
        let (appointments_total, completed_this_month): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'Completed' AND appointment_time >= $2)
             FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(profile.id)
        .bind(Self::month_bounds(profile, now))
        .fetch_one(&self.db)
        .await?;

        let has_public_bookings: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM public_bookings WHERE business_id = $1)")
                .bind(profile.id)
                .fetch_one(&self.db)
                .await?;

        let account_days_old = (now - profile.created_at).num_days().max(0);

        Ok(financial_doctor::data_maturity(
            appointments_total,
            account_days_old,
            has_public_bookings,
            completed_this_month,
        ))
    }

    pub async fn overview(&self, business_id: Uuid) -> Result<DashboardOverview, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let now = Utc::now();
        Ok(DashboardOverview {
            stats: self.stats_for(&profile, now).await?,
            upcoming: self.upcoming(business_id).await?,
            maturity: self.maturity_for(&profile, now).await?,
            business_slug: profile.business_slug,
        })
    }

    /// What the platform brought in this month.
    #[tracing::instrument(skip(self))]
    pub async fn profit_metrics(&self, business_id: Uuid) -> Result<ProfitMetrics, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let now = Utc::now();
        let month_start = Self::month_bounds(&profile, now);
        let month = self.totals(business_id, month_start, now).await?;

        let (recovered_revenue, campaigns_sent): (f64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(recovered_revenue), 0)::float8, COUNT(*)
             FROM aios_campaigns
             WHERE user_id = $1 AND sent_at >= $2",
        )
        .bind(business_id)
        .bind(month_start)
        .fetch_one(&self.db)
        .await?;

        let (avoided_no_shows, filled_slots): (f64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(price) FILTER (WHERE reminder_sent_at IS NOT NULL), 0)::float8,
                COUNT(*) FILTER (WHERE source = 'public_booking')
             FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL
               AND status = 'Completed' AND appointment_time >= $2",
        )
        .bind(business_id)
        .bind(month_start)
        .fetch_one(&self.db)
        .await?;

        Ok(ProfitMetrics {
            total_profit: month.profit(),
            recovered_revenue: round_cents(recovered_revenue),
            avoided_no_shows: round_cents(avoided_no_shows),
            filled_slots,
            weekly_growth: self.weekly_growth(business_id, now).await?,
            campaigns_sent,
        })
    }

    async fn doctor_inputs(&self, profile: &BusinessProfile, now: DateTime<Utc>) -> Result<DoctorInputs, AppError> {
        let business_id = profile.id;
        let month_start = Self::month_bounds(profile, now);
        let stats = self.stats_for(profile, now).await?;
        let maturity = self.maturity_for(profile, now).await?;

        let (returning, visited, churn_risk_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*) FILTER (WHERE total_visits >= 2),
                COUNT(*) FILTER (WHERE total_visits >= 1),
                COUNT(*) FILTER (WHERE total_visits >= 2 AND last_visit < NOW() - make_interval(days => $2))
             FROM clients
             WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(business_id)
        .bind(AT_RISK_DAYS as i32)
        .fetch_one(&self.db)
        .await?;

        let avg_ticket: f64 = sqlx::query_scalar(
            "SELECT COALESCE(AVG(price), 0)::float8 FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL
               AND status = 'Completed' AND appointment_time >= $2",
        )
        .bind(business_id)
        .bind(month_start)
        .fetch_one(&self.db)
        .await?;

        let top_service: Option<String> = sqlx::query_scalar(
            "SELECT service FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL
               AND status = 'Completed' AND appointment_time >= $2
             GROUP BY service
             ORDER BY COUNT(*) DESC, service ASC
             LIMIT 1",
        )
        .bind(business_id)
        .bind(month_start)
        .fetch_optional(&self.db)
        .await?;

        let campaigns_sent: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM aios_campaigns WHERE user_id = $1")
            .bind(business_id)
            .fetch_one(&self.db)
            .await?;

        let repeat_client_rate = if visited > 0 {
            (returning as f64 / visited as f64 * 100.0).round() as i64
        } else {
            0
        };

        Ok(DoctorInputs {
            weekly_growth: stats.weekly_growth,
            churn_risk_count,
            repeat_client_rate,
            avg_ticket,
            top_service,
            completed_this_month: maturity.completed_this_month,
            current_month_revenue: stats.current_month_revenue,
            monthly_goal: stats.monthly_goal,
            campaigns_sent,
            maturity_score: maturity.score,
            appointments_total: maturity.appointments_total,
            account_days_old: maturity.account_days_old,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn financial_doctor(&self, business_id: Uuid) -> Result<FinancialDoctorReport, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let inputs = self.doctor_inputs(&profile, Utc::now()).await?;
        Ok(financial_doctor::report(&inputs, profile.region()))
    }

    /// Concrete next steps: clients to win back, light days, an upsell.
    pub async fn action_items(&self, business_id: Uuid) -> Result<Vec<ActionItem>, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let now = Utc::now();
        let inputs = self.doctor_inputs(&profile, now).await?;
        let at_risk = self.aios.at_risk_clients(business_id).await?;
        let gaps = self.aios.gaps(&profile, now).await?;

        Ok(financial_doctor::action_items(
            &at_risk,
            &gaps,
            inputs.top_service.as_deref(),
            inputs.avg_ticket,
            profile.region(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn goal_entry_rounds_and_capitalizes() {
        let entry = goal_entry(3, 2024, 10_000.0, 10_049.999);
        assert_eq!(entry.month, "Março");
        assert_eq!(entry.percentage, 100);
        assert!(entry.success);
        assert_eq!(entry.achieved, 10_050.0);

        let short = goal_entry(11, 2023, 8_000.0, 2_000.0);
        assert_eq!(short.month, "Novembro");
        assert_eq!(short.percentage, 25);
        assert!(!short.success);
    }

    #[test]
    fn goal_entry_without_goal() {
        let entry = goal_entry(1, 2024, 0.0, 500.0);
        assert_eq!(entry.percentage, 0);
        assert!(!entry.success);
    }

    #[test]
    fn profit_is_net_of_commissions_and_expenses() {
        let totals = Totals {
            revenue: 1_000.0,
            commissions: 250.5,
            expenses: 100.25,
        };
        assert_eq!(totals.profit(), 649.25);
    }
}
