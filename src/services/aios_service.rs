use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    round_cents, AgendaGap, AiosCampaign, AiosDiagnostic, AtRiskClient, BusinessHours,
    BusinessProfile, CampaignStats, GapKind, LogCampaignRequest, ReactivationMessage,
    ReactivationQuery, AT_RISK_DAYS, GAP_THRESHOLD,
};
use crate::services::business_service::BusinessService;
use crate::utils::dates::{day_bounds, local_date};
use crate::utils::whatsapp::{reactivation_message, whatsapp_url};

const GAP_HORIZON_DAYS: usize = 7;
const MAX_AT_RISK: i64 = 50;

const CAMPAIGN_COLUMNS: &str =
    "id, user_id, client_id, agent_name, campaign_type, sent_at, converted_appointment_id, recovered_revenue";

/// Light days among the next open days starting at `from`.
///
/// Closed days are skipped and do not count towards the horizon.
pub fn find_gaps(from: NaiveDate, hours: &BusinessHours, counts: &HashMap<NaiveDate, i64>) -> Vec<AgendaGap> {
    from.iter_days()
        .take(7 * GAP_HORIZON_DAYS)
        .filter(|day| hours.is_open_on(day.weekday()))
        .take(GAP_HORIZON_DAYS)
        .filter_map(|date| {
            let appointments = counts.get(&date).copied().unwrap_or(0);
            (appointments < GAP_THRESHOLD).then(|| AgendaGap {
                date,
                appointments,
                kind: if appointments == 0 { GapKind::Empty } else { GapKind::Light },
            })
        })
        .collect()
}

/// Revenue recovery: returning clients who went quiet and light days ahead.
#[derive(Clone)]
pub struct AiosService {
    db: PgPool,
    business: BusinessService,
}

impl AiosService {
    pub fn new(db: PgPool) -> Self {
        Self {
            business: BusinessService::new(db.clone()),
            db,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn diagnostic(&self, business_id: Uuid) -> Result<AiosDiagnostic, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        if !profile.aios_enabled {
            return Err(AppError::Forbidden("AIOS is disabled for this business".to_string()));
        }

        let at_risk_clients = self.at_risk_clients(business_id).await?;
        let recoverable_revenue = round_cents(at_risk_clients.iter().map(|c| c.avg_ticket).sum());
        let gaps = self.gaps(&profile, Utc::now()).await?;

        tracing::debug!(
            %business_id,
            at_risk = at_risk_clients.len(),
            gaps = gaps.len(),
            "aios diagnostic"
        );

        Ok(AiosDiagnostic {
            at_risk_clients,
            recoverable_revenue,
            gaps,
        })
    }

    /// Clients with at least two visits whose last visit is older than the
    /// risk window, highest ticket first.
    pub async fn at_risk_clients(&self, business_id: Uuid) -> Result<Vec<AtRiskClient>, AppError> {
        let clients = sqlx::query_as::<_, AtRiskClient>(
            "SELECT c.id AS client_id, c.name, c.phone, c.total_visits, c.last_visit,
                    COALESCE((
                        SELECT AVG(a.price) FROM appointments a
                        WHERE a.client_id = c.id AND a.status = 'Completed' AND a.deleted_at IS NULL
                    ), 0)::float8 AS avg_ticket,
                    EXTRACT(DAY FROM NOW() - c.last_visit)::bigint AS days_away
             FROM clients c
             WHERE c.user_id = $1
               AND c.deleted_at IS NULL
               AND c.total_visits >= 2
               AND c.last_visit < NOW() - make_interval(days => $2)
             ORDER BY avg_ticket DESC, c.last_visit ASC
             LIMIT $3",
        )
        .bind(business_id)
        .bind(AT_RISK_DAYS as i32)
        .bind(MAX_AT_RISK)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    /// Open days in the coming week with fewer than the gap threshold of
    /// appointments.
    pub async fn gaps(&self, profile: &BusinessProfile, now: DateTime<Utc>) -> Result<Vec<AgendaGap>, AppError> {
        let offset = profile.region().offset();
        let today = local_date(now, offset);
        let (start, _) = day_bounds(today, offset);
        let end = start + Duration::days(7 * GAP_HORIZON_DAYS as i64);

        let times: Vec<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT appointment_time FROM appointments
             WHERE user_id = $1 AND deleted_at IS NULL
               AND status NOT IN ('Cancelled', 'NoShow')
               AND appointment_time >= $2 AND appointment_time < $3",
        )
        .bind(profile.id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        let mut counts: HashMap<NaiveDate, i64> = HashMap::new();
        for time in times {
            *counts.entry(local_date(time, offset)).or_default() += 1;
        }

        Ok(find_gaps(today, profile.hours(), &counts))
    }

    #[tracing::instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn log_campaign(&self, business_id: Uuid, request: LogCampaignRequest) -> Result<AiosCampaign, AppError> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL)",
        )
        .bind(request.client_id)
        .bind(business_id)
        .fetch_one(&self.db)
        .await?;
        if !owned {
            return Err(AppError::not_found("Client"));
        }

        let campaign = sqlx::query_as::<_, AiosCampaign>(&format!(
            "INSERT INTO aios_campaigns (id, user_id, client_id, agent_name, campaign_type)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.client_id)
        .bind(request.agent_name.trim())
        .bind(request.campaign_type.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(campaign_id = %campaign.id, "campaign logged");
        Ok(campaign)
    }

    pub async fn campaign_stats(&self, business_id: Uuid) -> Result<CampaignStats, AppError> {
        let stats = sqlx::query_as::<_, CampaignStats>(
            "SELECT COUNT(*) AS campaigns_sent,
                    COUNT(converted_appointment_id) AS conversions,
                    COALESCE(SUM(recovered_revenue), 0)::float8 AS recovered_revenue
             FROM aios_campaigns
             WHERE user_id = $1",
        )
        .bind(business_id)
        .fetch_one(&self.db)
        .await?;
        Ok(stats)
    }

    pub async fn campaigns(&self, business_id: Uuid) -> Result<Vec<AiosCampaign>, AppError> {
        let campaigns = sqlx::query_as::<_, AiosCampaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM aios_campaigns
             WHERE user_id = $1
             ORDER BY sent_at DESC
             LIMIT 100"
        ))
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;
        Ok(campaigns)
    }

    /// WhatsApp reactivation copy for one client, with a ready link when the
    /// client has a phone.
    pub async fn reactivation(
        &self,
        business_id: Uuid,
        query: &ReactivationQuery,
    ) -> Result<ReactivationMessage, AppError> {
        let profile = self.business.get_profile(business_id).await?;
        let (name, phone): (String, Option<String>) = sqlx::query_as(
            "SELECT name, phone FROM clients WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(query.client_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Client"))?;

        let message = reactivation_message(
            query.client_id,
            &name,
            &profile.business_name,
            profile.kind(),
            query.days_missing,
        );
        let encoded_message = urlencoding::encode(&message).into_owned();
        let whatsapp_url = phone
            .filter(|p| !p.trim().is_empty())
            .map(|p| whatsapp_url(&p, &encoded_message));

        Ok(ReactivationMessage {
            message,
            encoded_message,
            whatsapp_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaySchedule, TimeBlock};
    use chrono::NaiveTime;
    use pretty_assertions::assert_eq;

    fn date(d: u32) -> NaiveDate {
        // 2024-07-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn weekdays_only() -> BusinessHours {
        let mut hours = BusinessHours::default_week();
        for key in ["sat", "sun"] {
            hours.0.insert(
                key.to_string(),
                DaySchedule {
                    is_open: false,
                    blocks: vec![TimeBlock {
                        start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                        end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                    }],
                },
            );
        }
        hours
    }

    #[test]
    fn gaps_skip_closed_days_and_busy_days() {
        let hours = weekdays_only();
        let mut counts = HashMap::new();
        counts.insert(date(1), 5);
        counts.insert(date(2), 2);
        counts.insert(date(3), 3);

        let gaps = find_gaps(date(1), &hours, &counts);
        let days: Vec<NaiveDate> = gaps.iter().map(|g| g.date).collect();
        // seven open days: Jul 1-5 and Jul 8-9
        assert_eq!(days, vec![date(2), date(4), date(5), date(8), date(9)]);
        assert_eq!(gaps[0].kind, GapKind::Light);
        assert_eq!(gaps[0].appointments, 2);
        assert_eq!(gaps[1].kind, GapKind::Empty);
    }

    #[test]
    fn no_gaps_when_never_open() {
        let mut hours = weekdays_only();
        for schedule in hours.0.values_mut() {
            schedule.is_open = false;
        }
        assert!(find_gaps(date(1), &hours, &HashMap::new()).is_empty());
    }
}
