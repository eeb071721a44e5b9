use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::appointment::Appointment;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub phone_digits: Option<String>,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub total_visits: i32,
    pub last_visit: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn from_visits(total_visits: i32) -> Self {
        match total_visits {
            i32::MIN..=5 => LoyaltyTier::Bronze,
            6..=15 => LoyaltyTier::Silver,
            16..=30 => LoyaltyTier::Gold,
            _ => LoyaltyTier::Platinum,
        }
    }

    /// Inclusive visit range of the tier; `None` upper bound means unbounded.
    pub fn visit_range(&self) -> (i32, Option<i32>) {
        match self {
            LoyaltyTier::Bronze => (0, Some(5)),
            LoyaltyTier::Silver => (6, Some(15)),
            LoyaltyTier::Gold => (16, Some(30)),
            LoyaltyTier::Platinum => (31, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NextVisitPrediction {
    InsufficientData,
    Overdue,
    Today,
    Tomorrow,
    InDays(i64),
    OnDate(NaiveDate),
}

impl NextVisitPrediction {
    /// Predicts the next visit from past visit times.
    ///
    /// Intervals are counted in whole days, averaged and rounded, then added
    /// to the most recent visit.
    pub fn from_history(visits: &[DateTime<Utc>], now: DateTime<Utc>) -> Self {
        if visits.len() < 2 {
            return NextVisitPrediction::InsufficientData;
        }

        let mut sorted = visits.to_vec();
        sorted.sort();

        let total_days: i64 = sorted
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .sum();
        let intervals = (sorted.len() - 1) as f64;
        let avg_days = (total_days as f64 / intervals).round() as i64;

        let last = sorted[sorted.len() - 1];
        let predicted = last + Duration::days(avg_days);
        let seconds_until = (predicted - now).num_seconds();
        let days_until = seconds_until.div_euclid(86_400);

        match days_until {
            d if d < 0 => NextVisitPrediction::Overdue,
            0 => NextVisitPrediction::Today,
            1 => NextVisitPrediction::Tomorrow,
            d if d <= 7 => NextVisitPrediction::InDays(d),
            _ => NextVisitPrediction::OnDate(predicted.date_naive()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            NextVisitPrediction::InsufficientData => "Dados insuficientes".to_string(),
            NextVisitPrediction::Overdue => "Atrasado".to_string(),
            NextVisitPrediction::Today => "Hoje".to_string(),
            NextVisitPrediction::Tomorrow => "Amanhã".to_string(),
            NextVisitPrediction::InDays(days) => format!("{days} dias"),
            NextVisitPrediction::OnDate(date) => date.format("%d/%m").to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub phone: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub tier: LoyaltyTier,
    pub next_visit: NextVisitPrediction,
    pub next_visit_label: String,
    pub history: Vec<Appointment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn tiers_by_visit_count() {
        assert_eq!(LoyaltyTier::from_visits(0), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_visits(5), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_visits(6), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_visits(15), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_visits(16), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_visits(30), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_visits(31), LoyaltyTier::Platinum);
        assert_eq!(LoyaltyTier::from_visits(-1), LoyaltyTier::Bronze);
    }

    #[test]
    fn prediction_needs_two_visits() {
        let now = at(2024, 6, 1);
        assert_eq!(
            NextVisitPrediction::from_history(&[], now),
            NextVisitPrediction::InsufficientData
        );
        assert_eq!(
            NextVisitPrediction::from_history(&[at(2024, 5, 1)], now).label(),
            "Dados insuficientes"
        );
    }

    #[test]
    fn prediction_classifies_distance() {
        // Visits every 14 days, last on May 20.
        let visits = [at(2024, 5, 6), at(2024, 5, 20), at(2024, 4, 22)];

        assert_eq!(
            NextVisitPrediction::from_history(&visits, at(2024, 6, 5)),
            NextVisitPrediction::Overdue
        );
        assert_eq!(
            NextVisitPrediction::from_history(&visits, at(2024, 6, 3)),
            NextVisitPrediction::Today
        );
        assert_eq!(
            NextVisitPrediction::from_history(&visits, at(2024, 6, 2)),
            NextVisitPrediction::Tomorrow
        );
        let in_five = NextVisitPrediction::from_history(&visits, at(2024, 5, 29));
        assert_eq!(in_five, NextVisitPrediction::InDays(5));
        assert_eq!(in_five.label(), "5 dias");

        let far = NextVisitPrediction::from_history(&visits, at(2024, 5, 21));
        assert_eq!(far, NextVisitPrediction::OnDate(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
        assert_eq!(far.label(), "03/06");
    }
}
