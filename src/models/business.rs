use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    #[default]
    Barber,
    Beauty,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::Barber => "barber",
            BusinessType::Beauty => "beauty",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "beauty" => BusinessType::Beauty,
            _ => BusinessType::Barber,
        }
    }

    /// Portuguese noun used in copy and prompts.
    pub fn label_pt(&self) -> &'static str {
        match self {
            BusinessType::Barber => "barbearia",
            BusinessType::Beauty => "salão de beleza",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    #[serde(rename = "BR")]
    Br,
    #[serde(rename = "PT")]
    Pt,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Br => "BR",
            Region::Pt => "PT",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PT" => Region::Pt,
            _ => Region::Br,
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Region::Br => "BRL",
            Region::Pt => "EUR",
        }
    }

    /// Wall-clock offset used to interpret times entered for the business.
    pub fn offset(&self) -> FixedOffset {
        match self {
            Region::Br => FixedOffset::west_opt(3 * 3600).unwrap_or(Utc.fix()),
            Region::Pt => Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBlock {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DaySchedule {
    pub is_open: bool,
    #[serde(default)]
    pub blocks: Vec<TimeBlock>,
}

/// Weekly opening hours keyed by `mon`..`sun`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct BusinessHours(pub BTreeMap<String, DaySchedule>);

pub const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

pub fn weekday_key(day: Weekday) -> &'static str {
    WEEKDAY_KEYS[day.num_days_from_monday() as usize]
}

impl BusinessHours {
    pub fn default_block() -> TimeBlock {
        TimeBlock {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }

    /// Monday to Saturday 09:00-18:00, Sunday closed.
    pub fn default_week() -> Self {
        let mut days = BTreeMap::new();
        for key in WEEKDAY_KEYS {
            let open = key != "sun";
            days.insert(
                key.to_string(),
                DaySchedule {
                    is_open: open,
                    blocks: if open { vec![Self::default_block()] } else { vec![] },
                },
            );
        }
        BusinessHours(days)
    }

    /// Open blocks for a weekday; empty when closed or unset.
    pub fn blocks_for(&self, day: Weekday) -> &[TimeBlock] {
        match self.0.get(weekday_key(day)) {
            Some(schedule) if schedule.is_open => &schedule.blocks,
            _ => &[],
        }
    }

    pub fn is_open_on(&self, day: Weekday) -> bool {
        !self.blocks_for(day).is_empty()
    }

    /// Fills opened days that have no blocks with the default block and
    /// validates every day. Returns the first problem found.
    pub fn normalize(mut self) -> Result<Self, String> {
        for (key, schedule) in self.0.iter_mut() {
            if !WEEKDAY_KEYS.contains(&key.as_str()) {
                return Err(format!("unknown weekday '{key}'"));
            }
            if schedule.is_open && schedule.blocks.is_empty() {
                schedule.blocks.push(Self::default_block());
            }
            schedule.blocks.sort_by_key(|b| b.start);
            for block in &schedule.blocks {
                if block.start >= block.end {
                    return Err(format!("{key}: start must be before end"));
                }
            }
            for pair in schedule.blocks.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(format!("{key}: time blocks overlap"));
                }
            }
        }
        Ok(self)
    }
}

/// Onboarding steps, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    BusinessInfo,
    BusinessHours,
    Services,
    Team,
    Success,
}

impl OnboardingStep {
    pub fn index(&self) -> i32 {
        *self as i32 + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessProfile {
    pub id: Uuid,
    pub business_name: String,
    pub business_type: String,
    pub region: String,
    pub business_slug: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub instagram: Option<String>,
    pub cancellation_policy: Option<String>,
    pub business_hours: sqlx::types::Json<BusinessHours>,
    pub monthly_goal: f64,
    pub public_booking_enabled: bool,
    pub email_reminders_enabled: bool,
    pub aios_enabled: bool,
    pub onboarding_step: i32,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessProfile {
    pub fn kind(&self) -> BusinessType {
        BusinessType::from_str(&self.business_type)
    }

    pub fn region(&self) -> Region {
        Region::from_str(&self.region)
    }

    pub fn hours(&self) -> &BusinessHours {
        &self.business_hours.0
    }
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 2, max = 120, message = "business name must have 2 to 120 characters"))]
    pub business_name: Option<String>,
    pub business_type: Option<BusinessType>,
    pub region: Option<Region>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub instagram: Option<String>,
    pub cancellation_policy: Option<String>,
    #[validate(range(min = 0.0, message = "monthly goal cannot be negative"))]
    pub monthly_goal: Option<f64>,
    pub public_booking_enabled: Option<bool>,
    pub email_reminders_enabled: Option<bool>,
    pub aios_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingStepRequest {
    pub step: OnboardingStep,
}

#[derive(Debug, Serialize)]
pub struct OnboardingStatus {
    pub step: i32,
    pub completed: bool,
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|_| serde::de::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn hours_round_trip_as_hhmm() {
        let hours: BusinessHours = serde_json::from_value(json!({
            "mon": {"is_open": true, "blocks": [{"start": "09:00", "end": "12:00"}]},
            "sun": {"is_open": false}
        }))
        .unwrap();

        assert_eq!(hours.blocks_for(Weekday::Mon), &[TimeBlock { start: t(9, 0), end: t(12, 0) }]);
        assert!(!hours.is_open_on(Weekday::Sun));
        assert!(!hours.is_open_on(Weekday::Tue));

        let value = serde_json::to_value(&hours).unwrap();
        assert_eq!(value["mon"]["blocks"][0]["end"], "12:00");
    }

    #[test]
    fn opening_a_day_without_blocks_uses_default() {
        let mut days = BTreeMap::new();
        days.insert("tue".to_string(), DaySchedule { is_open: true, blocks: vec![] });
        let hours = BusinessHours(days).normalize().unwrap();
        assert_eq!(hours.blocks_for(Weekday::Tue), &[BusinessHours::default_block()]);
    }

    #[test]
    fn rejects_overlapping_or_inverted_blocks() {
        let mut days = BTreeMap::new();
        days.insert(
            "wed".to_string(),
            DaySchedule {
                is_open: true,
                blocks: vec![
                    TimeBlock { start: t(9, 0), end: t(13, 0) },
                    TimeBlock { start: t(12, 0), end: t(18, 0) },
                ],
            },
        );
        assert!(BusinessHours(days).normalize().unwrap_err().contains("overlap"));

        let mut days = BTreeMap::new();
        days.insert(
            "thu".to_string(),
            DaySchedule { is_open: true, blocks: vec![TimeBlock { start: t(18, 0), end: t(9, 0) }] },
        );
        assert!(BusinessHours(days).normalize().is_err());
    }

    #[test]
    fn region_offsets() {
        assert_eq!(Region::Br.offset().local_minus_utc(), -3 * 3600);
        assert_eq!(Region::Pt.offset().local_minus_utc(), 0);
        assert_eq!(Region::from_str("pt"), Region::Pt);
        assert_eq!(Region::from_str("xx"), Region::Br);
    }

    #[test]
    fn onboarding_steps_are_ordered() {
        assert!(OnboardingStep::BusinessInfo < OnboardingStep::Success);
        assert_eq!(OnboardingStep::BusinessInfo.index(), 1);
        assert_eq!(OnboardingStep::Success.index(), 5);
    }
}
