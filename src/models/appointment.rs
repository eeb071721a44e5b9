use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "NoShow",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(AppointmentStatus::Pending),
            "Confirmed" => Some(AppointmentStatus::Confirmed),
            "Completed" => Some(AppointmentStatus::Completed),
            "Cancelled" => Some(AppointmentStatus::Cancelled),
            "NoShow" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }

    /// Whether an appointment in this status occupies its time slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, AppointmentStatus::Confirmed | AppointmentStatus::Pending)
    }
}

/// Status values that never occupy a slot, for use in SQL filters.
pub const NON_BLOCKING_STATUSES: [&str; 2] = ["Cancelled", "NoShow"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentSource {
    Internal,
    PublicBooking,
    Queue,
}

impl AppointmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentSource::Internal => "internal",
            AppointmentSource::PublicBooking => "public_booking",
            AppointmentSource::Queue => "queue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub service: String,
    pub service_ids: Vec<Uuid>,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: f64,
    pub discount_percent: f64,
    pub status: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub custom_service_name: Option<String>,
    pub source: String,
    pub public_booking_id: Option<Uuid>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn status(&self) -> Option<AppointmentStatus> {
        AppointmentStatus::from_str(&self.status)
    }
}

/// Agenda row with the names the calendar needs.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgendaEntry {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub professional_id: Option<Uuid>,
    pub professional_name: Option<String>,
    pub service: String,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: f64,
    pub status: String,
    pub source: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CustomService {
    #[serde(default)]
    pub enabled: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub price: f64,
    pub duration_minutes: Option<i32>,
}

/// Submission of the multi-step appointment wizard.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub client_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
    #[serde(default)]
    pub custom_service: CustomService,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "optional_hhmm")]
    pub time: Option<NaiveTime>,
    /// Review-step price; defaults to the computed base price.
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub send_whatsapp: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    pub client_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    /// Switching to another service resets the price to that service's price.
    pub service_id: Option<Uuid>,
    pub appointment_time: Option<DateTime<Utc>>,
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub price: Option<f64>,
    #[validate(range(min = 1, message = "duration must be positive"))]
    pub duration_minutes: Option<i32>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgendaQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub professional_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentCreated {
    pub appointment: Appointment,
    pub whatsapp_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResult {
    pub appointment_id: Uuid,
    pub revenue: f64,
    pub commission: f64,
    pub recovered_campaign_id: Option<Uuid>,
}

pub(crate) mod optional_hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid time '{s}', expected HH:MM"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_statuses() {
        assert!(AppointmentStatus::Confirmed.blocks_slot());
        assert!(AppointmentStatus::Pending.blocks_slot());
        assert!(AppointmentStatus::Completed.blocks_slot());
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
        for s in NON_BLOCKING_STATUSES {
            assert!(!AppointmentStatus::from_str(s).unwrap().blocks_slot());
        }
    }

    #[test]
    fn wizard_request_parses_hhmm() {
        let req: CreateAppointmentRequest = serde_json::from_value(serde_json::json!({
            "date": "2024-07-01",
            "time": "14:30",
            "service_ids": []
        }))
        .unwrap();
        assert_eq!(req.time, NaiveTime::from_hms_opt(14, 30, 0));
        assert!(!req.custom_service.enabled);

        let bad = serde_json::from_value::<CreateAppointmentRequest>(serde_json::json!({"time": "2pm"}));
        assert!(bad.is_err());
    }
}
