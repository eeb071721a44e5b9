use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::business::{BusinessHours, BusinessType, Region};
use super::catalog::{Service, ServiceCategory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublicBookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl PublicBookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicBookingStatus::Pending => "pending",
            PublicBookingStatus::Confirmed => "confirmed",
            PublicBookingStatus::Rejected => "rejected",
            PublicBookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicBooking {
    pub id: Uuid,
    pub business_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub phone_digits: String,
    pub customer_email: Option<String>,
    pub service_ids: Vec<Uuid>,
    pub professional_id: Option<Uuid>,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_price: f64,
    pub status: String,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public-facing card of a business.
#[derive(Debug, Serialize)]
pub struct PublicBusinessCard {
    pub id: Uuid,
    pub business_name: String,
    pub business_type: BusinessType,
    pub region: Region,
    pub business_slug: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub instagram: Option<String>,
    pub cancellation_policy: Option<String>,
    pub business_hours: BusinessHours,
    pub services: Vec<Service>,
    pub categories: Vec<ServiceCategory>,
    pub team: Vec<PublicProfessional>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicProfessional {
    pub id: Uuid,
    pub name: String,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublicBookingRequest {
    #[validate(length(min = 2, max = 120, message = "name is required"))]
    pub customer_name: String,
    #[validate(length(min = 8, max = 20, message = "phone is required"))]
    pub customer_phone: String,
    #[validate(email(message = "invalid e-mail"))]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, message = "select at least one service"))]
    pub service_ids: Vec<Uuid>,
    /// `None` means "any professional".
    pub professional_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "super::appointment::optional_hhmm", default)]
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Serialize)]
pub struct PublicBookingResult {
    pub booking: PublicBooking,
    /// `true` when an existing pending booking was returned instead.
    pub existing: bool,
    pub reschedule_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub professional_id: Option<Uuid>,
    pub duration: Option<i32>,
    #[serde(default)]
    pub is_professional: bool,
}

#[derive(Debug, Deserialize)]
pub struct FullDatesQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub professional_id: Option<Uuid>,
    pub duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct FirstAvailableQuery {
    pub time: DateTime<Utc>,
    pub duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveBookingQuery {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub token: String,
    pub date: NaiveDate,
    #[serde(with = "super::appointment::optional_hhmm", default)]
    pub time: Option<NaiveTime>,
    pub professional_id: Option<Uuid>,
}

/// Input to the serialized booking path shared by the wizard, staff
/// confirmation and public confirmation.
#[derive(Debug, Clone)]
pub struct SecureBookingInput {
    pub business_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub service: String,
    pub service_ids: Vec<Uuid>,
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: f64,
    pub discount_percent: f64,
    pub status: super::appointment::AppointmentStatus,
    pub source: super::appointment::AppointmentSource,
    pub public_booking_id: Option<Uuid>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub custom_service_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecureBookingOutcome {
    pub success: bool,
    pub message: String,
    pub appointment_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl SecureBookingOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            appointment_id: None,
            client_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingCreated {
        business_id: Uuid,
        booking_id: Uuid,
        customer_name: String,
        appointment_time: DateTime<Utc>,
    },
    AppointmentCreated {
        business_id: Uuid,
        appointment_id: Uuid,
        appointment_time: DateTime<Utc>,
    },
}

impl BookingEvent {
    pub fn business_id(&self) -> Uuid {
        match self {
            BookingEvent::BookingCreated { business_id, .. } => *business_id,
            BookingEvent::AppointmentCreated { business_id, .. } => *business_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated { .. } => "booking_created",
            BookingEvent::AppointmentCreated { .. } => "appointment_created",
        }
    }
}
