use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A professional who can be assigned to appointments.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
    /// Percentage of each completed appointment owed to the professional.
    pub commission_rate: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Commission owed for an appointment of `price`, rounded to cents.
pub fn commission_for(price: f64, rate: f64) -> f64 {
    ((price * rate.clamp(0.0, 100.0) / 100.0) * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamMemberRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "commission rate must be between 0 and 100"))]
    pub commission_rate: Option<f64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamMemberRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid e-mail"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "commission rate must be between 0 and 100"))]
    pub commission_rate: Option<f64>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_is_rounded_to_cents() {
        assert_eq!(commission_for(100.0, 40.0), 40.0);
        assert_eq!(commission_for(45.0, 35.0), 15.75);
        assert_eq!(commission_for(80.0, 0.0), 0.0);
        assert_eq!(commission_for(80.0, 150.0), 80.0);
    }
}
