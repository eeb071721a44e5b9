use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Estimated minutes per person ahead in the queue.
pub const MINUTES_PER_POSITION: i64 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Calling,
    Serving,
    Completed,
    Cancelled,
    NoShow,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Calling => "calling",
            QueueStatus::Serving => "serving",
            QueueStatus::Completed => "completed",
            QueueStatus::Cancelled => "cancelled",
            QueueStatus::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(QueueStatus::Waiting),
            "calling" => Some(QueueStatus::Calling),
            "serving" => Some(QueueStatus::Serving),
            "completed" => Some(QueueStatus::Completed),
            "cancelled" => Some(QueueStatus::Cancelled),
            "no_show" => Some(QueueStatus::NoShow),
            _ => None,
        }
    }

    /// Allowed staff transitions.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        matches!(
            (self, next),
            (Waiting, Calling)
                | (Calling, Serving)
                | (Serving, Completed)
                | (Waiting, Cancelled)
                | (Calling, Cancelled)
                | (Waiting, NoShow)
                | (Calling, NoShow)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: Uuid,
    pub business_id: Uuid,
    pub client_name: String,
    pub client_phone: String,
    pub client_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinQueueRequest {
    #[validate(length(min = 2, max = 120, message = "name is required"))]
    pub client_name: String,
    #[validate(length(min = 8, max = 20, message = "phone is required"))]
    pub client_phone: String,
    pub service_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct QueueTransitionRequest {
    pub status: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct QueuePosition {
    pub entry_id: Uuid,
    pub status: String,
    pub position: i64,
    pub estimated_wait_minutes: i64,
}

impl QueuePosition {
    pub fn new(entry_id: Uuid, status: String, waiting_ahead: i64) -> Self {
        let position = waiting_ahead + 1;
        Self {
            entry_id,
            status,
            position,
            estimated_wait_minutes: position * MINUTES_PER_POSITION,
        }
    }
}

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    pub waiting: i64,
    pub serving: i64,
    pub completed_today: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_and_wait() {
        let p = QueuePosition::new(Uuid::nil(), "waiting".into(), 0);
        assert_eq!(p.position, 1);
        assert_eq!(p.estimated_wait_minutes, 20);

        let p = QueuePosition::new(Uuid::nil(), "waiting".into(), 3);
        assert_eq!(p.position, 4);
        assert_eq!(p.estimated_wait_minutes, 80);
    }

    #[test]
    fn transitions_follow_the_flow() {
        use QueueStatus::*;
        assert!(Waiting.can_transition_to(Calling));
        assert!(Calling.can_transition_to(Serving));
        assert!(Serving.can_transition_to(Completed));
        assert!(Waiting.can_transition_to(NoShow));
        assert!(!Waiting.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Waiting));
        assert!(!Serving.can_transition_to(Cancelled));
    }
}
