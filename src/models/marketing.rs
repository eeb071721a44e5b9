use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoAnalysis {
    pub suggestions: Vec<String>,
    pub background_options: Vec<String>,
    pub quality_score: f64,
    pub recommended_edits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialContent {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub cta: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Carousel,
    Reel,
    Story,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDay {
    pub day: String,
    pub content_type: ContentType,
    pub topic: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub posting_time: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignKind {
    Birthday,
    Reactivation,
    Promotion,
    Premium,
    Seasonal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignSuggestion {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CampaignKind,
    pub target_audience: String,
    pub objective: String,
    pub timing: String,
    pub expected_impact: String,
    pub message: String,
}

/// Aggregates sent to the model when asking for campaign ideas.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CampaignSignals {
    pub total_clients: i64,
    pub birthdays_this_month: i64,
    pub inactive_clients: i64,
    pub busiest_days: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzePhotoRequest {
    /// Base64 JPEG, with or without a `data:` URL prefix.
    #[validate(length(min = 16, message = "image is required"))]
    pub image_base64: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SocialContentRequest {
    #[validate(length(min = 3, max = 2000, message = "image description is required"))]
    pub image_description: String,
    #[validate(length(max = 1000, message = "request is too long"))]
    pub custom_request: Option<String>,
}
