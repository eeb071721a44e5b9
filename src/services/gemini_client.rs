//! Client for the Gemini `generateContent` endpoint.
//!
//! Prompts ask for bare JSON; models still wrap it in markdown fences now and
//! then, so every reply goes through [`parse_model_json`].

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("AI API key is not configured")]
    MissingApiKey,
    #[error("AI request timed out")]
    Timeout,
    #[error("AI returned an unexpected response: {0}")]
    MalformedOutput(String),
    #[error("AI request failed: {0}")]
    Http(String),
    #[error("AI API error [{status}]: {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeminiError::Timeout
        } else {
            GeminiError::Http(err.to_string())
        }
    }
}

/// One prompt, optionally with a JPEG attached.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_base64: Option<String>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_base64: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_base64: Some(image_base64.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Raw text of the first candidate.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GeminiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn body(request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image_base64 {
            parts.push(json!({
                "inlineData": { "mimeType": "image/jpeg", "data": strip_data_url(image) }
            }));
        }
        json!({ "contents": [{ "parts": parts }] })
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    #[tracing::instrument(skip(self, request), fields(vision = request.image_base64.is_some()))]
    async fn generate(&self, request: GenerationRequest) -> Result<String, GeminiError> {
        let api_key = self.config.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;
        let model = if request.image_base64.is_some() {
            &self.config.vision_model
        } else {
            &self.config.text_model
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::body(&request))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GeminiError::MalformedOutput(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            tracing::warn!(status = status.as_u16(), %message, "gemini request rejected");
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GeminiError::MalformedOutput("response has no candidate text".to_string()))
    }
}

/// Drops a `data:image/...;base64,` prefix if present.
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image,
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?\n?").expect("fence pattern is valid"))
}

/// Removes markdown code fences around a model reply.
pub fn strip_fences(text: &str) -> String {
    fence_pattern().replace_all(text, "").trim().to_string()
}

/// Fence-stripped reply parsed as JSON.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, GeminiError> {
    serde_json::from_str(&strip_fences(text)).map_err(|e| GeminiError::MalformedOutput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Caption {
        caption: String,
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n[1,2]\n```\n"), "[1,2]");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_json() {
        let parsed: Caption = parse_model_json("```json\n{\"caption\": \"Novo corte\"}\n```").unwrap();
        assert_eq!(
            parsed,
            Caption {
                caption: "Novo corte".into()
            }
        );
    }

    #[test]
    fn malformed_json_is_typed() {
        let err = parse_model_json::<Caption>("Claro! Aqui está:").unwrap_err();
        assert!(matches!(err, GeminiError::MalformedOutput(_)));
    }

    #[test]
    fn data_url_prefix_is_removed() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn image_requests_carry_inline_data() {
        let body = GeminiClient::body(&GenerationRequest::with_image("analise", "data:image/jpeg;base64,QUJD"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "analise");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "QUJD");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let err = client.generate(GenerationRequest::text("oi")).await.unwrap_err();
        assert!(matches!(err, GeminiError::MissingApiKey));
    }
}
