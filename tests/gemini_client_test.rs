use std::time::Duration;

use agenx::config::GeminiConfig;
use agenx::services::gemini_client::{parse_model_json, GenerationRequest};
use agenx::services::{ContentGenerator, GeminiClient, GeminiError};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn candidate(text: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

#[derive(Debug, Deserialize, PartialEq)]
struct SocialPost {
    caption: String,
    hashtags: Vec<String>,
}

#[tokio::test]
async fn text_prompt_uses_the_text_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash-lite:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "Escreva uma legenda" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("Corte novo!")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate(GenerationRequest::text("Escreva uma legenda"))
        .await
        .unwrap();

    assert_eq!(text, "Corte novo!");
}

#[tokio::test]
async fn image_prompt_uses_the_vision_model_without_data_url_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "text": "Analise a foto" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "aGVsbG8=" } }
            ] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate(GenerationRequest::with_image(
            "Analise a foto",
            "data:image/jpeg;base64,aGVsbG8=",
        ))
        .await
        .unwrap();

    assert_eq!(text, "{}");
}

#[tokio::test]
async fn fenced_json_reply_is_parsed() {
    let server = MockServer::start().await;
    let reply = "```json\n{\"caption\": \"Degradê na régua\", \"hashtags\": [\"#barbearia\"]}\n```";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(reply)))
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate(GenerationRequest::text("post"))
        .await
        .unwrap();
    let post: SocialPost = parse_model_json(&text).unwrap();

    assert_eq!(
        post,
        SocialPost {
            caption: "Degradê na régua".to_string(),
            hashtags: vec!["#barbearia".to_string()],
        }
    );
}

#[tokio::test]
async fn api_error_carries_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(GenerationRequest::text("post"))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        GeminiError::Api { status: 429, ref message } if message == "Resource has been exhausted"
    );
}

#[tokio::test]
async fn reply_without_candidates_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(GenerationRequest::text("post"))
        .await
        .unwrap_err();

    assert_matches!(err, GeminiError::MalformedOutput(_));
}

#[tokio::test]
async fn missing_key_fails_without_calling_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = GeminiClient::new(GeminiConfig {
        api_key: None,
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();

    let err = client.generate(GenerationRequest::text("post")).await.unwrap_err();
    assert_matches!(err, GeminiError::MissingApiKey);
}
