mod common;

use axum::http::{header, Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, empty_request, json_request, test_app};

#[tokio::test]
async fn health_reports_ok() {
    let response = test_app()
        .oneshot(empty_request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "agenx");
}

#[tokio::test]
async fn responses_carry_nosniff() {
    let response = test_app()
        .oneshot(empty_request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn business_routes_require_a_token() {
    for uri in [
        "/api/clients",
        "/api/appointments",
        "/api/dashboard",
        "/api/finance/stats",
        "/api/aios/diagnostic",
        "/api/recycle-bin",
        "/api/events",
    ] {
        let response = test_app()
            .oneshot(empty_request(Method::GET, uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["error"], "MISSING_AUTH_HEADER", "{uri}");
    }
}

#[tokio::test]
async fn non_bearer_authorization_is_rejected() {
    let request = axum::http::Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "INVALID_AUTH_HEADER");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let request = axum::http::Request::builder()
        .uri("/api/team")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_portal_requires_a_token() {
    let response = test_app()
        .oneshot(empty_request(Method::GET, "/api/client/appointments"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_booking_is_validated_before_lookup() {
    let body = json!({
        "customer_name": "A",
        "customer_phone": "123",
        "service_ids": [],
        "date": "2024-03-05",
        "time": "10:00"
    });

    let response = test_app()
        .oneshot(json_request(
            Method::POST,
            "/api/public/barbearia-central/bookings",
            &body.to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("customer_name: name is required"), "{message}");
    assert!(message.contains("customer_phone: phone is required"), "{message}");
    assert!(message.contains("service_ids: select at least one service"), "{message}");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/public/barbearia-central/queue", "{"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn invalid_time_format_is_rejected() {
    let body = json!({
        "customer_name": "Ana Souza",
        "customer_phone": "11987654321",
        "service_ids": ["2f1f6a52-8c1e-4d8e-9b51-0b6d5d3f1c11"],
        "date": "2024-03-05",
        "time": "10h30"
    });

    let response = test_app()
        .oneshot(json_request(
            Method::POST,
            "/api/public/barbearia-central/bookings",
            &body.to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn booking_id_must_be_a_uuid() {
    let response = test_app()
        .oneshot(empty_request(
            Method::GET,
            "/api/public/bookings/not-a-uuid?token=abc",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn public_writes_are_rate_limited() {
    let app = test_app();
    let body = json!({ "client_name": "", "client_phone": "" }).to_string();

    for _ in 0..30 {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/public/barbearia-central/queue", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(json_request(Method::POST, "/api/public/barbearia-central/queue", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "RATE_LIMITED");
}

#[tokio::test]
async fn weak_password_is_refused_on_register() {
    let body = json!({
        "email": "dono@barbearia.com",
        "password": "fraca",
        "business_name": "Barbearia Central",
        "business_type": "barber",
        "region": "BR"
    });

    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/auth/register", &body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "WEAK_PASSWORD");
}

#[tokio::test]
async fn invalid_email_is_refused_on_register() {
    let body = json!({
        "email": "not-an-email",
        "password": "Forte#2024",
        "business_name": "Barbearia Central"
    });

    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/auth/register", &body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn error_report_needs_a_message() {
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/logs", r#"{"message": ""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "message: message is required");
}

#[tokio::test]
async fn listing_logs_still_requires_a_token() {
    let response = test_app()
        .oneshot(empty_request(Method::GET, "/api/logs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_escape_the_limit() {
    let app = test_app();
    let body = json!({ "client_name": "", "client_phone": "" }).to_string();

    let mut limited = 0;
    for i in 0..40 {
        let mut request = json_request(Method::POST, "/api/public/barbearia-central/queue", &body);
        request.headers_mut().insert(
            "x-forwarded-for",
            format!("198.51.100.{i}").parse().unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }

    assert_eq!(limited, 10);
}

#[tokio::test]
async fn refresh_token_is_not_a_bearer_token() {
    let jwt = agenx::auth::JwtService::new(common::TEST_JWT_SECRET);
    let owner = uuid::Uuid::new_v4();
    let refresh = jwt
        .create_refresh_token(owner, "dono@barbearia.com", agenx::auth::UserRole::Owner, owner)
        .unwrap();

    let request = axum::http::Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
        .body(axum::body::Body::empty())
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
