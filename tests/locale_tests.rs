//! Locale cookie.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn locale_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/locale")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_sets_locale_cookie_for_a_year() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(locale_request(r#"{"locale":"en"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = common::set_cookie_headers(&response);
    let cookie = cookies
        .iter()
        .find(|c| c.starts_with("NEXT_LOCALE="))
        .expect("NEXT_LOCALE cookie");
    assert!(cookie.starts_with("NEXT_LOCALE=en"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=31536000"));

    let body = common::body_json(response).await;
    assert_eq!(body["locale"], "en");
}

#[tokio::test]
async fn test_rejects_unsupported_locale() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(locale_request(r#"{"locale":"fr"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(common::set_cookie_headers(&response).is_empty());
}
