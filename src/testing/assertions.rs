//! Assertion helpers for handler responses

use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use serde_json::Value;

/// Assert a 302 to `location`
///
/// # Panics
///
/// Panics if the response is not the expected redirect
pub fn assert_redirects_to(response: &ServiceResponse, location: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some(location)
    );
}

/// Assert the `{error, details?}` shape and the `error` text
///
/// # Panics
///
/// Panics if the body does not carry `expected_error`
pub fn assert_error_body(body: &Value, expected_error: &str) {
    assert_eq!(
        body.get("error").and_then(Value::as_str),
        Some(expected_error),
        "unexpected error body: {body}"
    );
    if let Some(obj) = body.as_object() {
        assert!(
            obj.keys().all(|k| k == "error" || k == "details"),
            "unexpected keys in error body: {body}"
        );
    }
}
