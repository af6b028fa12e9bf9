//! HTTP response helpers
//!
//! Every error leaving the gate has the shape `{"error": ..., "details": ...}`
//! with `details` omitted when there is nothing to add.

use actix_web::{cookie::Cookie, http::header, http::StatusCode, HttpResponse};
use serde_json::{json, Value};

use super::paths::CanonicalPath;

/// Pre-serialized bodies for the errors without details
static CACHED_RESPONSES: std::sync::LazyLock<CachedResponses> =
    std::sync::LazyLock::new(CachedResponses::new);

struct CachedResponses {
    unauthorized: String,
    invalid_request: String,
    server_error: String,
    bad_gateway: String,
}

impl CachedResponses {
    fn new() -> Self {
        Self {
            unauthorized: Self::create_json(ErrorType::Unauthorized.default_message()),
            invalid_request: Self::create_json(ErrorType::BadRequest.default_message()),
            server_error: Self::create_json(ErrorType::InternalServerError.default_message()),
            bad_gateway: Self::create_json(ErrorType::BadGateway.default_message()),
        }
    }

    fn create_json(error: &str) -> String {
        json!({ "error": error }).to_string()
    }

    fn body_for(&self, error_type: ErrorType) -> Option<&str> {
        match error_type {
            ErrorType::Unauthorized => Some(&self.unauthorized),
            ErrorType::BadRequest => Some(&self.invalid_request),
            ErrorType::InternalServerError => Some(&self.server_error),
            ErrorType::BadGateway => Some(&self.bad_gateway),
            ErrorType::NotFound | ErrorType::PaymentRequired => None,
        }
    }
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    #[must_use]
    pub fn bad_request() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::BadRequest)
    }

    #[must_use]
    pub fn unauthorized() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::Unauthorized)
    }

    #[must_use]
    pub fn payment_required() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::PaymentRequired)
    }

    #[must_use]
    pub fn not_found() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::NotFound)
    }

    #[must_use]
    pub fn internal_server_error() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::InternalServerError)
    }

    #[must_use]
    pub fn bad_gateway() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::BadGateway)
    }

    /// Create a redirect response (302 Found) with optional cookies
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    #[must_use]
    pub fn missing_field(field_name: &str) -> HttpResponse {
        Self::bad_request()
            .with_message(&format!("Missing required field: {field_name}"))
            .build()
    }
}

/// Builder for error responses with fluent interface
pub struct ErrorResponseBuilder {
    error_type: ErrorType,
    message: Option<String>,
    details: Option<String>,
}

#[derive(Clone, Copy)]
enum ErrorType {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    NotFound,
    InternalServerError,
    BadGateway,
}

impl ErrorType {
    fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "The request is malformed or invalid",
            Self::Unauthorized => "Authentication is required to access this resource",
            Self::PaymentRequired => "Payment has not been verified",
            Self::NotFound => "Not found",
            Self::InternalServerError => "An internal server error occurred",
            Self::BadGateway => "Failed to connect to upstream server",
        }
    }
}

impl ErrorResponseBuilder {
    fn new(error_type: ErrorType) -> Self {
        Self {
            error_type,
            message: None,
            details: None,
        }
    }

    /// Replace the default `error` text
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> HttpResponse {
        let status = self.error_type.status();

        if self.message.is_none() && self.details.is_none() {
            if let Some(body) = CACHED_RESPONSES.body_for(self.error_type) {
                return HttpResponse::build(status)
                    .insert_header((header::CONTENT_TYPE, "application/json"))
                    .body(body.to_string());
            }
        }

        let mut json_body = json!({
            "error": self
                .message
                .unwrap_or_else(|| self.error_type.default_message().to_string()),
        });
        if let Some(details) = self.details {
            json_body["details"] = Value::String(details);
        }

        HttpResponse::build(status).json(json_body)
    }
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
    cookies: Vec<Cookie<'static>>,
}

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn build(self) -> HttpResponse {
        let mut builder = HttpResponse::Found();
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder
            .append_header((header::LOCATION, self.location))
            .finish()
    }
}

/// Convert Actix HTTP method to reqwest method
///
/// # Errors
///
/// Returns an `HttpResponse` error if the HTTP method is not supported
pub fn convert_http_method(
    method: &actix_web::http::Method,
) -> Result<reqwest::Method, HttpResponse> {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(|_| {
        ResponseBuilder::bad_request()
            .with_message("HTTP method not supported")
            .build()
    })
}

/// Point the upstream base URL at a canonical request path
///
/// Only the path and query of the base change; scheme, host and port always
/// stay those of the configured upstream. A path prefix on the base is kept.
///
/// # Errors
///
/// Returns a 502 response if the configured base URL cannot be used
pub fn build_upstream_url(base_url: &str, path: &CanonicalPath) -> Result<String, HttpResponse> {
    use log::warn;
    use url::Url;

    let mut url = Url::parse(base_url).map_err(|e| {
        warn!("Failed to parse upstream URL '{base_url}': {e}");
        ResponseBuilder::bad_gateway()
            .with_details("Upstream URL is not configured correctly")
            .build()
    })?;
    if url.cannot_be_a_base() {
        warn!("Upstream URL '{base_url}' cannot carry a path");
        return Err(ResponseBuilder::bad_gateway()
            .with_details("Upstream URL is not configured correctly")
            .build());
    }

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}{}", path.upstream_path()));
    url.set_query(path.query());
    url.set_fragment(None);
    Ok(url.to_string())
}
