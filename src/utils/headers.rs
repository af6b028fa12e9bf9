//! Header handling for the page proxy

use actix_web::{HttpRequest, HttpResponseBuilder};
use reqwest::RequestBuilder;

use crate::session::cookie::filter_session_cookie;

/// Header carrying the signed-in uid to the UI upstream
pub const AUTH_USER_HEADER: &str = "x-auth-request-user";

/// Header carrying the signed-in email to the UI upstream
pub const AUTH_EMAIL_HEADER: &str = "x-auth-request-email";

/// Determine if a request came from a browser vs an API client
/// Browsers typically send Accept headers that include text/html
#[must_use]
pub fn is_browser_request(req: &HttpRequest) -> bool {
    if let Some(accept_header) = req.headers().get("accept") {
        if let Ok(accept_str) = accept_header.to_str() {
            return accept_str.contains("text/html")
                || accept_str.contains("application/xhtml+xml");
        }
    }

    // Fallback: check User-Agent for common browser patterns
    if let Some(user_agent) = req.headers().get("user-agent") {
        if let Ok(ua_str) = user_agent.to_str() {
            let ua_lower = ua_str.to_lowercase();
            return ua_lower.contains("mozilla")
                || ua_lower.contains("chrome")
                || ua_lower.contains("safari")
                || ua_lower.contains("firefox");
        }
    }

    false
}

/// Check if a header is a hop-by-hop header that should not be forwarded
///
/// Based on RFC 2616 Section 13.5.1
#[must_use]
pub fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copies browser request headers onto the upstream request
///
/// Hop-by-hop headers, `Host` and any client-supplied identity headers are
/// dropped; the session cookie never leaves the gate.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaderProcessor {
    user: Option<String>,
    email: Option<String>,
}

impl RequestHeaderProcessor {
    #[must_use]
    pub fn for_proxy() -> Self {
        Self::default()
    }

    /// Identify the signed-in user to the upstream
    #[must_use]
    pub fn with_user(mut self, uid: &str, email: Option<&str>) -> Self {
        self.user = Some(uid.to_string());
        self.email = email.map(str::to_string);
        self
    }

    pub fn forward_request_headers(
        &self,
        req: &HttpRequest,
        mut request_builder: RequestBuilder,
    ) -> RequestBuilder {
        for (name, value) in req.headers() {
            let name_str = name.as_str().to_lowercase();
            if Self::should_skip_header(&name_str) {
                continue;
            }

            let Ok(value_str) = value.to_str() else {
                continue;
            };
            if name_str == "cookie" {
                if let Some(filtered) = filter_session_cookie(value_str) {
                    request_builder = request_builder.header(name.as_str(), filtered);
                }
            } else {
                request_builder = request_builder.header(name.as_str(), value_str);
            }
        }

        if let Some(user) = &self.user {
            request_builder = request_builder.header(AUTH_USER_HEADER, user);
        }
        if let Some(email) = &self.email {
            request_builder = request_builder.header(AUTH_EMAIL_HEADER, email);
        }
        request_builder
    }

    fn should_skip_header(name_str: &str) -> bool {
        name_str == "host"
            || name_str == AUTH_USER_HEADER
            || name_str == AUTH_EMAIL_HEADER
            || is_hop_by_hop_header(name_str)
    }
}

/// Copy upstream response headers back to the client, minus hop-by-hop ones
pub fn forward_response_headers(
    upstream_response: &reqwest::Response,
    response_builder: &mut HttpResponseBuilder,
) {
    for (name, value) in upstream_response.headers() {
        if is_hop_by_hop_header(name.as_str()) {
            continue;
        }
        if let Ok(value_str) = value.to_str() {
            response_builder.append_header((name.as_str(), value_str));
        }
    }
}
