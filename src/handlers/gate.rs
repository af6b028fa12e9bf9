//! Guarded page proxy
//!
//! Every request not claimed by an API route is a page navigation. Its path is
//! canonicalized once; a fresh [`RouteGuard`] decides that path against the
//! cookie session and allowed requests are forwarded to the marketplace UI at
//! the very same path.

use std::cell::RefCell;

use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use log::{debug, warn};
use reqwest::Client;

use crate::{
    guard::{Navigator, RouteGuard, RouteRules},
    models::Session,
    session::SessionManager,
    settings::BillboardSettings,
    utils::headers::{forward_response_headers, is_browser_request, RequestHeaderProcessor},
    utils::paths::CanonicalPath,
    utils::responses::{build_upstream_url, convert_http_method, ResponseBuilder},
};

/// Prefixes owned by the gate itself; unmatched requests there are 404s
const RESERVED_PREFIXES: [&str; 2] = ["/api/", "/auth/"];

/// HTTP client for making upstream requests
static CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(Client::new);

/// Captures the redirect the guard asks for so it can become a response
#[derive(Default)]
struct PendingRedirect(RefCell<Option<String>>);

impl Navigator for PendingRedirect {
    fn redirect(&self, location: &str) {
        *self.0.borrow_mut() = Some(location.to_string());
    }
}

/// Default service: guard the navigation, then proxy it upstream
///
/// # Errors
///
/// Returns an error if the upstream response body cannot be read
pub async fn gate(
    req: HttpRequest,
    body: web::Bytes,
    session_manager: web::Data<SessionManager>,
    rules: web::Data<RouteRules>,
    settings: web::Data<BillboardSettings>,
) -> ActixResult<HttpResponse> {
    let request_path = match CanonicalPath::parse(req.uri().path(), req.uri().query()) {
        Ok(path) => path,
        Err(e) => {
            debug!("Rejecting request path {}: {e}", req.uri().path());
            return Ok(ResponseBuilder::bad_request()
                .with_message("Invalid request path")
                .with_details(&e.to_string())
                .build());
        }
    };

    let route = request_path.route();
    if RESERVED_PREFIXES
        .iter()
        .any(|prefix| route.starts_with(prefix))
    {
        return Ok(ResponseBuilder::not_found().build());
    }

    let session = session_manager.get_session_from_request(&req);

    let pending = {
        let navigator = PendingRedirect::default();
        let mut guard = RouteGuard::new(rules.into_inner());
        guard.evaluate(session.as_ref(), &request_path.path_and_query(), &navigator);
        (!guard.renders_children()).then(|| navigator.0.into_inner().unwrap_or_default())
    };
    if let Some(location) = pending {
        return Ok(redirect_response(&req, &location, session.is_none()));
    }

    let upstream_response = match execute_upstream_request(
        &req,
        &request_path,
        &body,
        &settings,
        session.as_ref(),
    )
    .await
    {
        Ok(response) => response,
        Err(err_response) => return Ok(err_response),
    };

    forward_response(upstream_response).await
}

/// Browsers follow the redirect; API clients of protected pages get a 401
fn redirect_response(req: &HttpRequest, location: &str, signed_out: bool) -> HttpResponse {
    if signed_out && !is_browser_request(req) {
        debug!("Rejecting non-browser request to {} without a session", req.path());
        return ResponseBuilder::unauthorized().build();
    }
    ResponseBuilder::redirect(location).build()
}

async fn execute_upstream_request(
    req: &HttpRequest,
    request_path: &CanonicalPath,
    body: &web::Bytes,
    settings: &BillboardSettings,
    session: Option<&Session>,
) -> Result<reqwest::Response, HttpResponse> {
    let upstream_url = build_upstream_url(&settings.proxy.upstream_url, request_path)?;
    let method = convert_http_method(req.method())?;

    let mut processor = RequestHeaderProcessor::for_proxy();
    if let Some(session) = session {
        processor = processor.with_user(&session.uid, session.email());
    }
    let mut request_builder =
        processor.forward_request_headers(req, CLIENT.request(method, &upstream_url));

    if !body.is_empty() {
        request_builder = request_builder.body(body.to_vec());
    }

    request_builder.send().await.map_err(|err| {
        warn!("Upstream request to {upstream_url} failed: {err}");
        ResponseBuilder::bad_gateway().build()
    })
}

async fn forward_response(upstream_response: reqwest::Response) -> ActixResult<HttpResponse> {
    let actix_status = actix_web::http::StatusCode::from_u16(upstream_response.status().as_u16())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

    let mut response_builder = HttpResponse::build(actix_status);
    forward_response_headers(&upstream_response, &mut response_builder);

    let response_body = upstream_response.bytes().await.map_err(|err| {
        actix_web::error::ErrorBadGateway(format!("Failed to read upstream response: {err}"))
    })?;

    Ok(response_builder.body(response_body))
}
