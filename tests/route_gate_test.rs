// Route guard behaviour, both as a state machine and behind the page gate
use std::sync::Arc;

use actix_web::http::{Method, StatusCode};
use actix_web::{test, App};
use chrono::{Duration, Utc};

use billboard_gate::guard::{GuardState, RouteGuard, RouteRules};
use billboard_gate::identity::LocalIdentityProvider;
use billboard_gate::session::SessionProvider;
use billboard_gate::testing::{
    assert_redirects_to, EchoUpstream, RecordingNavigator, RequestBuilder, TestFixtures,
};

macro_rules! gate_app {
    () => {{
        gate_app!(TestFixtures::settings())
    }};
    ($settings:expr) => {{
        let services = TestFixtures::services($settings, TestFixtures::seeded_store(&[]));
        test::init_service(App::new().configure(move |cfg| services.configure(cfg))).await
    }};
}

fn echo_settings(upstream: &EchoUpstream) -> billboard_gate::BillboardSettings {
    let mut settings = TestFixtures::settings();
    settings.proxy.upstream_url = upstream.url().to_string();
    settings
}

#[actix_web::test]
async fn test_sessionless_browser_is_sent_to_login_with_return_path() {
    let app = gate_app!();

    let resp = test::call_service(&app, RequestBuilder::browser("/create-listing").build().to_request()).await;
    assert_redirects_to(&resp, "/login?redirect=%2Fcreate-listing");

    let resp = test::call_service(
        &app,
        RequestBuilder::browser("/my-listings/42?tab=stats").build().to_request(),
    )
    .await;
    assert_redirects_to(&resp, "/login?redirect=%2Fmy-listings%2F42%3Ftab%3Dstats");
}

#[actix_web::test]
async fn test_sessionless_api_client_gets_401() {
    let app = gate_app!();

    let req = RequestBuilder::api(Method::GET, "/dashboard").build();
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_signed_in_visitor_is_bounced_off_auth_pages() {
    let app = gate_app!();

    for path in ["/login", "/signup"] {
        let req = RequestBuilder::browser(path)
            .with_session(&TestFixtures::session())
            .build();
        let resp = test::call_service(&app, req.to_request()).await;
        assert_redirects_to(&resp, "/");
    }
}

#[actix_web::test]
async fn test_allowed_navigations_reach_the_upstream() {
    // The fixture upstream is unreachable, so an allowed request surfaces as 502
    let app = gate_app!();

    let signed_out_login = RequestBuilder::browser("/login").build();
    let resp = test::call_service(&app, signed_out_login.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let public_listing = RequestBuilder::browser("/listings/7").build();
    let resp = test::call_service(&app, public_listing.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let signed_in_dashboard = RequestBuilder::browser("/dashboard")
        .with_session(&TestFixtures::session())
        .build();
    let resp = test::call_service(&app, signed_in_dashboard.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn test_expired_cookie_counts_as_signed_out() {
    let app = gate_app!();

    let mut session = TestFixtures::session();
    session.expires_at = Utc::now() - Duration::minutes(1);
    let req = RequestBuilder::browser("/messages").with_session(&session).build();
    let resp = test::call_service(&app, req.to_request()).await;
    assert_redirects_to(&resp, "/login?redirect=%2Fmessages");
}

#[actix_web::test]
async fn test_non_canonical_spellings_of_protected_paths_still_redirect() {
    let upstream = EchoUpstream::start();
    let app = gate_app!(echo_settings(&upstream));

    for path in [
        "/dashboard",
        "//dashboard",
        "/./dashboard",
        "/x/../dashboard",
        "/%2E/dashboard",
        "/%2e%2e/dashboard",
        "/%2Fdashboard",
        "/%64ashboard",
    ] {
        let resp = test::call_service(&app, RequestBuilder::browser(path).build().to_request()).await;
        assert_redirects_to(&resp, "/login?redirect=%2Fdashboard");
    }
}

#[actix_web::test]
async fn test_undecodable_paths_are_rejected() {
    let app = gate_app!();

    for path in ["/dash%0Aboard", "/%FF%FE"] {
        let resp = test::call_service(&app, RequestBuilder::browser(path).build().to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path}");
    }
}

#[actix_web::test]
async fn test_absolute_url_paths_stay_on_the_configured_upstream() {
    let upstream = EchoUpstream::start();
    let app = gate_app!(echo_settings(&upstream));

    // The host named in the path is unreachable; only the configured upstream answers
    let req = RequestBuilder::browser("/http://127.0.0.1:9/internal-admin")
        .with_session(&TestFixtures::session())
        .build();
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let seen = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(
        seen.starts_with("GET /http%3A/127.0.0.1%3A9/internal-admin HTTP/1.1"),
        "{seen}"
    );
}

#[actix_web::test]
async fn test_allowed_request_is_relayed_with_identity_headers() {
    let upstream = EchoUpstream::start();
    let app = gate_app!(echo_settings(&upstream));

    let req = RequestBuilder::browser("/dashboard?tab=billing")
        .with_session(&TestFixtures::session())
        .header("X-Auth-Request-User", "spoofed")
        .build()
        .cookie(actix_web::cookie::Cookie::new("theme", "dark"));
    let resp = test::call_service(&app, req.to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-upstream").unwrap(), "echo");
    assert!(resp
        .headers()
        .get_all("set-cookie")
        .any(|value| value.to_str().unwrap().starts_with("ui_pref=compact")));

    let seen = String::from_utf8(test::read_body(resp).await.to_vec())
        .unwrap()
        .to_lowercase();
    assert!(seen.starts_with("get /dashboard?tab=billing http/1.1"), "{seen}");
    assert!(seen.contains("x-auth-request-user: owner-1\r\n"), "{seen}");
    assert!(seen.contains("x-auth-request-email: owner@example.com\r\n"), "{seen}");
    assert!(!seen.contains("spoofed"), "{seen}");
    assert!(seen.contains("theme=dark"), "{seen}");
    assert!(!seen.contains("billboard_session"), "{seen}");
}

#[actix_web::test]
async fn test_signed_out_request_carries_no_identity() {
    let upstream = EchoUpstream::start();
    let app = gate_app!(echo_settings(&upstream));

    let resp = test::call_service(&app, RequestBuilder::browser("/listings/7").build().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let seen = String::from_utf8(test::read_body(resp).await.to_vec())
        .unwrap()
        .to_lowercase();
    assert!(seen.starts_with("get /listings/7 http/1.1"), "{seen}");
    assert!(!seen.contains("x-auth-request-user"), "{seen}");
}

#[actix_web::test]
async fn test_unmatched_api_paths_are_not_proxied() {
    let app = gate_app!();

    for path in ["/api/unknown", "//api/unknown", "/x/../auth/anything"] {
        let req = RequestBuilder::api(Method::GET, path).build();
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[::core::prelude::v1::test]
fn test_guard_follows_session_provider_lifecycle() {
    let identity = LocalIdentityProvider::new();
    let provider = SessionProvider::mount(&identity);
    let context = provider.context();
    let navigator = RecordingNavigator::default();
    let mut guard = RouteGuard::new(Arc::new(RouteRules::default()));

    // Signed out on a protected page: one redirect, nothing rendered
    guard.evaluate_context(&context, "/profile", &navigator).unwrap();
    guard.evaluate_context(&context, "/profile", &navigator).unwrap();
    assert_eq!(navigator.redirects(), vec!["/login?redirect=%2Fprofile"]);
    assert!(!guard.renders_children());

    // Signing in re-evaluates the same path and lets it render
    identity.sign_in(TestFixtures::session());
    assert_eq!(
        guard.evaluate_context(&context, "/profile", &navigator).unwrap(),
        &GuardState::Allowed
    );
    assert!(guard.renders_children());

    // Navigating to /login while signed in bounces home
    guard.evaluate_context(&context, "/login", &navigator).unwrap();
    assert_eq!(navigator.redirects().last().map(String::as_str), Some("/"));

    provider.teardown();
    assert!(guard.evaluate_context(&context, "/profile", &navigator).is_err());
    assert_eq!(identity.subscriber_count(), 0);
}

#[::core::prelude::v1::test]
fn test_custom_route_rules() {
    let rules = RouteRules::new(vec!["/vault".into()], vec!["/enter".into()])
        .with_login_path("/enter")
        .with_home_path("/lobby")
        .with_return_param("next");
    let navigator = RecordingNavigator::default();
    let mut guard = RouteGuard::new(Arc::new(rules));

    guard.evaluate(None, "/vault/keys", &navigator);
    let session = TestFixtures::session();
    guard.evaluate(Some(&session), "/enter", &navigator);

    assert_eq!(navigator.redirects(), vec!["/enter?next=%2Fvault%2Fkeys", "/lobby"]);
}
