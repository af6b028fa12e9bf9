//! HTTP request builders for testing handlers

use actix_web::http::Method;
use actix_web::test::TestRequest;

use super::constants::TEST_USER_AGENT;
use super::fixtures::TestFixtures;
use crate::models::Session;

/// Thin layer over `TestRequest` for browser and API style requests
pub struct RequestBuilder {
    inner: TestRequest,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            inner: TestRequest::default().method(method).uri(uri),
        }
    }

    /// Page navigation as a browser sends it
    #[must_use]
    pub fn browser(uri: &str) -> Self {
        Self::new(Method::GET, uri)
            .header("User-Agent", TEST_USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
    }

    /// JSON API call
    #[must_use]
    pub fn api(method: Method, uri: &str) -> Self {
        Self::new(method, uri)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.insert_header((name.to_string(), value.to_string()));
        self
    }

    /// Attach the encrypted session cookie
    #[must_use]
    pub fn with_session(mut self, session: &Session) -> Self {
        self.inner = self.inner.cookie(TestFixtures::session_cookie(session));
        self
    }

    #[must_use]
    pub fn json_body(mut self, body: &serde_json::Value) -> Self {
        self.inner = self.inner.set_payload(body.to_string());
        self
    }

    #[must_use]
    pub fn raw_body(mut self, body: &'static str) -> Self {
        self.inner = self.inner.set_payload(body);
        self
    }

    #[must_use]
    pub fn build(self) -> TestRequest {
        self.inner
    }
}
