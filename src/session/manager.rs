//! Session Manager - stateless encrypted session handling
//!
//! The server side of the session lives entirely in the `billboard_session`
//! cookie. `SessionManager` opens it for request handlers and mints new
//! cookies after a successful identity verification.

use actix_web::{HttpRequest, HttpResponse};
use anyhow::Result;
use chrono::Utc;

use crate::models::Session;
use crate::session::cookie::{CookieFactory, COOKIE_NAME};
use crate::settings::BillboardSettings;
use crate::utils::crypto::derive_encryption_key;
use crate::utils::responses::ResponseBuilder;

#[derive(Clone)]
pub struct SessionManager {
    cookie_factory: CookieFactory,
    session_duration_hours: u64,
}

impl SessionManager {
    #[must_use]
    pub fn new(key: &[u8], cookie_secure: bool, session_duration_hours: u64) -> Self {
        let encryption_key = derive_encryption_key(key);
        Self {
            cookie_factory: CookieFactory::new(
                encryption_key,
                cookie_secure,
                session_duration_hours,
            ),
            session_duration_hours,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &BillboardSettings) -> Self {
        Self::new(
            settings.session.session_secret.as_bytes(),
            settings.cookies.secure,
            settings.session.session_duration_hours,
        )
    }

    /// Session carried by the request, if any
    ///
    /// Missing, undecryptable and expired cookies all read as signed out.
    #[must_use]
    pub fn get_session_from_request(&self, req: &HttpRequest) -> Option<Session> {
        let session: Session = self.cookie_factory.read_cookie(req, COOKIE_NAME)?;

        if session.is_expired() {
            log::debug!(
                "Session for {} expired at {}, current time: {}",
                session.uid,
                session.expires_at,
                Utc::now()
            );
            return None;
        }
        Some(session)
    }

    /// Require a session, producing the JSON 401 when absent
    ///
    /// # Errors
    ///
    /// Returns the ready-made unauthorized response when no valid session exists
    pub fn require_session(&self, req: &HttpRequest) -> Result<Session, HttpResponse> {
        self.get_session_from_request(req)
            .ok_or_else(|| ResponseBuilder::unauthorized().build())
    }

    /// Build the `Set-Cookie` value for a fresh session
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be encrypted
    pub fn create_session_cookie(
        &self,
        session: &Session,
    ) -> Result<actix_web::cookie::Cookie<'static>> {
        self.cookie_factory.create_session_cookie(session)
    }

    #[must_use]
    pub fn create_expired_cookie(&self) -> actix_web::cookie::Cookie<'static> {
        self.cookie_factory.create_expired_cookie()
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_factory.cookie_secure()
    }

    #[must_use]
    pub const fn session_duration_hours(&self) -> u64 {
        self.session_duration_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const TEST_SECRET: &[u8] = b"test_session_secret_for_billboard";

    fn request_with(manager: &SessionManager, session: &Session) -> HttpRequest {
        let cookie = manager.create_session_cookie(session).unwrap();
        TestRequest::default().cookie(cookie).to_http_request()
    }

    #[test]
    fn test_session_manager_creation() {
        let manager = SessionManager::new(TEST_SECRET, true, 24);
        assert!(manager.cookie_secure());
        assert_eq!(manager.session_duration_hours(), 24);
    }

    #[test]
    fn test_no_cookie_means_no_session() {
        let manager = SessionManager::new(TEST_SECRET, false, 24);
        let req = TestRequest::default().to_http_request();
        assert!(manager.get_session_from_request(&req).is_none());

        let response = manager.require_session(&req).unwrap_err();
        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_valid_session_is_read_back() {
        let manager = SessionManager::new(TEST_SECRET, false, 24);
        let session = Session::new("owner-1", 24).with_claim("email", "owner@example.com");
        let req = request_with(&manager, &session);

        let read = manager.require_session(&req).unwrap();
        assert_eq!(read.uid, "owner-1");
        assert_eq!(read.email(), Some("owner@example.com"));
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let manager = SessionManager::new(TEST_SECRET, false, 24);
        let mut session = Session::new("owner-1", 1);
        session.expires_at = Utc::now() - chrono::Duration::minutes(5);
        let req = request_with(&manager, &session);

        assert!(manager.get_session_from_request(&req).is_none());
    }

    #[test]
    fn test_cookie_from_other_secret_is_ignored() {
        let minted_by = SessionManager::new(b"first-secret", false, 24);
        let reader = SessionManager::new(b"second-secret", false, 24);
        let req = request_with(&minted_by, &Session::new("owner-1", 24));

        assert!(reader.get_session_from_request(&req).is_none());
    }
}
