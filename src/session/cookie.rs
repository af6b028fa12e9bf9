use actix_web::{cookie::Cookie, HttpRequest};
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Session, MAX_SESSION_DURATION_HOURS};
use crate::utils::crypto::{decrypt_data, encrypt_data};

/// Name of the encrypted session cookie
pub const COOKIE_NAME: &str = "billboard_session";

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: actix_web::cookie::SameSite,
    pub path: String,
    pub max_age: actix_web::cookie::time::Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: actix_web::cookie::SameSite::Lax,
            path: "/".to_string(),
            max_age: actix_web::cookie::time::Duration::hours(24),
        }
    }
}

/// Creates and opens encrypted cookies
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    session_duration_hours: u64,
}

impl CookieFactory {
    #[must_use]
    pub fn new(encryption_key: [u8; 32], cookie_secure: bool, session_duration_hours: u64) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            session_duration_hours,
        }
    }

    /// Create a cookie carrying `data` encrypted
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure && options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the encrypted session cookie
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_session_cookie(&self, session: &Session) -> Result<Cookie<'static>> {
        self.create_cookie(
            COOKIE_NAME,
            session,
            CookieOptions {
                max_age: actix_web::cookie::time::Duration::hours(
                    i64::try_from(self.session_duration_hours.min(MAX_SESSION_DURATION_HOURS))
                        .unwrap_or(24),
                ),
                ..Default::default()
            },
        )
    }

    /// Decrypt a named cookie from the request
    ///
    /// Missing cookies yield `None`; cookies that fail to decrypt (rotated
    /// secret, tampering) are logged and also yield `None`.
    #[must_use]
    pub fn read_cookie<T: DeserializeOwned>(&self, req: &HttpRequest, name: &str) -> Option<T> {
        let cookie = req.cookie(name)?;
        match decrypt_data::<T>(cookie.value(), &self.encryption_key) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("Failed to decrypt cookie '{name}': {e}");
                None
            }
        }
    }

    #[must_use]
    pub fn create_expired_cookie(&self) -> Cookie<'static> {
        create_expired_cookie(COOKIE_NAME, self.cookie_secure)
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

/// Create an expired cookie to clear a specific cookie
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(actix_web::cookie::SameSite::Lax)
        .path("/")
        .max_age(actix_web::cookie::time::Duration::seconds(-1))
        .finish()
}

/// Remove the session cookie from a `Cookie` header before it leaves the gate
#[must_use]
pub fn filter_session_cookie(cookie_str: &str) -> Option<String> {
    let prefix = format!("{COOKIE_NAME}=");
    let filtered_cookies: Vec<&str> = cookie_str
        .split(';')
        .map(str::trim)
        .filter(|cookie| !cookie.is_empty() && !cookie.starts_with(&prefix))
        .collect();

    if filtered_cookies.is_empty() {
        None
    } else {
        Some(filtered_cookies.join("; "))
    }
}
