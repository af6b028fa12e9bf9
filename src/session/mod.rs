//! Session handling
//!
//! - [`provider`] - client-lifetime session state fed by an identity provider
//! - [`manager`] - encrypted session cookies on the server side
//! - [`cookie`] - cookie construction and filtering

pub mod cookie;
pub mod manager;
pub mod provider;

pub use cookie::{filter_session_cookie, CookieFactory, CookieOptions, COOKIE_NAME};
pub use manager::SessionManager;
pub use provider::{SessionContext, SessionError, SessionProvider};
