//! Testing utilities shared by unit and integration tests
//!
//! - [`fixtures`] - settings, sessions, seeded stores and ready-made services
//! - [`requests`] - HTTP request builders for handler tests
//! - [`assertions`] - assertion helpers for JSON responses
//! - [`mock`] - fake navigator, store, identity verifier and upstream

pub mod assertions;
pub mod fixtures;
pub mod mock;
pub mod requests;

pub use assertions::*;
pub use fixtures::TestFixtures;
pub use mock::{EchoUpstream, FailingStore, RecordingNavigator, StaticIdentityVerifier};
pub use requests::RequestBuilder;

/// Common test constants
pub mod constants {
    pub const TEST_SECRET: &str = "billboard-test-session-secret";

    pub const TEST_UID: &str = "owner-1";

    pub const TEST_EMAIL: &str = "owner@example.com";

    /// An address nothing listens on
    pub const UNREACHABLE_UPSTREAM: &str = "http://127.0.0.1:9";

    pub const TEST_USER_AGENT: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
}
