#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the billboard-gate application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod featuring;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod server;
pub mod session;
pub mod settings;
pub mod store;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use featuring::{FeatureError, FeatureService};
pub use guard::{GuardState, Navigator, RouteGuard, RouteRules};
pub use identity::{IdentityProvider, LocalIdentityProvider, Subscription};
pub use models::Session;
pub use server::AppServices;
pub use session::{SessionContext, SessionError, SessionManager, SessionProvider};
pub use settings::BillboardSettings;
pub use store::{DocumentStore, StoreError};
