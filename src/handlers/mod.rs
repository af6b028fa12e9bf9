// HTTP request handlers
pub mod auth;
pub mod chat;
pub mod feature;
pub mod gate;
pub mod health;

pub use auth::{create_session, sign_out, userinfo};
pub use chat::start_chat;
pub use feature::feature_listing;
pub use gate::gate;
pub use health::health;
