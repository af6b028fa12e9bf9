use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod feature;

pub use feature::{ContentKind, FeaturePlan, FeatureRequest, FeatureWindow};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Longest session lifetime honoured anywhere; longer settings are clamped
pub const MAX_SESSION_DURATION_HOURS: u64 = 24 * 366 * 10;

/// Authenticated user context issued by the identity provider
///
/// The gate only observes sessions; they are created by the identity provider
/// and, server side, carried in the encrypted `billboard_session` cookie.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub uid: String,
    /// Provider-issued claims (email, name, `email_verified`, ...)
    #[serde(default)]
    pub claims: BTreeMap<String, Value>,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session that stays valid for `duration_hours`
    #[must_use]
    pub fn new(uid: &str, duration_hours: u64) -> Self {
        let now = Utc::now();
        let expires_at = i64::try_from(duration_hours.min(MAX_SESSION_DURATION_HOURS))
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            uid: uid.to_string(),
            claims: BTreeMap::new(),
            authenticated_at: now,
            expires_at,
        }
    }

    #[must_use]
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claims.get("email").and_then(Value::as_str)
    }

    /// Public view returned by the userinfo and session endpoints
    #[must_use]
    pub fn public_view(&self) -> Value {
        serde_json::json!({
            "uid": self.uid,
            "email": self.email(),
            "name": self.claims.get("name").and_then(Value::as_str),
            "expiresAt": self.expires_at.to_rfc3339(),
        })
    }
}
