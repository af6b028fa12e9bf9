//! Server-side ID token verification
//!
//! Browsers sign in against the hosted identity provider and hand the
//! resulting ID token to `POST /auth/session`. The token is checked with the
//! provider's account lookup endpoint before a session cookie is issued.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::models::Session;
use crate::settings::BillboardSettings;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider is not configured: {0}")]
    NotConfigured(String),
    #[error("ID token rejected: {0}")]
    Rejected(String),
    #[error("identity provider request failed: {0}")]
    Transport(String),
}

/// Verifies ID tokens and turns them into sessions
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `Rejected` for invalid or expired tokens, `Transport` or
    /// `NotConfigured` when the provider cannot be asked.
    async fn verify_id_token(&self, id_token: &str) -> Result<Session, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    email_verified: Option<bool>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupErrorResponse {
    error: LookupErrorBody,
}

#[derive(Debug, Deserialize)]
struct LookupErrorBody {
    message: String,
}

/// Identity Toolkit (`accounts:lookup`) backed verifier
#[derive(Clone)]
pub struct IdentityToolkitVerifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    session_duration_hours: u64,
}

impl IdentityToolkitVerifier {
    #[must_use]
    pub fn new(endpoint: &str, api_key: Option<String>, session_duration_hours: u64) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            session_duration_hours,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &BillboardSettings) -> Self {
        Self::new(
            &settings.identity.endpoint,
            settings.identity.api_key.clone(),
            settings.session.session_duration_hours,
        )
    }

    fn session_from_user(&self, user: LookupUser) -> Session {
        let mut session = Session::new(&user.local_id, self.session_duration_hours);
        if let Some(email) = user.email {
            session = session.with_claim("email", email);
        }
        if let Some(name) = user.display_name {
            session = session.with_claim("name", name);
        }
        if let Some(verified) = user.email_verified {
            session = session.with_claim("email_verified", verified);
        }
        if let Some(photo) = user.photo_url {
            session = session.with_claim("picture", photo);
        }
        session
    }
}

#[async_trait]
impl IdentityVerifier for IdentityToolkitVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<Session, IdentityError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| IdentityError::NotConfigured("identity.api_key is not set".into()))?;

        let url = format!(
            "{}/accounts:lookup?key={}",
            self.endpoint,
            urlencoding::encode(api_key)
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let message = response
                .json::<LookupErrorResponse>()
                .await
                .map_or_else(|_| "invalid ID token".to_string(), |body| body.error.message);
            warn!("Identity provider rejected ID token: {message}");
            return Err(IdentityError::Rejected(message));
        }
        if !status.is_success() {
            return Err(IdentityError::Transport(format!(
                "accounts:lookup returned {status}"
            )));
        }

        let lookup = response
            .json::<LookupResponse>()
            .await
            .map_err(|e| IdentityError::Transport(format!("invalid lookup response: {e}")))?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Rejected("no account for token".into()))?;

        debug!("Verified ID token for uid {}", user.local_id);
        Ok(self.session_from_user(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_user_becomes_session_claims() {
        let verifier = IdentityToolkitVerifier::new("https://id.example/v1/", None, 12);
        let lookup: LookupResponse = serde_json::from_str(
            r#"{"users":[{"localId":"u-42","email":"ads@example.com","displayName":"Ad Owner","emailVerified":true}]}"#,
        )
        .unwrap();

        let user = lookup.users.into_iter().next().unwrap();
        let session = verifier.session_from_user(user);

        assert_eq!(session.uid, "u-42");
        assert_eq!(session.email(), Some("ads@example.com"));
        assert_eq!(session.claims["name"], "Ad Owner");
        assert_eq!(session.claims["email_verified"], true);
        assert!(!session.claims.contains_key("picture"));
        assert_eq!(verifier.endpoint, "https://id.example/v1");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_configuration_error() {
        let verifier = IdentityToolkitVerifier::new("https://id.example/v1", None, 1);
        let err = verifier.verify_id_token("token").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured(_)));
    }
}
