//! Page route guard
//!
//! A small state machine deciding, for the current session and navigation
//! path, whether page content may render or the client must be redirected.
//!
//! ```text
//!            evaluate(session, path)
//! Checking ─────────────────────────┬──> Allowed
//!    ^                              └──> Redirecting { location }
//!    └──── (session or path changes) ────┘
//! ```
//!
//! The guard is authoritative: while a redirect is pending nothing renders.

pub mod rules;

use std::sync::Arc;

use log::debug;

use crate::models::Session;
use crate::session::{SessionContext, SessionError};

pub use rules::{GuardDecision, RouteRules};

/// Navigation capability consumed by the guard
pub trait Navigator {
    fn redirect(&self, location: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Allowed,
    Redirecting { location: String },
}

pub struct RouteGuard {
    rules: Arc<RouteRules>,
    state: GuardState,
    /// (uid, path) the current state was computed for
    evaluated_for: Option<(Option<String>, String)>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(rules: Arc<RouteRules>) -> Self {
        Self {
            rules,
            state: GuardState::Checking,
            evaluated_for: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Children render only once the guard settled on `Allowed`
    #[must_use]
    pub fn renders_children(&self) -> bool {
        self.state == GuardState::Allowed
    }

    /// Apply the transition rule for `(session, path)`
    ///
    /// Re-evaluating an unchanged pair is a no-op, so a redirect is issued
    /// at most once per pair.
    pub fn evaluate(
        &mut self,
        session: Option<&Session>,
        path: &str,
        navigator: &dyn Navigator,
    ) -> &GuardState {
        let key = (session.map(|s| s.uid.clone()), path.to_string());
        if self.evaluated_for.as_ref() == Some(&key) {
            return &self.state;
        }

        let decision = self.rules.decide(session.is_some(), path);
        self.state = match decision.location() {
            Some(location) => {
                debug!("Route guard redirecting {path} to {location}");
                navigator.redirect(location);
                GuardState::Redirecting {
                    location: location.to_string(),
                }
            }
            None => GuardState::Allowed,
        };
        self.evaluated_for = Some(key);
        &self.state
    }

    /// Evaluate against a session context, staying in `Checking` until the
    /// identity provider delivered its first state
    ///
    /// # Errors
    ///
    /// Returns `OutsideProvider` if the context's provider was torn down
    pub fn evaluate_context(
        &mut self,
        context: &SessionContext,
        path: &str,
        navigator: &dyn Navigator,
    ) -> Result<&GuardState, SessionError> {
        if !context.is_resolved()? {
            self.state = GuardState::Checking;
            self.evaluated_for = None;
            return Ok(&self.state);
        }
        let session = context.current()?;
        Ok(self.evaluate(session.as_ref(), path, navigator))
    }
}
