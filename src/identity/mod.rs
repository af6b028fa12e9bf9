//! Identity provider capabilities
//!
//! The marketplace never owns user sessions. They are issued by a hosted
//! identity provider and observed here through two capabilities:
//!
//! - [`IdentityProvider`] - a session-change stream for client-lifetime state
//! - [`verifier::IdentityVerifier`] - server-side verification of ID tokens
//!
//! [`LocalIdentityProvider`] is an in-process provider used by tests and by
//! embedders that drive sign-in themselves.

pub mod verifier;

use crate::models::Session;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub use verifier::{IdentityError, IdentityToolkitVerifier, IdentityVerifier};

/// Callback receiving every session change (`None` when signed out)
pub type SessionListener = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// A session-change stream
pub trait IdentityProvider: Send + Sync {
    /// Register `on_change`; dropping or cancelling the returned handle unsubscribes
    fn subscribe(&self, on_change: SessionListener) -> Subscription;
}

/// Handle to a live subscription
///
/// The cancel action runs exactly once, on [`Subscription::cancel`] or on drop.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Ordered listener registry shared by the local provider and the session provider
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<(u64, SessionListener)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn add(registry: &Arc<Self>, listener: SessionListener) -> Subscription {
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        let registry: Weak<Self> = Arc::downgrade(registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub(crate) fn clear(&self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Call every listener in registration order, outside the registry lock
    pub(crate) fn notify(&self, session: Option<&Session>) {
        let snapshot: Vec<SessionListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(session.cloned());
        }
    }
}

/// In-process identity provider
///
/// Like hosted SDKs, a new subscriber immediately receives the current state.
/// Changes are emitted one at a time: the held session is replaced and every
/// listener notified before the next change starts, so listeners must not
/// sign in or out themselves.
#[derive(Clone, Default)]
pub struct LocalIdentityProvider {
    current: Arc<Mutex<Option<Session>>>,
    registry: Arc<ListenerRegistry>,
    emitting: Arc<Mutex<()>>,
}

impl LocalIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, session: Session) {
        log::debug!("Local identity provider signed in {}", session.uid);
        self.emit(Some(session));
    }

    pub fn sign_out(&self) {
        log::debug!("Local identity provider signed out");
        self.emit(None);
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    fn emit(&self, session: Option<Session>) {
        let _emitting = self.emitting.lock().unwrap_or_else(PoisonError::into_inner);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        self.registry.notify(session.as_ref());
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self, on_change: SessionListener) -> Subscription {
        let _emitting = self.emitting.lock().unwrap_or_else(PoisonError::into_inner);
        let subscription = ListenerRegistry::add(&self.registry, Arc::clone(&on_change));
        on_change(self.current());
        subscription
    }
}
