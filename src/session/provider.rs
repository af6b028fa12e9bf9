//! Auth session provider
//!
//! Holds client-lifetime knowledge of the current session. A provider is
//! mounted against an [`IdentityProvider`], hands out [`SessionContext`]
//! accessors to consumers, and is torn down explicitly (or on drop). After
//! teardown the identity subscription is cancelled, late events are ignored
//! and every accessor fails with [`SessionError::OutsideProvider`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, info};

use crate::identity::{IdentityProvider, ListenerRegistry, SessionListener, Subscription};
use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session context accessed outside of a mounted session provider")]
    OutsideProvider,
}

struct SharedState {
    current: RwLock<Option<Session>>,
    resolved: AtomicBool,
    mounted: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    /// Held across replace + notify so changes are delivered one at a time
    applying: Mutex<()>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
            resolved: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            listeners: Arc::new(ListenerRegistry::default()),
            applying: Mutex::new(()),
        }
    }

    fn apply(&self, session: Option<Session>) {
        let _applying = self.applying.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.mounted.load(Ordering::SeqCst) {
            debug!("Ignoring session change delivered after teardown");
            return;
        }

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session.clone();
        self.resolved.store(true, Ordering::SeqCst);
        self.listeners.notify(session.as_ref());
    }

    fn ensure_mounted(&self) -> Result<(), SessionError> {
        if self.mounted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::OutsideProvider)
        }
    }
}

/// Owner of the identity subscription
pub struct SessionProvider {
    state: Arc<SharedState>,
    subscription: Option<Subscription>,
}

impl SessionProvider {
    /// Subscribe to `identity` and start tracking the session
    pub fn mount(identity: &dyn IdentityProvider) -> Self {
        let state = Arc::new(SharedState::new());
        let weak = Arc::downgrade(&state);

        let on_change: SessionListener = Arc::new(move |session: Option<Session>| {
            if let Some(state) = weak.upgrade() {
                state.apply(session);
            }
        });
        let subscription = identity.subscribe(on_change);
        info!("Session provider mounted");

        Self {
            state,
            subscription: Some(subscription),
        }
    }

    /// Accessor for consumers such as the route guard
    #[must_use]
    pub fn context(&self) -> SessionContext {
        SessionContext {
            state: Arc::clone(&self.state),
        }
    }

    /// Cancel the identity subscription and invalidate every context
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            // Flip the flag first so events racing with the cancel are dropped
            self.state.mounted.store(false, Ordering::SeqCst);
            subscription.cancel();
            self.state.listeners.clear();
            *self
                .state
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner) = None;
            info!("Session provider torn down");
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read accessor handed down to session consumers
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<SharedState>,
}

impl SessionContext {
    /// The current session, `None` when signed out or not yet resolved
    ///
    /// # Errors
    ///
    /// Returns `OutsideProvider` once the owning provider was torn down
    pub fn current(&self) -> Result<Option<Session>, SessionError> {
        self.state.ensure_mounted()?;
        Ok(self
            .state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    /// Whether the identity provider has delivered its first state
    ///
    /// # Errors
    ///
    /// Returns `OutsideProvider` once the owning provider was torn down
    pub fn is_resolved(&self) -> Result<bool, SessionError> {
        self.state.ensure_mounted()?;
        Ok(self.state.resolved.load(Ordering::SeqCst))
    }

    /// Receive every subsequent session change, synchronously
    ///
    /// # Errors
    ///
    /// Returns `OutsideProvider` once the owning provider was torn down
    pub fn subscribe(&self, listener: SessionListener) -> Result<Subscription, SessionError> {
        self.state.ensure_mounted()?;
        Ok(ListenerRegistry::add(&self.state.listeners, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalIdentityProvider;

    #[test]
    fn test_mount_resolves_from_initial_event() {
        let identity = LocalIdentityProvider::new();
        identity.sign_in(Session::new("owner-1", 1));

        let provider = SessionProvider::mount(&identity);
        let context = provider.context();

        assert!(context.is_resolved().unwrap());
        assert_eq!(context.current().unwrap().unwrap().uid, "owner-1");
    }

    #[test]
    fn test_changes_replace_session_and_notify_in_order() {
        let identity = LocalIdentityProvider::new();
        let provider = SessionProvider::mount(&identity);
        let context = provider.context();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        let _a = context
            .subscribe(Arc::new(move |s: Option<Session>| {
                first.lock().unwrap().push(format!("a:{}", s.map_or("-".into(), |s| s.uid)));
            }))
            .unwrap();
        let _b = context
            .subscribe(Arc::new(move |s: Option<Session>| {
                second.lock().unwrap().push(format!("b:{}", s.map_or("-".into(), |s| s.uid)));
            }))
            .unwrap();

        identity.sign_in(Session::new("owner-2", 1));
        assert_eq!(context.current().unwrap().unwrap().uid, "owner-2");

        identity.sign_out();
        assert_eq!(context.current().unwrap(), None);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["a:owner-2", "b:owner-2", "a:-", "b:-"]
        );
    }

    #[test]
    fn test_teardown_cancels_subscription_and_invalidates_context() {
        let identity = LocalIdentityProvider::new();
        let provider = SessionProvider::mount(&identity);
        let context = provider.context();

        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        let _listener = context
            .subscribe(Arc::new(move |_: Option<Session>| {
                *counter.lock().unwrap() += 1;
            }))
            .unwrap();

        assert_eq!(identity.subscriber_count(), 1);
        provider.teardown();
        assert_eq!(identity.subscriber_count(), 0);

        identity.sign_in(Session::new("late", 1));
        assert_eq!(*notified.lock().unwrap(), 0);
        assert_eq!(context.current(), Err(SessionError::OutsideProvider));
        assert!(context.subscribe(Arc::new(|_: Option<Session>| {})).is_err());
    }

    #[test]
    fn test_concurrent_changes_leave_provider_in_sync() {
        let identity = LocalIdentityProvider::new();
        let provider = SessionProvider::mount(&identity);
        let context = provider.context();

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let identity = identity.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        if (round + worker) % 2 == 0 {
                            identity.sign_in(Session::new(&format!("user-{worker}"), 1));
                        } else {
                            identity.sign_out();
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(
            context.current().unwrap().map(|s| s.uid),
            identity.current().map(|s| s.uid)
        );
    }

    #[test]
    fn test_drop_behaves_like_teardown() {
        let identity = LocalIdentityProvider::new();
        let context = {
            let provider = SessionProvider::mount(&identity);
            provider.context()
        };

        assert_eq!(identity.subscriber_count(), 0);
        assert_eq!(context.is_resolved(), Err(SessionError::OutsideProvider));
    }
}
