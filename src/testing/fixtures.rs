//! Pre-built test data

use std::sync::Arc;

use actix_web::cookie::Cookie;

use super::constants::{TEST_EMAIL, TEST_SECRET, TEST_UID, UNREACHABLE_UPSTREAM};
use super::mock::StaticIdentityVerifier;
use crate::models::Session;
use crate::server::AppServices;
use crate::session::SessionManager;
use crate::settings::{BillboardSettings, StoreBackend};
use crate::store::{Fields, MemoryDocumentStore};

pub struct TestFixtures;

impl TestFixtures {
    /// Settings with the memory store and a fixed session secret
    #[must_use]
    pub fn settings() -> BillboardSettings {
        let mut settings = BillboardSettings::default();
        settings.session.session_secret = TEST_SECRET.to_string();
        settings.cookies.secure = false;
        settings.store.backend = StoreBackend::Memory;
        settings.proxy.upstream_url = UNREACHABLE_UPSTREAM.to_string();
        settings
    }

    /// Same as [`Self::settings`] with payment verification switched off
    #[must_use]
    pub fn unverified_payment_settings() -> BillboardSettings {
        let mut settings = Self::settings();
        settings.payments.verify_payments = false;
        settings
    }

    #[must_use]
    pub fn session() -> Session {
        Session::new(TEST_UID, 24)
            .with_claim("email", TEST_EMAIL)
            .with_claim("name", "Billboard Owner")
    }

    #[must_use]
    pub fn session_for(uid: &str) -> Session {
        Session::new(uid, 24)
    }

    #[must_use]
    pub fn session_manager() -> SessionManager {
        SessionManager::from_settings(&Self::settings())
    }

    /// Encrypted cookie for `session`, as the fixture session manager mints it
    ///
    /// # Panics
    ///
    /// Panics if the cookie cannot be encrypted
    #[must_use]
    pub fn session_cookie(session: &Session) -> Cookie<'static> {
        Self::session_manager()
            .create_session_cookie(session)
            .unwrap()
    }

    /// Memory store holding one titled document per `(collection, id)`
    #[must_use]
    pub fn seeded_store(documents: &[(&str, &str)]) -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        for (collection, id) in documents {
            let mut fields = Fields::new();
            fields.insert("title".into(), format!("{collection} {id}").into());
            store.insert(collection, id, fields);
        }
        store
    }

    /// Record a completed payment for `content_id`
    pub fn add_payment(store: &MemoryDocumentStore, payment_id: &str, content_id: &str, plan: &str) {
        let mut fields = Fields::new();
        fields.insert("status".into(), "completed".into());
        fields.insert("contentId".into(), content_id.into());
        fields.insert("planId".into(), plan.into());
        store.insert("payments", payment_id, fields);
    }

    /// Application services over `store` with the scripted identity verifier
    #[must_use]
    pub fn services(settings: BillboardSettings, store: Arc<MemoryDocumentStore>) -> AppServices {
        AppServices::new(
            settings,
            store,
            Arc::new(StaticIdentityVerifier::new().with_token("valid-token", Self::session())),
        )
    }
}
