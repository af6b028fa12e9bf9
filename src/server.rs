//! Route table and shared application data

use std::sync::Arc;

use actix_web::web;

use crate::featuring::FeatureService;
use crate::guard::RouteRules;
use crate::handlers::{
    create_session, feature_listing, gate, health, sign_out, start_chat, userinfo,
};
use crate::identity::{IdentityToolkitVerifier, IdentityVerifier};
use crate::session::SessionManager;
use crate::settings::BillboardSettings;
use crate::store::{store_from_settings, DocumentStore};

/// Everything the handlers extract as `web::Data`
#[derive(Clone)]
pub struct AppServices {
    pub settings: web::Data<BillboardSettings>,
    pub session_manager: web::Data<SessionManager>,
    pub rules: web::Data<RouteRules>,
    pub store: web::Data<dyn DocumentStore>,
    pub verifier: web::Data<dyn IdentityVerifier>,
    pub feature_service: web::Data<FeatureService>,
}

impl AppServices {
    /// Wire the configured store and identity backends
    #[must_use]
    pub fn from_settings(settings: BillboardSettings) -> Self {
        let store = store_from_settings(&settings);
        let verifier: Arc<dyn IdentityVerifier> =
            Arc::new(IdentityToolkitVerifier::from_settings(&settings));
        Self::new(settings, store, verifier)
    }

    #[must_use]
    pub fn new(
        settings: BillboardSettings,
        store: Arc<dyn DocumentStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let feature_service = FeatureService::from_settings(&settings, Arc::clone(&store));
        Self {
            session_manager: web::Data::new(SessionManager::from_settings(&settings)),
            rules: web::Data::new(settings.route_rules()),
            store: web::Data::from(store),
            verifier: web::Data::from(verifier),
            feature_service: web::Data::new(feature_service),
            settings: web::Data::new(settings),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.settings.clone())
            .app_data(self.session_manager.clone())
            .app_data(self.rules.clone())
            .app_data(self.store.clone())
            .app_data(self.verifier.clone())
            .app_data(self.feature_service.clone())
            // API
            .route("/api/feature-listing", web::post().to(feature_listing))
            .route("/api/chats", web::post().to(start_chat))
            // Session cookie endpoints
            .route("/auth/session", web::post().to(create_session))
            .route("/auth/sign_out", web::get().to(sign_out))
            .route("/auth/sign_out", web::post().to(sign_out))
            .route("/auth/userinfo", web::get().to(userinfo))
            // Health endpoint
            .route("/ping", web::get().to(health))
            // Everything else is a page navigation
            .default_service(web::to(gate));
    }
}
