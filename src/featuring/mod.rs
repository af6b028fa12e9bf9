//! Marking listings and jobs as featured
//!
//! A feature request is validated, paid for, matched against the candidate
//! collections of its content kind, and finally applied as a partial update
//! on the first document found.

pub mod payment;

use std::sync::Arc;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::feature::UnknownPlan;
use crate::models::{ContentKind, FeaturePlan, FeatureRequest, FeatureWindow};
use crate::settings::BillboardSettings;
use crate::store::{DocumentStore, Fields, StoreError};
use crate::utils::responses::ResponseBuilder;

pub use payment::{PaymentCheck, PaymentVerifier, StorePaymentVerifier, UnverifiedPayments};

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },
    #[error("{} not found", .0.label())]
    NotFound(ContentKind),
    #[error("payment not verified: {0}")]
    PaymentNotVerified(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FeatureError {
    fn validation(message: &str, details: Option<String>) -> Self {
        Self::Validation {
            message: message.to_string(),
            details,
        }
    }
}

impl From<UnknownPlan> for FeatureError {
    fn from(err: UnknownPlan) -> Self {
        Self::validation("Invalid planId", Some(err.to_string()))
    }
}

impl ResponseError for FeatureError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentNotVerified(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let builder = match self {
            Self::Validation { message, details } => {
                let builder = ResponseBuilder::bad_request().with_message(message);
                match details {
                    Some(details) => builder.with_details(details),
                    None => builder,
                }
            }
            Self::NotFound(_) => ResponseBuilder::not_found().with_message(&self.to_string()),
            Self::PaymentNotVerified(reason) => ResponseBuilder::payment_required()
                .with_message("Payment not verified")
                .with_details(reason),
            Self::Store(err) => ResponseBuilder::internal_server_error()
                .with_message("Failed to feature content")
                .with_details(&err.to_string()),
        };
        builder.build()
    }
}

/// Raw JSON body of `POST /api/feature-listing`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequestBody {
    pub content_id: Option<String>,
    pub content_type: Option<String>,
    pub plan_id: Option<String>,
    pub payment_id: Option<String>,
}

impl FeatureRequestBody {
    /// Parse and validate a request body
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed JSON, missing or empty fields, and
    /// unknown plans
    pub fn parse(body: &[u8]) -> Result<FeatureRequest, FeatureError> {
        let raw: Self = serde_json::from_slice(body).map_err(|e| {
            FeatureError::validation("Invalid request body", Some(e.to_string()))
        })?;
        raw.validate()
    }

    /// # Errors
    ///
    /// Returns `Validation` naming every missing field, or for an unknown plan
    pub fn validate(self) -> Result<FeatureRequest, FeatureError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let content_id = present(&self.content_id);
        let content_type = present(&self.content_type);
        let plan_id = present(&self.plan_id);

        let missing: Vec<&str> = [
            ("contentId", content_id.is_none()),
            ("contentType", content_type.is_none()),
            ("planId", plan_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();

        let (Some(content_id), Some(content_type), Some(plan_id)) =
            (content_id, content_type, plan_id)
        else {
            return Err(FeatureError::validation(
                &format!("Missing required fields: {}", missing.join(", ")),
                None,
            ));
        };

        Ok(FeatureRequest {
            content_id,
            kind: ContentKind::from_content_type(&content_type),
            plan: plan_id.parse::<FeaturePlan>()?,
            payment_id: present(&self.payment_id),
        })
    }
}

/// Body of a successful feature response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResponse {
    pub success: bool,
    pub message: String,
    pub collection: String,
    pub end_date: String,
}

/// Applies feature requests against the document store
pub struct FeatureService {
    store: Arc<dyn DocumentStore>,
    payments: Arc<dyn PaymentVerifier>,
    job_collections: Vec<String>,
    listing_collections: Vec<String>,
}

impl FeatureService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, payments: Arc<dyn PaymentVerifier>) -> Self {
        Self {
            store,
            payments,
            job_collections: vec!["jobs".to_string()],
            listing_collections: vec!["listings".to_string(), "billboards".to_string()],
        }
    }

    /// Override the candidate collections searched for each content kind
    #[must_use]
    pub fn with_collections(mut self, jobs: Vec<String>, listings: Vec<String>) -> Self {
        self.job_collections = jobs;
        self.listing_collections = listings;
        self
    }

    /// Wire the service from settings, picking the payment verifier
    #[must_use]
    pub fn from_settings(settings: &BillboardSettings, store: Arc<dyn DocumentStore>) -> Self {
        let payments: Arc<dyn PaymentVerifier> = if settings.payments.verify_payments {
            Arc::new(StorePaymentVerifier::new(
                Arc::clone(&store),
                &settings.payments.collection,
            ))
        } else {
            warn!("Payment verification is disabled; feature requests are trusted as paid");
            Arc::new(UnverifiedPayments)
        };

        Self::new(store, payments).with_collections(
            settings.store.job_collections.clone(),
            settings.store.listing_collections.clone(),
        )
    }

    /// Candidate collections for `kind`, in lookup order
    #[must_use]
    pub fn collections_for(&self, kind: ContentKind) -> &[String] {
        match kind {
            ContentKind::Job => &self.job_collections,
            ContentKind::Listing => &self.listing_collections,
        }
    }

    /// First candidate collection holding `content_id`
    ///
    /// # Errors
    ///
    /// Returns `Store` if a lookup fails
    pub async fn locate(
        &self,
        kind: ContentKind,
        content_id: &str,
    ) -> Result<Option<String>, FeatureError> {
        for collection in self.collections_for(kind) {
            if self
                .store
                .get_document(collection, content_id)
                .await?
                .is_some()
            {
                return Ok(Some(collection.clone()));
            }
        }
        Ok(None)
    }

    /// Verify payment, find the document, claim the payment and mark the
    /// document featured from `now`
    ///
    /// A failed feature write hands the payment back.
    ///
    /// # Errors
    ///
    /// `PaymentNotVerified`, `NotFound` (nothing written) or `Store`
    pub async fn feature(
        &self,
        request: &FeatureRequest,
        now: DateTime<Utc>,
    ) -> Result<FeatureResponse, FeatureError> {
        let payment = self.payments.verify(request).await?;

        let collection = self
            .locate(request.kind, &request.content_id)
            .await?
            .ok_or(FeatureError::NotFound(request.kind))?;

        self.payments
            .consume(
                &payment,
                &format!("{collection}/{}", request.content_id),
                now,
            )
            .await?;

        let window = FeatureWindow::starting_at(now, request.plan);
        let mut fields = Fields::new();
        fields.insert("featured".into(), true.into());
        fields.insert("featuredAt".into(), window.featured_at.into());
        fields.insert("featuredUntil".into(), window.featured_until.into());
        fields.insert("featuredPlan".into(), request.plan.as_str().into());
        fields.insert("paymentStatus".into(), "completed".into());
        if let PaymentCheck::Verified { payment_id } = &payment {
            fields.insert("paymentId".into(), payment_id.clone().into());
        }

        if let Err(e) = self
            .store
            .update_document(&collection, &request.content_id, fields)
            .await
        {
            self.payments.release(&payment).await;
            return Err(match e {
                // Deleted between lookup and update
                StoreError::NotFound { .. } => FeatureError::NotFound(request.kind),
                e => e.into(),
            });
        }

        info!(
            "Featured {collection}/{} on plan {} until {}",
            request.content_id, request.plan, window.featured_until
        );

        Ok(FeatureResponse {
            success: true,
            message: format!("{} featured successfully", request.kind.label()),
            collection,
            end_date: window
                .featured_until
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}
