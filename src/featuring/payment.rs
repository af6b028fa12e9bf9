//! Payment checks run before a listing is marked as featured

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};

use super::FeatureError;
use crate::models::FeatureRequest;
use crate::store::{DocumentStore, FieldValue, Fields};

/// Result of a successful payment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCheck {
    /// A completed payment record covers the request
    Verified { payment_id: String },
    /// Verification is switched off
    Unverified,
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// # Errors
    ///
    /// `PaymentNotVerified` when the request is not paid for, `Store` when
    /// the payment record cannot be read
    async fn verify(&self, request: &FeatureRequest) -> Result<PaymentCheck, FeatureError>;

    /// Claim a verified payment for `consumed_by` so it cannot be spent again
    ///
    /// # Errors
    ///
    /// `Store` when the claim cannot be written
    async fn consume(
        &self,
        _check: &PaymentCheck,
        _consumed_by: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), FeatureError> {
        Ok(())
    }

    /// Give a claimed payment back after the feature write failed
    async fn release(&self, _check: &PaymentCheck) {}
}

/// Looks the payment up in the document store
///
/// The record at `{collection}/{paymentId}` must have `status == "completed"`,
/// the same `contentId`, the same `planId` when it records one, and no
/// `consumedBy`. A successful feature claims the record with `consumedBy` and
/// `consumedAt`.
pub struct StorePaymentVerifier {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl StorePaymentVerifier {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl PaymentVerifier for StorePaymentVerifier {
    async fn verify(&self, request: &FeatureRequest) -> Result<PaymentCheck, FeatureError> {
        let payment_id = request
            .payment_id
            .as_deref()
            .ok_or_else(|| FeatureError::PaymentNotVerified("paymentId is required".into()))?;

        let payment = self
            .store
            .get_document(&self.collection, payment_id)
            .await?
            .ok_or_else(|| {
                FeatureError::PaymentNotVerified(format!("payment {payment_id} does not exist"))
            })?;

        match payment.get_str("status") {
            Some("completed") => {}
            status => {
                return Err(FeatureError::PaymentNotVerified(format!(
                    "payment {payment_id} is {}",
                    status.unwrap_or("missing a status")
                )));
            }
        }

        if let Some(consumed_by) = payment
            .get("consumedBy")
            .filter(|value| **value != FieldValue::Null)
        {
            return Err(FeatureError::PaymentNotVerified(format!(
                "payment {payment_id} was already used for {}",
                consumed_by.as_str().unwrap_or("another request")
            )));
        }

        if payment.get_str("contentId") != Some(request.content_id.as_str()) {
            return Err(FeatureError::PaymentNotVerified(format!(
                "payment {payment_id} does not cover content {}",
                request.content_id
            )));
        }

        if let Some(plan) = payment.get_str("planId") {
            if plan != request.plan.as_str() {
                return Err(FeatureError::PaymentNotVerified(format!(
                    "payment {payment_id} was made for plan {plan}"
                )));
            }
        }

        debug!("Payment {payment_id} verified for {}", request.content_id);
        Ok(PaymentCheck::Verified {
            payment_id: payment_id.to_string(),
        })
    }

    async fn consume(
        &self,
        check: &PaymentCheck,
        consumed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FeatureError> {
        let PaymentCheck::Verified { payment_id } = check else {
            return Ok(());
        };
        let mut fields = Fields::new();
        fields.insert("consumedBy".into(), consumed_by.into());
        fields.insert("consumedAt".into(), now.into());
        self.store
            .update_document(&self.collection, payment_id, fields)
            .await?;
        debug!("Payment {payment_id} consumed by {consumed_by}");
        Ok(())
    }

    async fn release(&self, check: &PaymentCheck) {
        let PaymentCheck::Verified { payment_id } = check else {
            return;
        };
        let mut fields = Fields::new();
        fields.insert("consumedBy".into(), FieldValue::Null);
        fields.insert("consumedAt".into(), FieldValue::Null);
        if let Err(e) = self
            .store
            .update_document(&self.collection, payment_id, fields)
            .await
        {
            error!("Payment {payment_id} stays claimed after a failed feature write: {e}");
        }
    }
}

/// Accepts every request without looking for a payment
///
/// Only for deployments where payments are confirmed elsewhere.
#[derive(Debug, Default)]
pub struct UnverifiedPayments;

#[async_trait]
impl PaymentVerifier for UnverifiedPayments {
    async fn verify(&self, request: &FeatureRequest) -> Result<PaymentCheck, FeatureError> {
        warn!(
            "Featuring {} without payment verification (payments.verify_payments = false)",
            request.content_id
        );
        Ok(PaymentCheck::Unverified)
    }
}
