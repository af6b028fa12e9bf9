use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::error;

use crate::featuring::{FeatureError, FeatureRequestBody, FeatureService};

/// `POST /api/feature-listing`
///
/// # Errors
/// Returns a [`FeatureError`], rendered as `{error, details?}` with the
/// matching status
pub async fn feature_listing(
    body: web::Bytes,
    service: web::Data<FeatureService>,
) -> Result<HttpResponse, FeatureError> {
    let request = FeatureRequestBody::parse(&body)?;

    let response = service
        .feature(&request, Utc::now())
        .await
        .inspect_err(|e| {
            if let FeatureError::Store(store_error) = e {
                error!("Failed to feature {}: {store_error}", request.content_id);
            }
        })?;

    Ok(HttpResponse::Ok().json(response))
}
