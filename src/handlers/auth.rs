// Session cookie handlers: exchange an ID token, sign out, read the session
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{error, info, warn};
use serde::Deserialize;

use crate::identity::{IdentityError, IdentityVerifier};
use crate::session::SessionManager;
use crate::settings::BillboardSettings;
use crate::utils::responses::ResponseBuilder;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id_token: Option<String>,
}

/// Exchange a provider ID token for the encrypted session cookie
///
/// # Errors
/// Never fails at the actix level; every failure becomes a JSON error response
pub async fn create_session(
    body: web::Bytes,
    verifier: web::Data<dyn IdentityVerifier>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let id_token = serde_json::from_slice::<SessionRequest>(&body)
        .ok()
        .and_then(|request| request.id_token)
        .filter(|token| !token.trim().is_empty());
    let Some(id_token) = id_token else {
        return Ok(ResponseBuilder::missing_field("idToken"));
    };

    let session = match verifier.verify_id_token(&id_token).await {
        Ok(session) => session,
        Err(IdentityError::Rejected(reason)) => {
            return Ok(ResponseBuilder::unauthorized()
                .with_message("Invalid ID token")
                .with_details(&reason)
                .build());
        }
        Err(e @ IdentityError::NotConfigured(_)) => {
            error!("Cannot verify ID token: {e}");
            return Ok(ResponseBuilder::internal_server_error()
                .with_message("Identity provider is not configured")
                .build());
        }
        Err(e @ IdentityError::Transport(_)) => {
            warn!("Identity provider unreachable: {e}");
            return Ok(ResponseBuilder::bad_gateway()
                .with_details(&e.to_string())
                .build());
        }
    };

    let cookie = match session_manager.create_session_cookie(&session) {
        Ok(cookie) => cookie,
        Err(e) => {
            error!("Failed to create session cookie: {e}");
            return Ok(ResponseBuilder::internal_server_error()
                .with_message("Session creation failed")
                .build());
        }
    };

    info!("Session created for {}", session.uid);
    Ok(HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "success": true,
        "user": session.public_view(),
    })))
}

/// Clear the session cookie and go home
///
/// # Errors
/// Never fails at the actix level
pub async fn sign_out(
    req: HttpRequest,
    session_manager: web::Data<SessionManager>,
    settings: web::Data<BillboardSettings>,
) -> Result<HttpResponse> {
    if let Some(session) = session_manager.get_session_from_request(&req) {
        info!("Signing out {}", session.uid);
    }

    Ok(ResponseBuilder::redirect(&settings.routes.home_path)
        .with_cookie(session_manager.create_expired_cookie())
        .build())
}

/// Public view of the current session
///
/// # Errors
/// Never fails at the actix level; a missing session is a JSON 401
pub async fn userinfo(
    req: HttpRequest,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    Ok(match session_manager.require_session(&req) {
        Ok(session) => HttpResponse::Ok().json(session.public_view()),
        Err(unauthorized) => unauthorized,
    })
}
