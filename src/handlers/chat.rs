//! Chat-start helper
//!
//! A chat between two users has a deterministic id, so starting it again is
//! a merge onto the same document.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::Utc;
use log::{error, info};
use serde::Deserialize;

use crate::session::SessionManager;
use crate::settings::BillboardSettings;
use crate::store::{DocumentStore, FieldValue, Fields};
use crate::utils::responses::ResponseBuilder;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    pub recipient_id: Option<String>,
    pub listing_id: Option<String>,
}

/// Chat id shared by both participants, independent of who starts it
#[must_use]
pub fn chat_id(first: &str, second: &str) -> String {
    let mut participants = [first, second];
    participants.sort_unstable();
    participants.join("_")
}

/// `POST /api/chats`
///
/// # Errors
/// Never fails at the actix level; failures are JSON error responses
pub async fn start_chat(
    req: HttpRequest,
    body: web::Bytes,
    session_manager: web::Data<SessionManager>,
    store: web::Data<dyn DocumentStore>,
    settings: web::Data<BillboardSettings>,
) -> Result<HttpResponse> {
    let session = match session_manager.require_session(&req) {
        Ok(session) => session,
        Err(unauthorized) => return Ok(unauthorized),
    };

    let request: StartChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Ok(ResponseBuilder::bad_request()
                .with_message("Invalid request body")
                .with_details(&e.to_string())
                .build());
        }
    };
    let Some(recipient) = request.recipient_id.filter(|r| !r.trim().is_empty()) else {
        return Ok(ResponseBuilder::missing_field("recipientId"));
    };
    if recipient == session.uid {
        return Ok(ResponseBuilder::bad_request()
            .with_message("Cannot start a chat with yourself")
            .build());
    }

    let id = chat_id(&session.uid, &recipient);
    let mut participants = vec![session.uid.clone(), recipient];
    participants.sort_unstable();

    let mut fields = Fields::new();
    fields.insert("participants".into(), participants.into());
    fields.insert("updatedAt".into(), Utc::now().into());
    if let Some(listing_id) = request.listing_id.filter(|l| !l.is_empty()) {
        fields.insert("listingId".into(), FieldValue::String(listing_id));
    }

    let collection = &settings.store.chat_collection;
    if let Err(e) = store.set_document(collection, &id, fields, true).await {
        error!("Failed to start chat {id}: {e}");
        return Ok(ResponseBuilder::internal_server_error()
            .with_message("Failed to start chat")
            .with_details(&e.to_string())
            .build());
    }

    info!("Chat {id} started by {}", session.uid);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "chatId": id,
    })))
}
