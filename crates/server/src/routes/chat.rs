//! Chat introduction route handlers.
//!
//! All endpoints require authentication. Being the wrong party to a chat is
//! not an error: the response is 200 with `status: false`.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use chatlink_core::{ChatId, UserId};

use crate::error::{Result, StatusBody};
use crate::middleware::RequireAuth;
use crate::routes::extract::ApiJson;
use crate::services::chat::ApprovalStatus;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// Recipient phone.
    pub phone_hasta: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub id_chat: ChatId,
}

#[derive(Debug, Serialize)]
pub struct CreateChatResponse {
    pub status: bool,
    pub detail: String,
    pub id_conversacion: ChatId,
    pub id_destinatario: UserId,
    pub nombre_destinatario: String,
}

/// Ask another user to chat.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth { user, .. }: RequireAuth,
    ApiJson(body): ApiJson<CreateChatRequest>,
) -> Result<Json<CreateChatResponse>> {
    let created = state.chats().create_chat(&user, &body.phone_hasta).await?;

    Ok(Json(CreateChatResponse {
        status: true,
        detail: "Chat requested".to_string(),
        id_conversacion: created.chat.id,
        id_destinatario: created.recipient.id,
        nombre_destinatario: created.recipient.display_name().to_owned(),
    }))
}

/// Whether the caller is the recipient of the chat.
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth { user, .. }: RequireAuth,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<StatusBody> {
    let body = if state.chats().validate_chat(&user, body.id_chat).await? {
        StatusBody::ok("You are the recipient of this chat")
    } else {
        StatusBody::fail("You are not the recipient of this chat")
    };
    Ok(body)
}

/// Accept the chat as its recipient.
pub async fn authorize(
    State(state): State<AppState>,
    RequireAuth { user, .. }: RequireAuth,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<StatusBody> {
    let body = if state.chats().authorize_chat(&user, body.id_chat).await? {
        StatusBody::ok("Chat accepted")
    } else {
        StatusBody::fail("Only the recipient can accept this chat")
    };
    Ok(body)
}

/// Whether the recipient accepted, asked by the initiator.
pub async fn approval(
    State(state): State<AppState>,
    RequireAuth { user, .. }: RequireAuth,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<StatusBody> {
    let body = match state.chats().check_approval(&user, body.id_chat).await? {
        ApprovalStatus::Approved => StatusBody::ok("The chat was accepted"),
        ApprovalStatus::Pending => StatusBody::fail("The chat has not been accepted yet"),
        ApprovalStatus::NotInitiator => StatusBody::fail("You did not start this chat"),
    };
    Ok(body)
}
