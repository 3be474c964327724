//! Store-and-forward message relay. Content is opaque ciphertext produced by
//! clients; the server stores and returns it untouched.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::auth::session::current_user;
use super::auth::types::{MessageCreateRequest, MessageResponse};
use crate::directory::store::MessageStore;
use crate::directory::IdentityDirectory;
use crate::token::TokenService;

fn internal_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = MessageCreateRequest,
    responses(
        (status = 201, description = "Message stored for the recipient", body = MessageResponse),
        (status = 401, description = "Could not validate credentials", body = String),
        (status = 404, description = "Recipient not found", body = String),
    ),
    tag = "messages"
)]
#[instrument(skip_all)]
pub async fn send_message(
    headers: HeaderMap,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(messages): Extension<Arc<dyn MessageStore>>,
    Extension(tokens): Extension<Arc<TokenService>>,
    payload: Option<Json<MessageCreateRequest>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &directory, &tokens).await {
        Ok(user) => user,
        Err(response) => return response.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let recipient = match directory
        .find_by_username(request.recipient_username.trim())
        .await
    {
        Ok(Some(recipient)) => recipient,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Recipient not found".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to resolve recipient: {err}");
            return internal_error().into_response();
        }
    };

    match messages
        .insert_message(user.id, recipient.id, &request.encrypted_content)
        .await
    {
        Ok(message) => {
            (StatusCode::CREATED, Json(MessageResponse::from(message))).into_response()
        }
        Err(err) => {
            error!("Failed to store message: {err}");
            internal_error().into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/messages/conversation/{peer_username}",
    params(
        ("peer_username" = String, Path, description = "Username of the conversation peer")
    ),
    responses(
        (status = 200, description = "Messages in both directions, oldest first", body = [MessageResponse]),
        (status = 401, description = "Could not validate credentials", body = String),
        (status = 404, description = "Conversation peer not found", body = String),
    ),
    tag = "messages"
)]
#[instrument(skip_all)]
pub async fn conversation(
    headers: HeaderMap,
    Path(peer_username): Path<String>,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(messages): Extension<Arc<dyn MessageStore>>,
    Extension(tokens): Extension<Arc<TokenService>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &directory, &tokens).await {
        Ok(user) => user,
        Err(response) => return response.into_response(),
    };

    let peer = match directory.find_by_username(&peer_username).await {
        Ok(Some(peer)) => peer,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                "Conversation peer not found".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to resolve conversation peer: {err}");
            return internal_error().into_response();
        }
    };

    match messages.list_conversation(user.id, peer.id).await {
        Ok(history) => Json(
            history
                .into_iter()
                .map(MessageResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => {
            error!("Failed to list conversation: {err}");
            internal_error().into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/messages/users/{username}/key",
    params(
        ("username" = String, Path, description = "Username whose public key to fetch")
    ),
    responses(
        (status = 200, description = "The user's public key blob", body = String),
        (status = 401, description = "Could not validate credentials", body = String),
        (status = 404, description = "User not found", body = String),
    ),
    tag = "messages"
)]
#[instrument(skip_all)]
pub async fn user_public_key(
    headers: HeaderMap,
    Path(username): Path<String>,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
) -> impl IntoResponse {
    if let Err(response) = current_user(&headers, &directory, &tokens).await {
        return response.into_response();
    }

    match directory.find_by_username(&username).await {
        Ok(Some(user)) => Json(user.public_key).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
        Err(err) => {
            error!("Failed to look up public key: {err}");
            internal_error().into_response()
        }
    }
}
