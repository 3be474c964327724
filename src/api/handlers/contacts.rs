//! Contact-list handlers. Contacts are discovered by opaque contact id, never
//! by username, and the relation is directed.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::auth::session::current_user;
use super::auth::types::{ContactAddRequest, UserResponse};
use crate::directory::{DirectoryError, IdentityDirectory};
use crate::token::TokenService;

#[utoipa::path(
    get,
    path = "/api/contacts",
    responses(
        (status = 200, description = "The caller's contact list", body = [UserResponse]),
        (status = 401, description = "Could not validate credentials", body = String),
    ),
    tag = "contacts"
)]
#[instrument(skip_all)]
pub async fn list_contacts(
    headers: HeaderMap,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &directory, &tokens).await {
        Ok(user) => user,
        Err(response) => return response.into_response(),
    };

    match directory.list_contacts(user.id).await {
        Ok(contacts) => Json(
            contacts
                .into_iter()
                .map(UserResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => {
            error!("Failed to list contacts: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/contacts/add",
    request_body = ContactAddRequest,
    responses(
        (status = 200, description = "Contact added (idempotent)", body = UserResponse),
        (status = 400, description = "Missing payload or self-add", body = String),
        (status = 401, description = "Could not validate credentials", body = String),
        (status = 404, description = "No user with the provided contact id", body = String),
    ),
    tag = "contacts"
)]
#[instrument(skip_all)]
pub async fn add_contact(
    headers: HeaderMap,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
    payload: Option<Json<ContactAddRequest>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &directory, &tokens).await {
        Ok(user) => user,
        Err(response) => return response.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let contact_id = request.contact_id.trim();

    // Self-add policy lives here and only here; the directory below is
    // deliberately permissive.
    if contact_id == user.contact_id {
        return (
            StatusCode::BAD_REQUEST,
            "You cannot add yourself as a contact".to_string(),
        )
            .into_response();
    }

    match directory.add_contact(user.id, contact_id).await {
        Ok(target) => Json(UserResponse::from(target)).into_response(),
        Err(DirectoryError::ContactNotFound) => (
            StatusCode::NOT_FOUND,
            "User with the provided contact ID not found".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to add contact: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}
