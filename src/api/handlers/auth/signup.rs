use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, instrument};

use super::types::{SignupRequest, SignupResponse};
use super::valid_username;
use crate::directory::{DirectoryError, IdentityDirectory};

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created; the recovery code is returned exactly once", body = SignupResponse),
        (status = 400, description = "Missing payload, invalid username, or username already registered", body = String),
        (status = 500, description = "Internal error", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let username = request.username.trim();
    if !valid_username(username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }

    if request.public_key.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing public key".to_string()).into_response();
    }

    match directory.create_user(username, &request.public_key).await {
        Ok((user, recovery_code)) => (
            StatusCode::CREATED,
            Json(SignupResponse {
                id: user.id.to_string(),
                username: user.username,
                public_key: user.public_key,
                recovery_code,
            }),
        )
            .into_response(),
        Err(DirectoryError::DuplicateUsername) => (
            StatusCode::BAD_REQUEST,
            "Username already registered".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Signup failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}
