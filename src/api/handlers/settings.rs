//! Account settings handlers.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::auth::session::current_user;
use super::auth::types::RecoveryCodeResponse;
use crate::directory::IdentityDirectory;
use crate::token::TokenService;

#[utoipa::path(
    post,
    path = "/api/settings/regenerate-code",
    responses(
        (status = 200, description = "Fresh recovery code; the old one is permanently invalid", body = RecoveryCodeResponse),
        (status = 401, description = "Could not validate credentials", body = String),
        (status = 500, description = "Internal error", body = String),
    ),
    tag = "settings"
)]
#[instrument(skip_all)]
pub async fn regenerate_code(
    headers: HeaderMap,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &directory, &tokens).await {
        Ok(user) => user,
        Err(response) => return response.into_response(),
    };

    match directory.rotate_credential(user.id).await {
        Ok(recovery_code) => Json(RecoveryCodeResponse { recovery_code }).into_response(),
        Err(err) => {
            error!("Failed to rotate credential: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}
