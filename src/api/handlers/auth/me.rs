use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::session::current_user;
use super::types::UserDetailsResponse;
use crate::directory::IdentityDirectory;
use crate::token::TokenService;

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The caller's own identity, contact id included", body = UserDetailsResponse),
        (status = 401, description = "Could not validate credentials", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn me(
    headers: HeaderMap,
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
) -> impl IntoResponse {
    match current_user(&headers, &directory, &tokens).await {
        Ok(user) => (StatusCode::OK, Json(UserDetailsResponse::from(user))).into_response(),
        Err(response) => response.into_response(),
    }
}
