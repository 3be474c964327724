use axum::{
    extract::Extension,
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::types::{LoginRequest, Token};
use crate::credentials;
use crate::directory::IdentityDirectory;
use crate::token::TokenService;

// Unknown user and wrong code must stay indistinguishable: same status, same
// body, same headers.
const INVALID_CREDENTIALS: &str = "Incorrect username or recovery code";

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, "Bearer")],
        INVALID_CREDENTIALS.to_string(),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = Token),
        (status = 401, description = "Incorrect username or recovery code", body = String),
        (status = 500, description = "Internal error", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(directory): Extension<Arc<IdentityDirectory>>,
    Extension(tokens): Extension<Arc<TokenService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let user = match directory.find_by_username(&request.username).await {
        Ok(user) => user,
        Err(err) => {
            error!("Login lookup failed: {err}");
            return internal_error();
        }
    };

    let Some(user) = user else {
        // Burn a verification against a throwaway hash so this path costs
        // the same as a wrong code against a real one.
        let _ = credentials::verify_recovery_code(&request.recovery_code, credentials::dummy_hash());
        return invalid_credentials();
    };

    match credentials::verify_recovery_code(&request.recovery_code, &user.credential_hash) {
        Ok(true) => {}
        Ok(false) => return invalid_credentials(),
        Err(err) => {
            // Data-integrity fault, not a user error; say nothing specific.
            error!("Credential verification fault for stored hash: {err}");
            return internal_error();
        }
    }

    match tokens.issue(&user.username) {
        Ok(access_token) => Json(Token {
            access_token,
            token_type: "bearer".to_string(),
        })
        .into_response(),
        Err(err) => {
            error!("Failed to issue session token: {err}");
            internal_error()
        }
    }
}
