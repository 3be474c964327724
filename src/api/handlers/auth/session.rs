//! Bearer-token extraction and current-user resolution for the protected
//! endpoints.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::directory::{store::UserRecord, IdentityDirectory};
use crate::token::TokenService;

const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// Resolve the caller from the `Authorization: Bearer` header.
///
/// Every failure mode (missing header, invalid or expired token, unknown
/// subject) collapses into the same 401 so callers cannot probe which part
/// rejected them.
pub(crate) async fn current_user(
    headers: &HeaderMap,
    directory: &Arc<IdentityDirectory>,
    tokens: &Arc<TokenService>,
) -> Result<UserRecord, (StatusCode, String)> {
    let unauthorized = || (StatusCode::UNAUTHORIZED, CREDENTIALS_ERROR.to_string());

    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized());
    };

    let Some(subject) = tokens.validate(token) else {
        return Err(unauthorized());
    };

    match directory.find_by_username(&subject).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized()),
        Err(err) => {
            error!("Failed to resolve session user: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extracts_value() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn bearer_token_rejects_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }
}
