use crate::api;
use crate::cli::actions::Action;
use crate::token::TokenService;
use anyhow::{Context, Result};
use std::sync::Arc;
use url::Url;

/// Handle the server action
/// # Errors
/// Returns an error if the signing keys cannot be loaded, the DSN is
/// malformed, or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, dsn, tokens } => {
            // Missing or malformed key material aborts startup, no degraded mode.
            let tokens = Arc::new(TokenService::from_pem_files(&tokens)?);

            let dsn = Url::parse(&dsn).context("Invalid database DSN")?;

            api::new(port, dsn.to_string(), tokens).await
        }
    }
}
