//! Session token issuance and validation.
//!
//! Tokens are stateless bearer JWTs bound to a username and signed with an
//! RSA keypair, so verification only ever needs the public half (a separate
//! verification service stays possible). There is no revocation list; a
//! leaked token stays valid until its expiry.
//!
//! Key material comes from PEM files named in the process configuration and
//! is loaded exactly once at startup. A missing or malformed key file aborts
//! startup; rotation means a restart.

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Token configuration, built once by the CLI and injected here.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub algorithm: String,
    pub ttl_seconds: i64,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

impl TokenConfig {
    pub const DEFAULT_TTL_SECONDS: i64 = 30 * 60;
}

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token asserts.
    pub sub: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

pub struct TokenService {
    algorithm: Algorithm,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Load the keypair from the configured PEM files.
    ///
    /// # Errors
    /// Returns an error if either file is missing or not a valid RSA PEM;
    /// callers treat this as fatal.
    pub fn from_pem_files(config: &TokenConfig) -> Result<Self> {
        let private_pem = SecretString::from(
            fs::read_to_string(&config.private_key_path).with_context(|| {
                format!(
                    "Failed to read private key {}",
                    config.private_key_path.display()
                )
            })?,
        );
        let public_pem = fs::read_to_string(&config.public_key_path).with_context(|| {
            format!(
                "Failed to read public key {}",
                config.public_key_path.display()
            )
        })?;

        Self::from_pems(
            &config.algorithm,
            config.ttl_seconds,
            &private_pem,
            &public_pem,
        )
    }

    /// Build a service from in-memory PEMs.
    ///
    /// # Errors
    /// Returns an error if the algorithm is unsupported, the ttl is not
    /// positive, or either PEM fails to parse.
    pub fn from_pems(
        algorithm: &str,
        ttl_seconds: i64,
        private_pem: &SecretString,
        public_pem: &str,
    ) -> Result<Self> {
        ensure!(ttl_seconds > 0, "Token ttl must be positive");

        let algorithm = parse_algorithm(algorithm)?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.expose_secret().as_bytes())
            .context("Invalid private key PEM")?;
        let decoding_key =
            DecodingKey::from_rsa_pem(public_pem.as_bytes()).context("Invalid public key PEM")?;

        Ok(Self {
            algorithm,
            ttl: Duration::seconds(ttl_seconds),
            encoding_key,
            decoding_key,
        })
    }

    /// Issue a token asserting `subject`, expiring ttl from now.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(&self, subject: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .context("Failed to sign session token")
    }

    /// Validate a token and extract its subject.
    ///
    /// Any failure collapses to `None`: bad signature, wrong algorithm,
    /// malformed token, missing subject, or expiry. Never partial trust.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) if !data.claims.sub.is_empty() => Some(data.claims.sub),
            Ok(_) => None,
            Err(err) => {
                debug!("Rejected session token: {err}");
                None
            }
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => Err(anyhow!("Unsupported signing algorithm: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("testdata/rsa2048.pem");
    const PUBLIC_PEM: &str = include_str!("testdata/rsa2048.pub.pem");
    const OTHER_PRIVATE_PEM: &str = include_str!("testdata/other2048.pem");

    fn service(ttl_seconds: i64) -> TokenService {
        TokenService::from_pems(
            "RS256",
            ttl_seconds,
            &SecretString::from(PRIVATE_PEM.to_string()),
            PUBLIC_PEM,
        )
        .unwrap()
    }

    #[test]
    fn issue_then_validate_returns_subject() {
        let tokens = service(TokenConfig::DEFAULT_TTL_SECONDS);
        let token = tokens.issue("alice").unwrap();
        assert_eq!(tokens.validate(&token), Some("alice".to_string()));
    }

    #[test]
    fn validate_rejects_garbage() {
        let tokens = service(60);
        assert_eq!(tokens.validate(""), None);
        assert_eq!(tokens.validate("not.a.token"), None);
    }

    #[test]
    fn validate_rejects_expired_token() {
        let tokens = service(60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            iat: now - 120,
            exp: now - 60,
        };
        let expired = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap(),
        )
        .unwrap();
        assert_eq!(tokens.validate(&expired), None);
    }

    #[test]
    fn validate_rejects_foreign_signature() {
        let tokens = service(60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            iat: now,
            exp: now + 60,
        };
        let forged = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(OTHER_PRIVATE_PEM.as_bytes()).unwrap(),
        )
        .unwrap();
        assert_eq!(tokens.validate(&forged), None);
    }

    #[test]
    fn validate_rejects_algorithm_substitution() {
        let tokens = service(60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            iat: now,
            exp: now + 60,
        };
        // HS256 token keyed on the public PEM bytes: a classic confusion
        // attempt that must not validate against an RS256 service.
        let confused = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(PUBLIC_PEM.as_bytes()),
        )
        .unwrap();
        assert_eq!(tokens.validate(&confused), None);
    }

    #[test]
    fn validate_rejects_empty_subject() {
        let tokens = service(60);
        let token = tokens.issue("").unwrap();
        assert_eq!(tokens.validate(&token), None);
    }

    #[test]
    fn rejects_unsupported_algorithm_and_bad_ttl() {
        let private = SecretString::from(PRIVATE_PEM.to_string());
        assert!(TokenService::from_pems("HS256", 60, &private, PUBLIC_PEM).is_err());
        assert!(TokenService::from_pems("RS256", 0, &private, PUBLIC_PEM).is_err());
    }

    #[test]
    fn rejects_malformed_pem() {
        let private = SecretString::from("not a pem".to_string());
        assert!(TokenService::from_pems("RS256", 60, &private, PUBLIC_PEM).is_err());
        let private = SecretString::from(PRIVATE_PEM.to_string());
        assert!(TokenService::from_pems("RS256", 60, &private, "not a pem").is_err());
    }
}
