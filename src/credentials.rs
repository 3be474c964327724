//! Recovery-code and contact-id generation plus credential hashing.
//!
//! The recovery code is the only secret a user holds; it is returned in
//! plaintext exactly once and only its hash is ever stored. Stored hashes
//! carry a leading scheme tag so verification can dispatch on the format:
//! scheme `v1` is a SHA-256 pre-hash (hex) fed into Argon2id. The fixed-size
//! pre-hash keeps the full entropy of the 64-character code inside any slow
//! hash input limit, 72-byte-truncating schemes included.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use thiserror::Error;

pub const RECOVERY_CODE_LEN: usize = 64;
pub const CONTACT_ID_LEN: usize = 16;

const RECOVERY_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const CONTACT_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Tag ahead of the PHC string: SHA-256 pre-hash + Argon2id.
const SCHEME_V1: &str = "v1";

/// A stored hash that cannot be interpreted. This is a data-integrity fault,
/// never a verification result.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("unknown credential hash scheme")]
    UnknownScheme,
    #[error("malformed credential hash")]
    MalformedHash,
    #[error("failed to hash credential")]
    Hash,
}

/// Generate a recovery code: 64 characters over A-Z, a-z, 0-9.
#[must_use]
pub fn generate_recovery_code() -> String {
    random_string(RECOVERY_CODE_ALPHABET, RECOVERY_CODE_LEN)
}

/// Generate a contact id: 16 characters over A-Z, 0-9.
///
/// The id space is large but used as a lookup key, so callers must check
/// uniqueness against the directory and retry on collision.
#[must_use]
pub fn generate_contact_id() -> String {
    random_string(CONTACT_ID_ALPHABET, CONTACT_ID_LEN)
}

// Rejection sampling keeps the draw uniform for alphabets whose size does not
// divide 256.
fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = OsRng;
    let zone = 256 - (256 % alphabet.len());
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        rng.fill_bytes(&mut buf);
        for &byte in &buf {
            if out.len() == len {
                break;
            }
            if (byte as usize) < zone {
                if let Some(&char_byte) = alphabet.get(byte as usize % alphabet.len()) {
                    out.push(char_byte as char);
                }
            }
        }
    }

    out
}

/// Hash a recovery code for storage.
///
/// # Errors
/// Returns `CredentialError::Hash` if the slow hash fails.
pub fn hash_recovery_code(code: &str) -> Result<String, CredentialError> {
    let digest = prehash(code);
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(digest.as_bytes(), &salt)
        .map_err(|_| CredentialError::Hash)?
        .to_string();
    Ok(format!("{SCHEME_V1}{hash}"))
}

/// Verify a recovery code against a stored hash.
///
/// The comparison is delegated to argon2's constant-time verifier; a mismatch
/// is `Ok(false)`, while an uninterpretable stored hash is an error.
///
/// # Errors
/// Returns `CredentialError` if the stored hash carries an unknown scheme tag
/// or cannot be parsed.
pub fn verify_recovery_code(code: &str, stored: &str) -> Result<bool, CredentialError> {
    let phc = stored
        .strip_prefix(SCHEME_V1)
        .ok_or(CredentialError::UnknownScheme)?;
    let parsed = PasswordHash::new(phc).map_err(|_| CredentialError::MalformedHash)?;
    let digest = prehash(code);
    match Argon2::default().verify_password(digest.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(CredentialError::MalformedHash),
    }
}

// Fixed-size digest first: the slow hash always sees 64 hex characters no
// matter how long the code is.
fn prehash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of a throwaway code, for burning a verification when a login names an
/// unknown user. Keeps both login failure paths on the same clock.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_recovery_code(&generate_recovery_code()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_code_length_and_alphabet() {
        let code = generate_recovery_code();
        assert_eq!(code.len(), RECOVERY_CODE_LEN);
        assert!(code.bytes().all(|b| RECOVERY_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn contact_id_length_and_alphabet() {
        let contact_id = generate_contact_id();
        assert_eq!(contact_id.len(), CONTACT_ID_LEN);
        assert!(contact_id
            .bytes()
            .all(|b| CONTACT_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn generated_codes_differ() {
        assert_ne!(generate_recovery_code(), generate_recovery_code());
        assert_ne!(generate_contact_id(), generate_contact_id());
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let code = generate_recovery_code();
        let stored = hash_recovery_code(&code).unwrap();
        assert!(stored.starts_with("v1$argon2id$"));
        assert!(verify_recovery_code(&code, &stored).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_code() {
        let stored = hash_recovery_code("correct-code").unwrap();
        assert!(!verify_recovery_code("wrong-code", &stored).unwrap());
    }

    #[test]
    fn verify_covers_input_beyond_72_bytes() {
        // Schemes that truncate at 72 bytes would accept codeB against
        // codeA's hash; the pre-hash must keep them distinct.
        let code_a = "a".repeat(80);
        let mut code_b = "a".repeat(79);
        code_b.push('b');

        let stored = hash_recovery_code(&code_a).unwrap();
        assert!(verify_recovery_code(&code_a, &stored).unwrap());
        assert!(!verify_recovery_code(&code_b, &stored).unwrap());
    }

    #[test]
    fn verify_rejects_unknown_scheme() {
        let stored = hash_recovery_code("code").unwrap();
        let untagged = stored.trim_start_matches("v1").to_string();
        assert!(matches!(
            verify_recovery_code("code", &untagged),
            Err(CredentialError::UnknownScheme)
        ));
        assert!(matches!(
            verify_recovery_code("code", &format!("v9{untagged}")),
            Err(CredentialError::UnknownScheme)
        ));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_recovery_code("code", "v1not-a-phc-string"),
            Err(CredentialError::MalformedHash)
        ));
    }

    #[test]
    fn dummy_hash_never_verifies() {
        assert!(!verify_recovery_code("anything", dummy_hash()).unwrap());
    }
}
