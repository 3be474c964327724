//! # Kuriero
//!
//! `kuriero` is the backend of a minimal end-to-end-encrypted messenger. It is
//! a relay and a directory, never a cryptographic endpoint: clients register a
//! public key, authenticate with a one-time recovery code instead of a
//! password, and exchange opaque ciphertext blobs the server stores and
//! forwards without being able to read.
//!
//! ## Authentication model
//!
//! There are no passwords. Signup returns a high-entropy recovery code exactly
//! once; only a salted slow hash of it is persisted. Login exchanges the code
//! for a short-lived session token signed with an RSA keypair loaded at
//! startup, so token verification never needs the signing secret.
//!
//! ## Contact discovery
//!
//! Users are discovered through an opaque 16-character contact id rather than
//! by username, which keeps the contact-add flow free of username
//! enumeration. Contact relations are directed: A holding B says nothing
//! about B holding A.

pub mod api;
pub mod cli;
pub mod credentials;
pub mod directory;
pub mod token;

#[cfg(test)]
mod tests {
    use anyhow::{ensure, Context, Result};
    use std::fs;
    use std::path::{Path, PathBuf};

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonicalize_sql(sql: &str) -> String {
        sql.chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect()
    }

    fn canonical_sql(path: &Path) -> Result<String> {
        let sql = fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        Ok(canonicalize_sql(&sql))
    }

    fn assert_contains(path: &Path, canonical: &str, needle: &str) -> Result<()> {
        ensure!(
            canonical.contains(needle),
            "Expected {needle} in {}",
            path.display()
        );
        Ok(())
    }

    // The directory treats these constraints as the authoritative guard
    // against duplicate usernames and contact ids under concurrent signups,
    // so the deploy schema must keep them.
    #[test]
    fn schema_sql_keeps_unique_constraints() -> Result<()> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sql/schema.sql");
        let canonical = canonical_sql(&path)?;
        assert_contains(&path, &canonical, "constraintusers_username_keyunique(username)")?;
        assert_contains(
            &path,
            &canonical,
            "constraintusers_contact_id_keyunique(contact_id)",
        )
    }

    #[test]
    fn schema_sql_keeps_directed_contact_edges() -> Result<()> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sql/schema.sql");
        let canonical = canonical_sql(&path)?;
        assert_contains(&path, &canonical, "primarykey(owner_id,contact_user_id)")
    }
}
