//! Storage interface for identity records, contact edges and message blobs.
//!
//! Domain logic lives above this layer; implementations only move rows. The
//! unique constraints on `username` and `contact_id` are the authoritative
//! guard against duplicates under concurrent signups, which is why
//! [`StoreError::UniqueViolation`] names the field that fired.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// A persisted user row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub credential_hash: String,
    pub public_key: String,
    pub contact_id: String,
    pub profile_picture_path: Option<String>,
}

/// Fields for a new user row. The id is assigned by the store.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub credential_hash: &'a str,
    pub public_key: &'a str,
    pub contact_id: &'a str,
}

/// A stored message blob. Content is opaque ciphertext supplied by clients.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub encrypted_content: String,
}

/// Which unique constraint a failed insert hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    ContactId,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    UniqueViolation(UniqueField),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// CRUD over user records and the directed contact-edge set.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_contact_id(&self, contact_id: &str)
        -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user, relying on the unique constraints for `username`
    /// and `contact_id`.
    async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError>;

    /// Overwrite the credential hash. The previous hash is gone for good.
    async fn update_credential_hash(
        &self,
        id: Uuid,
        credential_hash: &str,
    ) -> Result<(), StoreError>;

    /// Insert the directed edge (owner, contact). Inserting an existing edge
    /// is a no-op.
    async fn insert_contact_edge(
        &self,
        owner_id: Uuid,
        contact_user_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Users the owner holds as contacts. Directed: this is not the set of
    /// users holding the owner.
    async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<UserRecord>, StoreError>;
}

/// Store-and-forward message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        encrypted_content: &str,
    ) -> Result<MessageRecord, StoreError>;

    /// Messages between the two users in both directions, oldest first.
    async fn list_conversation(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}
