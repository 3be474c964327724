//! In-memory store for tests and local development.
//!
//! Enforces the same uniqueness rules as the Postgres store so the directory
//! behaves identically on both. All clones share the same data.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    IdentityStore, MessageRecord, MessageStore, NewUser, StoreError, UniqueField, UserRecord,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: Vec<UserRecord>,
    // Directed edges (owner, contact); the set makes duplicate adds no-ops.
    contacts: BTreeSet<(Uuid, Uuid)>,
    // Insertion order doubles as chronological order.
    messages: Vec<MessageRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.contact_id == contact_id)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.users.iter().any(|row| row.username == user.username) {
            return Err(StoreError::UniqueViolation(UniqueField::Username));
        }
        if inner
            .users
            .iter()
            .any(|row| row.contact_id == user.contact_id)
        {
            return Err(StoreError::UniqueViolation(UniqueField::ContactId));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username.to_string(),
            credential_hash: user.credential_hash.to_string(),
            public_key: user.public_key.to_string(),
            contact_id: user.contact_id.to_string(),
            profile_picture_path: None,
        };
        inner.users.push(record.clone());
        Ok(record)
    }

    async fn update_credential_hash(
        &self,
        id: Uuid,
        credential_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("no user with id {id}")))?;
        user.credential_hash = credential_hash.to_string();
        Ok(())
    }

    async fn insert_contact_edge(
        &self,
        owner_id: Uuid,
        contact_user_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.contacts.insert((owner_id, contact_user_id));
        Ok(())
    }

    async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let ids: Vec<Uuid> = inner
            .contacts
            .iter()
            .filter(|(owner, _)| *owner == owner_id)
            .map(|(_, contact)| *contact)
            .collect();
        Ok(inner
            .users
            .iter()
            .filter(|user| ids.contains(&user.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        encrypted_content: &str,
    ) -> Result<MessageRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let record = MessageRecord {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            encrypted_content: encrypted_content.to_string(),
        };
        inner.messages.push(record.clone());
        Ok(record)
    }

    async fn list_conversation(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .iter()
            .filter(|message| {
                (message.sender_id == user_id && message.recipient_id == peer_id)
                    || (message.sender_id == peer_id && message.recipient_id == user_id)
            })
            .cloned()
            .collect())
    }
}
