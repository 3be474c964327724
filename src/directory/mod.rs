//! The identity directory: authoritative owner of the user-record lifecycle.
//!
//! All mutations commit synchronously through the store. Plaintext recovery
//! codes exist only in the return values of [`IdentityDirectory::create_user`]
//! and [`IdentityDirectory::rotate_credential`]; they are never logged and
//! never persisted.

pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::credentials::{self, CredentialError};
use store::{IdentityStore, NewUser, StoreError, UniqueField, UserRecord};

// Collision odds shrink with every retry; hitting this cap means the random
// source or the store is broken, not bad luck.
const MAX_CONTACT_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("username already registered")]
    DuplicateUsername,
    #[error("no user with that contact id")]
    ContactNotFound,
    #[error("contact id allocation exhausted retries")]
    ContactIdSpaceExhausted,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct IdentityDirectory {
    store: Arc<dyn IdentityStore>,
}

impl IdentityDirectory {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.store.find_by_username(username).await?)
    }

    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.store.find_by_contact_id(contact_id).await?)
    }

    /// # Errors
    /// Returns an error if the store fails.
    pub async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<UserRecord>, DirectoryError> {
        Ok(self.store.list_contacts(owner_id).await?)
    }

    /// Create a user and hand back the plaintext recovery code, exactly once.
    ///
    /// The username pre-check gives a friendly error early; the unique
    /// constraint in the store stays authoritative when signups race. Contact
    /// ids are allocated with a bounded retry loop.
    ///
    /// # Errors
    /// `DuplicateUsername` when the name is taken; `ContactIdSpaceExhausted`
    /// when allocation retries run out (an internal fault).
    pub async fn create_user(
        &self,
        username: &str,
        public_key: &str,
    ) -> Result<(UserRecord, String), DirectoryError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Err(DirectoryError::DuplicateUsername);
        }

        let recovery_code = credentials::generate_recovery_code();
        let credential_hash = credentials::hash_recovery_code(&recovery_code)?;

        for attempt in 1..=MAX_CONTACT_ID_ATTEMPTS {
            let contact_id = credentials::generate_contact_id();
            let insert = self
                .store
                .insert_user(NewUser {
                    username,
                    credential_hash: &credential_hash,
                    public_key,
                    contact_id: &contact_id,
                })
                .await;

            match insert {
                Ok(user) => return Ok((user, recovery_code)),
                Err(StoreError::UniqueViolation(UniqueField::Username)) => {
                    return Err(DirectoryError::DuplicateUsername);
                }
                Err(StoreError::UniqueViolation(UniqueField::ContactId)) => {
                    debug!("Contact id collision, retrying (attempt {attempt})");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(DirectoryError::ContactIdSpaceExhausted)
    }

    /// Replace the credential with a fresh one and return its plaintext once.
    /// The previous code is immediately and permanently invalid.
    ///
    /// # Errors
    /// Returns an error if hashing or the store fails.
    pub async fn rotate_credential(&self, user_id: Uuid) -> Result<String, DirectoryError> {
        let recovery_code = credentials::generate_recovery_code();
        let credential_hash = credentials::hash_recovery_code(&recovery_code)?;
        self.store
            .update_credential_hash(user_id, &credential_hash)
            .await?;
        Ok(recovery_code)
    }

    /// Resolve the target by contact id and record the directed edge.
    ///
    /// Duplicate adds are no-ops. Self-add policy is not enforced here; the
    /// gateway rejects it once, before calling in.
    ///
    /// # Errors
    /// `ContactNotFound` when no user carries the contact id.
    pub async fn add_contact(
        &self,
        owner_id: Uuid,
        target_contact_id: &str,
    ) -> Result<UserRecord, DirectoryError> {
        let Some(target) = self.store.find_by_contact_id(target_contact_id).await? else {
            return Err(DirectoryError::ContactNotFound);
        };
        self.store.insert_contact_edge(owner_id, target.id).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CONTACT_ID_LEN, RECOVERY_CODE_LEN};
    use async_trait::async_trait;
    use memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn directory() -> IdentityDirectory {
        IdentityDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_user_returns_code_and_contact_id() {
        let directory = directory();
        let (user, code) = directory.create_user("alice", "pk1").await.unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.public_key, "pk1");
        assert_eq!(code.len(), RECOVERY_CODE_LEN);
        assert_eq!(user.contact_id.len(), CONTACT_ID_LEN);
        assert!(user
            .contact_id
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        assert!(credentials::verify_recovery_code(&code, &user.credential_hash).unwrap());

        let found = directory
            .find_by_contact_id(&user.contact_id)
            .await
            .unwrap()
            .expect("lookup by contact id");
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_username() {
        let directory = directory();
        directory.create_user("alice", "pk1").await.unwrap();

        let err = directory.create_user("alice", "pk2").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateUsername));
    }

    #[tokio::test]
    async fn concurrent_signups_one_wins() {
        let directory = Arc::new(directory());
        let (first, second) = tokio::join!(
            directory.create_user("alice", "pk1"),
            directory.create_user("alice", "pk2"),
        );

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        for outcome in [first, second] {
            if let Err(err) = outcome {
                assert!(matches!(err, DirectoryError::DuplicateUsername));
            }
        }
    }

    #[tokio::test]
    async fn rotate_credential_invalidates_old_code() {
        let directory = directory();
        let (user, old_code) = directory.create_user("alice", "pk1").await.unwrap();

        let new_code = directory.rotate_credential(user.id).await.unwrap();
        let refreshed = directory
            .find_by_username("alice")
            .await
            .unwrap()
            .expect("user exists");

        assert!(!credentials::verify_recovery_code(&old_code, &refreshed.credential_hash).unwrap());
        assert!(credentials::verify_recovery_code(&new_code, &refreshed.credential_hash).unwrap());
    }

    #[tokio::test]
    async fn add_contact_is_idempotent_and_directed() {
        let directory = directory();
        let (alice, _) = directory.create_user("alice", "pk1").await.unwrap();
        let (bob, _) = directory.create_user("bob", "pk2").await.unwrap();

        directory
            .add_contact(alice.id, &bob.contact_id)
            .await
            .unwrap();
        directory
            .add_contact(alice.id, &bob.contact_id)
            .await
            .unwrap();

        let contacts = directory.list_contacts(alice.id).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].username, "bob");

        // Directed: bob did not gain alice.
        assert!(directory.list_contacts(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_contact_unknown_id_fails() {
        let directory = directory();
        let (alice, _) = directory.create_user("alice", "pk1").await.unwrap();

        let err = directory
            .add_contact(alice.id, "0000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::ContactNotFound));
    }

    // Store wrapper that reports a contact-id collision for the first N
    // inserts, to drive the allocation retry loop.
    struct CollidingStore {
        inner: MemoryStore,
        collisions: AtomicUsize,
    }

    impl CollidingStore {
        fn new(collisions: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                collisions: AtomicUsize::new(collisions),
            }
        }
    }

    #[async_trait]
    impl IdentityStore for CollidingStore {
        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserRecord>, StoreError> {
            self.inner.find_by_username(username).await
        }

        async fn find_by_contact_id(
            &self,
            contact_id: &str,
        ) -> Result<Option<UserRecord>, StoreError> {
            self.inner.find_by_contact_id(contact_id).await
        }

        async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError> {
            if self
                .collisions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    left.checked_sub(1)
                })
                .is_ok()
            {
                return Err(StoreError::UniqueViolation(UniqueField::ContactId));
            }
            self.inner.insert_user(user).await
        }

        async fn update_credential_hash(
            &self,
            id: Uuid,
            credential_hash: &str,
        ) -> Result<(), StoreError> {
            self.inner.update_credential_hash(id, credential_hash).await
        }

        async fn insert_contact_edge(
            &self,
            owner_id: Uuid,
            contact_user_id: Uuid,
        ) -> Result<(), StoreError> {
            self.inner.insert_contact_edge(owner_id, contact_user_id).await
        }

        async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<UserRecord>, StoreError> {
            self.inner.list_contacts(owner_id).await
        }
    }

    #[tokio::test]
    async fn create_user_retries_contact_id_collisions() {
        let directory = IdentityDirectory::new(Arc::new(CollidingStore::new(3)));
        let (user, _) = directory.create_user("alice", "pk1").await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn create_user_gives_up_after_retry_cap() {
        let directory = IdentityDirectory::new(Arc::new(CollidingStore::new(usize::MAX)));
        let err = directory.create_user("alice", "pk1").await.unwrap_err();
        assert!(matches!(err, DirectoryError::ContactIdSpaceExhausted));
    }
}
