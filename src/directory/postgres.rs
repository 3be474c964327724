//! Postgres store. Queries are bound at runtime and instrumented with
//! `db.query` spans; SQLSTATE 23505 is mapped back to the unique field via
//! the constraint name so the directory can tell a username conflict from a
//! contact-id collision.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::store::{
    IdentityStore, MessageRecord, MessageStore, NewUser, StoreError, UniqueField, UserRecord,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, credential_hash, public_key, contact_id, profile_picture_path";

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        credential_hash: row.get("credential_hash"),
        public_key: row.get("public_key"),
        contact_id: row.get("contact_id"),
        profile_picture_path: row.get("profile_picture_path"),
    }
}

fn message_from_row(row: &PgRow) -> MessageRecord {
    MessageRecord {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        encrypted_content: row.get("encrypted_content"),
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

// Map 23505 back to the field whose constraint fired.
fn unique_violation(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some("users_username_key") => Some(UniqueField::Username),
        Some("users_contact_id_key") => Some(UniqueField::ContactId),
        _ => None,
    }
}

async fn fetch_user(pool: &PgPool, query: String, bind: &str) -> Result<Option<UserRecord>, StoreError> {
    let span = query_span("SELECT", &query);
    let row = sqlx::query(&query)
        .bind(bind)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user")?;
    Ok(row.as_ref().map(user_from_row))
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        fetch_user(&self.pool, query, username).await
    }

    async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE contact_id = $1");
        fetch_user(&self.pool, query, contact_id).await
    }

    async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError> {
        let query = format!(
            r"
        INSERT INTO users
            (id, username, credential_hash, public_key, contact_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
        "
        );
        let span = query_span("INSERT", &query);
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(user.username)
            .bind(user.credential_hash)
            .bind(user.public_key)
            .bind(user.contact_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(user_from_row(&row)),
            Err(err) => {
                if let Some(field) = unique_violation(&err) {
                    return Err(StoreError::UniqueViolation(field));
                }
                Err(anyhow::Error::from(err)
                    .context("failed to insert user")
                    .into())
            }
        }
    }

    async fn update_credential_hash(
        &self,
        id: Uuid,
        credential_hash: &str,
    ) -> Result<(), StoreError> {
        let query = "UPDATE users SET credential_hash = $2 WHERE id = $1";
        let span = query_span("UPDATE", query);
        let result = sqlx::query(query)
            .bind(id)
            .bind(credential_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update credential hash")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow::anyhow!("no user with id {id}")));
        }
        Ok(())
    }

    async fn insert_contact_edge(
        &self,
        owner_id: Uuid,
        contact_user_id: Uuid,
    ) -> Result<(), StoreError> {
        // ON CONFLICT keeps duplicate adds idempotent at the storage layer.
        let query = r"
        INSERT INTO user_contacts (owner_id, contact_user_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        ";
        let span = query_span("INSERT", query);
        sqlx::query(query)
            .bind(owner_id)
            .bind(contact_user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert contact edge")?;
        Ok(())
    }

    async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<UserRecord>, StoreError> {
        let query = format!(
            r"
        SELECT {USER_COLUMNS}
        FROM users
        JOIN user_contacts ON users.id = user_contacts.contact_user_id
        WHERE user_contacts.owner_id = $1
        ORDER BY users.username
        "
        );
        let span = query_span("SELECT", &query);
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list contacts")?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        encrypted_content: &str,
    ) -> Result<MessageRecord, StoreError> {
        let query = r"
        INSERT INTO messages (id, sender_id, recipient_id, encrypted_content)
        VALUES ($1, $2, $3, $4)
        RETURNING id, sender_id, recipient_id, encrypted_content
        ";
        let span = query_span("INSERT", query);
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(sender_id)
            .bind(recipient_id)
            .bind(encrypted_content)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert message")?;
        Ok(message_from_row(&row))
    }

    async fn list_conversation(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let query = r"
        SELECT id, sender_id, recipient_id, encrypted_content
        FROM messages
        WHERE (sender_id = $1 AND recipient_id = $2)
           OR (sender_id = $2 AND recipient_id = $1)
        ORDER BY created_at
        ";
        let span = query_span("SELECT", query);
        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(peer_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list conversation")?;
        Ok(rows.iter().map(message_from_row).collect())
    }
}
