//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::directory::store::{MessageRecord, UserRecord};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub username: String,
    pub public_key: String,
}

/// Signup response. `recovery_code` is the one and only time the plaintext
/// code leaves the server.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub id: String,
    pub username: String,
    pub public_key: String,
    pub recovery_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub recovery_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// Public fields of a user, as seen by other users.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub public_key: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            public_key: user.public_key,
        }
    }
}

/// The caller's own identity, contact id included.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserDetailsResponse {
    pub id: String,
    pub username: String,
    pub public_key: String,
    pub contact_id: String,
    pub profile_picture_path: Option<String>,
}

impl From<UserRecord> for UserDetailsResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            public_key: user.public_key,
            contact_id: user.contact_id,
            profile_picture_path: user.profile_picture_path,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ContactAddRequest {
    pub contact_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoveryCodeResponse {
    pub recovery_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageCreateRequest {
    pub recipient_username: String,
    pub encrypted_content: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub encrypted_content: String,
}

impl From<MessageRecord> for MessageResponse {
    fn from(message: MessageRecord) -> Self {
        Self {
            id: message.id.to_string(),
            sender_id: message.sender_id.to_string(),
            recipient_id: message.recipient_id.to_string(),
            encrypted_content: message.encrypted_content,
        }
    }
}
