//! Database row types, mapped directly from SQLite rows.
//! Hash columns stay here; callers outside auth get a `tracker_types::models::User`.

use chrono::{DateTime, Utc};
use tracker_types::models::{RequestKind, Role, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub security_question: String,
    pub security_answer_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            security_question: self.security_question.clone(),
        }
    }
}

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub security_question: String,
    pub security_answer_hash: String,
    pub role: Role,
}

pub struct NewRequest {
    pub user_id: i64,
    pub kind: RequestKind,
    pub title: String,
    pub description: String,
    pub requested_by: String,
    pub date_requested: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenRow {
    pub jti: String,
    pub expires: DateTime<Utc>,
}
