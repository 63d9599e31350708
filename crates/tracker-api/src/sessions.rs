//! Session issuance, verification and revocation.
//!
//! Tokens are stateless JWTs carrying the user id, role and a unique `jti`.
//! Logout writes the `jti` into the blacklist until the token's own expiry,
//! and [`Sessions::verify`] consults that blacklist on every call.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use tracker_db::Store;
use tracker_db::models::NewUser;
use tracker_types::api::Claims;
use tracker_types::models::{Identity, Role, User};

use crate::error::{AuthError, Result, ServiceError};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct Sessions {
    store: Arc<dyn Store>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    argon2: Argon2<'static>,
}

impl Sessions {
    pub fn new(store: Arc<dyn Store>, config: &SessionConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            store,
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            token_ttl: config.token_ttl,
            argon2: Argon2::default(),
        }
    }

    /// Swap the password hasher, e.g. for cheaper parameters.
    pub fn with_argon2(mut self, argon2: Argon2<'static>) -> Self {
        self.argon2 = argon2;
        self
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        security_question: &str,
        security_answer: &str,
    ) -> Result<User> {
        self.register_with_role(email, password, security_question, security_answer, Role::Consumer)
    }

    /// Registration with an explicit role. Only used to seed the bootstrap administrator.
    pub fn register_with_role(
        &self,
        email: &str,
        password: &str,
        security_question: &str,
        security_answer: &str,
        role: Role,
    ) -> Result<User> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;
        if security_question.trim().is_empty() {
            return Err(ServiceError::Validation("security question must not be empty".into()));
        }
        if security_answer.trim().is_empty() {
            return Err(ServiceError::Validation("security answer must not be empty".into()));
        }

        let new_user = NewUser {
            email,
            password_hash: self.hash_secret(password)?,
            security_question: security_question.trim().to_string(),
            security_answer_hash: self.hash_secret(&normalize_answer(security_answer))?,
            role,
        };

        let row = self.store.save_user(&new_user)?;
        info!("Registered user {} as {}", row.id, row.role.as_str());
        Ok(row.to_user())
    }

    /// Log in with email and password.
    ///
    /// `presented` is whatever bearer token the client already sent. If it is
    /// still a live session the login is refused before credentials are read.
    pub fn login(&self, email: &str, password: &str, presented: Option<&str>) -> Result<Session> {
        if let Some(token) = presented {
            if let Ok(identity) = self.verify(token) {
                info!("Refused login: user {} already holds a live session", identity.user_id);
                return Err(AuthError::AlreadyLoggedIn.into());
            }
        }

        let email = normalize_email(email);
        let user = self
            .store
            .get_user_by_email(&email)?
            .ok_or_else(|| ServiceError::NotFound(format!("no user registered with email {}", email)))?;

        if !self.verify_secret(password, &user.password_hash)? {
            warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        let session = self.issue(user.to_user())?;
        info!("User {} logged in", session.user.id);
        Ok(session)
    }

    /// Revoke `token` by blacklisting its `jti`. Revoking twice is fine.
    pub fn logout(&self, token: &str) -> Result<()> {
        let claims = self.decode(token)?;
        let expires = DateTime::from_timestamp(claims.exp as i64, 0).ok_or(AuthError::InvalidToken)?;
        self.store.save_token(&claims.jti, expires)?;
        info!("User {} logged out", claims.sub);
        Ok(())
    }

    pub fn verify(&self, token: &str) -> Result<Identity> {
        let claims = self.decode(token)?;
        // Expired tokens already failed decode, so any blacklist row found here is live.
        if self.store.get_token_by_jti(&claims.jti)?.is_some() {
            warn!("Rejected revoked token for user {}", claims.sub);
            return Err(AuthError::Revoked.into());
        }
        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }

    /// Set a new password after proving knowledge of the security answer.
    pub fn reset_password(&self, email: &str, security_answer: &str, new_password: &str) -> Result<()> {
        let email = normalize_email(email);
        let user = self
            .store
            .get_user_by_email(&email)?
            .ok_or_else(|| ServiceError::NotFound(format!("no user registered with email {}", email)))?;

        if !self.verify_secret(&normalize_answer(security_answer), &user.security_answer_hash)? {
            warn!("Failed password reset for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }
        validate_password(new_password)?;

        let hash = self.hash_secret(new_password)?;
        if !self.store.update_password(user.id, &hash)? {
            return Err(ServiceError::NotFound(format!("user {} not found", user.id)));
        }
        info!("Password reset for user {}", user.id);
        Ok(())
    }

    fn issue(&self, user: User) -> Result<Session> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token encoding failed: {}", e)))?;

        Ok(Session { user, token, expires_at })
    }

    fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken.into())
    }

    fn hash_secret(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ServiceError::Internal(format!("hashing failed: {}", e)))
    }

    fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ServiceError::Internal(format!("stored hash unreadable: {}", e)))?;
        Ok(self.argon2.verify_password(secret.as_bytes(), &parsed).is_ok())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("{:?} is not a valid email address", email)))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
