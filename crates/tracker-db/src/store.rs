//! The persistence contract consumed by the request tracker core.
//!
//! Reads return `Ok(None)` (or an empty `Vec`) for absence; errors are reserved
//! for storage failures and write collisions. Every write commits atomically.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracker_types::models::{MaintenanceRequest, RequestPatch, Role};

use crate::models::{NewRequest, NewUser, TokenRow, UserRow};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row changed since the caller read it.
    #[error("write conflict on request {id}: expected version {expected}, found {found}")]
    Conflict { id: i64, expected: i64, found: i64 },

    #[error("email already registered")]
    DuplicateEmail,

    /// Demoting this user would leave no administrator.
    #[error("user {0} is the last administrator")]
    LastAdministrator(i64),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub trait Store: Send + Sync {
    // -- Users --

    fn get_user_by_id(&self, id: i64) -> StoreResult<Option<UserRow>>;

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>>;

    /// All users, ordered by id.
    fn get_users(&self) -> StoreResult<Vec<UserRow>>;

    fn save_user(&self, user: &NewUser) -> StoreResult<UserRow>;

    /// Returns the updated user, or `None` if no user has that id.
    ///
    /// Demoting the only administrator fails with [`StoreError::LastAdministrator`].
    /// The count and the write share one transaction.
    fn change_role(&self, user_id: i64, role: Role) -> StoreResult<Option<UserRow>>;

    /// Returns `false` if no user has that id.
    fn update_password(&self, user_id: i64, password_hash: &str) -> StoreResult<bool>;

    // -- Requests --

    /// Every request in the system, ordered by id ascending.
    fn get_requests(&self) -> StoreResult<Vec<MaintenanceRequest>>;

    /// Requests owned by `user_id`, ordered by id ascending.
    fn get_my_requests(&self, user_id: i64) -> StoreResult<Vec<MaintenanceRequest>>;

    fn get_request_by_id(&self, id: i64) -> StoreResult<Option<MaintenanceRequest>>;

    fn save_request(&self, request: &NewRequest) -> StoreResult<MaintenanceRequest>;

    /// Write only the columns set in `patch`, stamping `modified_at` and bumping
    /// the version. Fails with [`StoreError::Conflict`] if the stored version is
    /// not `expected_version`. An empty patch writes nothing.
    fn update_request(
        &self,
        id: i64,
        patch: &RequestPatch,
        expected_version: i64,
        modified_at: DateTime<Utc>,
    ) -> StoreResult<Option<MaintenanceRequest>>;

    // -- Token blacklist --

    fn get_token_by_jti(&self, jti: &str) -> StoreResult<Option<TokenRow>>;

    /// Blacklist `jti` until `expires`. Saving an already-blacklisted jti is a no-op.
    fn save_token(&self, jti: &str, expires: DateTime<Utc>) -> StoreResult<()>;

    /// Delete blacklist rows that expired at or before `now`. Returns the number removed.
    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}
