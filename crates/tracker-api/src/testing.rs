//! Shared fixtures for unit tests: an in-memory store wired into every service.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Duration;

use tracker_db::{Database, Store};
use tracker_types::models::{Identity, MaintenanceRequest, RequestKind, Role, User};

use crate::lifecycle::Lifecycle;
use crate::roles::RoleManager;
use crate::sessions::{SessionConfig, Sessions};

pub(crate) const PASSWORD: &str = "password.Pa55word";
pub(crate) const ANSWER: &str = "Rex";

/// Minimum-cost Argon2 so tests don't spend seconds hashing.
pub(crate) fn cheap_argon2() -> Argon2<'static> {
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

pub(crate) struct Fixture {
    pub store: Arc<Database>,
    pub sessions: Sessions,
    pub lifecycle: Lifecycle,
    pub roles: RoleManager,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build("test-secret", Duration::minutes(60))
    }

    pub fn with_secret(secret: &str) -> Self {
        Self::build(secret, Duration::minutes(60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::build("test-secret", ttl)
    }

    fn build(secret: &str, ttl: Duration) -> Self {
        let store = Arc::new(Database::open_in_memory().expect("in-memory db"));
        let shared: Arc<dyn Store> = store.clone();
        let config = SessionConfig {
            jwt_secret: secret.to_string(),
            token_ttl: ttl,
        };
        Self {
            sessions: Sessions::new(shared.clone(), &config).with_argon2(cheap_argon2()),
            lifecycle: Lifecycle::new(shared.clone()),
            roles: RoleManager::new(shared),
            store,
        }
    }

    pub fn register(&self, email: &str) -> User {
        self.sessions
            .register(email, PASSWORD, "First pet?", ANSWER)
            .expect("registration")
    }

    pub fn consumer(&self, email: &str) -> Identity {
        identity(self.register(email))
    }

    pub fn admin(&self, email: &str) -> Identity {
        let user = self
            .sessions
            .register_with_role(email, PASSWORD, "First pet?", ANSWER, Role::Administrator)
            .expect("registration");
        identity(user)
    }

    pub fn request(&self, owner: &Identity, title: &str) -> MaintenanceRequest {
        self.lifecycle
            .create_request(owner, title, "Kitchen", RequestKind::Repair)
            .expect("create request")
    }
}

fn identity(user: User) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email,
        role: user.role,
    }
}
