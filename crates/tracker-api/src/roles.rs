use std::sync::Arc;

use tracing::{info, warn};

use tracker_db::{Store, StoreError};
use tracker_types::models::{Identity, RoleAction, User};

use crate::error::{Result, ServiceError};

/// Promotes and demotes users. Administrator-only.
pub struct RoleManager {
    store: Arc<dyn Store>,
}

impl RoleManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn change_role(&self, actor: &Identity, action: RoleAction, target_user_id: i64) -> Result<User> {
        ensure_admin(actor)?;

        let target = self
            .store
            .get_user_by_id(target_user_id)?
            .ok_or_else(|| user_not_found(target_user_id))?;

        let role = action.target_role();
        if target.role == role {
            return Ok(target.to_user());
        }

        // The store refuses to demote the last administrator inside its own transaction.
        let updated = match self.store.change_role(target_user_id, role) {
            Ok(Some(row)) => row,
            Ok(None) => return Err(user_not_found(target_user_id)),
            Err(e @ StoreError::LastAdministrator(_)) => {
                warn!("User {} tried to demote the last administrator", actor.user_id);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "User {} set role of user {} to {}",
            actor.user_id,
            target_user_id,
            role.as_str()
        );
        Ok(updated.to_user())
    }

    pub fn list_users(&self, actor: &Identity) -> Result<Vec<User>> {
        ensure_admin(actor)?;
        Ok(self.store.get_users()?.iter().map(|row| row.to_user()).collect())
    }
}

fn ensure_admin(actor: &Identity) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    warn!("User {} denied administrator operation", actor.user_id);
    Err(ServiceError::Forbidden("administrator role required".into()))
}

fn user_not_found(user_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("user {} does not exist", user_id))
}
