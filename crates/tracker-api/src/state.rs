use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use tracker_db::Store;

use crate::error::{Result, ServiceError};
use crate::lifecycle::Lifecycle;
use crate::roles::RoleManager;
use crate::sessions::{SessionConfig, Sessions};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub sessions: Sessions,
    pub lifecycle: Lifecycle,
    pub roles: RoleManager,
    /// Upper bound on any single call that touches persistence.
    pub db_timeout: Duration,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn Store>, sessions: &SessionConfig, db_timeout: Duration) -> Self {
        Self {
            sessions: Sessions::new(store.clone(), sessions),
            lifecycle: Lifecycle::new(store.clone()),
            roles: RoleManager::new(store),
            db_timeout,
        }
    }

    pub fn with_sessions(mut self, sessions: Sessions) -> Self {
        self.sessions = sessions;
        self
    }
}

/// Run a blocking core call off the async runtime, bounded by `db_timeout`.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&AppStateInner) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let app = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&app));

    match tokio::time::timeout(state.db_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ServiceError::Internal("worker task failed".into()))
        }
        Err(_) => {
            warn!("Persistence call exceeded {:?}", state.db_timeout);
            Err(ServiceError::Timeout)
        }
    }
}
