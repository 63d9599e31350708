use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use tracker_db::Store;

/// Background task that drops blacklist rows whose tokens have expired.
///
/// Revocation checks stay correct without it since an expired token already
/// fails signature validation; this only keeps the table small.
pub async fn run_purge_loop(store: Arc<dyn Store>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match purge_once(store.clone()).await {
            Ok(0) => debug!("Purge: no expired tokens"),
            Ok(count) => info!("Purge: removed {} expired blacklist entries", count),
            Err(e) => warn!("Purge error: {}", e),
        }
    }
}

async fn purge_once(store: Arc<dyn Store>) -> anyhow::Result<usize> {
    let removed = tokio::task::spawn_blocking(move || store.purge_expired_tokens(Utc::now())).await??;
    Ok(removed)
}
