mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tracker_api::routes::router;
use tracker_api::sessions::{SessionConfig, Sessions};
use tracker_api::state::AppStateInner;
use tracker_db::{Database, Store};
use tracker_types::models::Role;

use config::{AdminSeed, Config, DatabaseLocation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "maintenance_tracker=debug,tracker_api=debug,tracker_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("TRACKER_JWT_SECRET is a development placeholder, do not expose this instance");
    }

    // Init database
    let db = match &config.database {
        DatabaseLocation::File(path) => Database::open(path, config.db_timeout)
            .with_context(|| format!("opening database at {}", path.display()))?,
        DatabaseLocation::InMemory => Database::open_in_memory()?,
    };
    let store: Arc<dyn Store> = Arc::new(db);

    let session_config = SessionConfig {
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
    };

    if let Some(seed) = &config.admin_seed {
        seed_admin(store.clone(), &session_config, seed)?;
    }

    let state = Arc::new(AppStateInner::new(store.clone(), &session_config, config.db_timeout));

    tokio::spawn(cleanup::run_purge_loop(store, config.purge_interval));

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Maintenance tracker ({:?}) listening on {}", config.environment, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Create the bootstrap administrator unless that email is already registered.
fn seed_admin(store: Arc<dyn Store>, config: &SessionConfig, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = seed.email.trim().to_lowercase();
    if store.get_user_by_email(&email)?.is_some() {
        info!("Bootstrap administrator {} already exists", email);
        return Ok(());
    }

    let user = Sessions::new(store, config).register_with_role(
        &email,
        &seed.password,
        "Bootstrap account",
        &seed.security_answer,
        Role::Administrator,
    )?;
    info!("Seeded bootstrap administrator {} (id {})", user.email, user.id);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
