//! # murmur-server
//!
//! Instant-messaging backend.
//!
//! This binary provides:
//! - **WebSocket gateway** that keeps one live connection per user and routes
//!   private and group chat frames to whoever is online
//! - **Relationship service**: friend requests, accept/reject, friend folders
//! - **Chat groups** with owner/admin/member roles
//! - **REST API** (axum) for relationships, groups, history and admin tasks
//!
//! Everything durable lives in one SQLite database.

mod api;
mod auth;
mod config;
mod error;
mod groups;
mod registry;
mod relationships;
mod router;
mod sessions;
mod store;
mod ws;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use murmur_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::sessions::SessionIssuer;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,murmur_server=debug")),
        )
        .init();

    info!("Starting murmur server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database ready");

    let signing_key = match config.session_signing_key {
        Some(bytes) => SigningKey::from_bytes(&bytes),
        None => {
            warn!("SESSION_SIGNING_KEY not set; using an ephemeral key, sessions will not survive a restart");
            SigningKey::generate(&mut OsRng)
        }
    };
    let issuer = SessionIssuer::new(signing_key, config.session_ttl_hours);
    info!(
        issuer_pubkey = %hex::encode(issuer.public_key()),
        admin_enabled = config.admin_token.is_some(),
        "Session issuer ready"
    );

    let http_addr = config.http_addr;
    let app_state = AppState::new(Store::new(db), issuer, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Drop revocation entries whose tokens have expired anyway (every 10 minutes)
    let verifier = app_state.verifier.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            verifier.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP + WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
