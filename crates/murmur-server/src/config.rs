//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use murmur_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, IDENTIFY_TIMEOUT_SECS, OUTBOUND_QUEUE_CAPACITY,
};

/// Longest accepted session lifetime (ten years).  Larger values overflow
/// chrono's date range when a token expiry is computed.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP and WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./murmur.db`
    pub database_path: PathBuf,

    /// Ed25519 secret key used to sign session tokens (hex-encoded, 64 chars).
    /// Env: `SESSION_SIGNING_KEY`
    /// Default: none; an ephemeral key is generated at startup, so tokens do
    /// not survive a restart.
    pub session_signing_key: Option<[u8; 32]>,

    /// Lifetime of newly issued session tokens, at most
    /// [`MAX_SESSION_TTL_HOURS`].
    /// Env: `SESSION_TTL_HOURS`
    /// Default: `72`
    pub session_ttl_hours: i64,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Frames buffered per live connection before pushes are dropped.
    /// Env: `OUTBOUND_QUEUE_CAPACITY`
    /// Default: `256`
    pub outbound_queue_capacity: usize,

    /// How long a WebSocket without an upgrade-time token may take to send
    /// its token frame.
    /// Env: `IDENTIFY_TIMEOUT_SECS`
    /// Default: `10`
    pub identify_timeout_secs: u64,
}

// Keeps secrets out of the startup log.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("session_signing_key", &self.session_signing_key.map(|_| "<set>"))
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<set>"))
            .field("outbound_queue_capacity", &self.outbound_queue_capacity)
            .field("identify_timeout_secs", &self.identify_timeout_secs)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./murmur.db"),
            session_signing_key: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            admin_token: None,
            outbound_queue_capacity: OUTBOUND_QUEUE_CAPACITY,
            identify_timeout_secs: IDENTIFY_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(hex_key) = var("SESSION_SIGNING_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.session_signing_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid SESSION_SIGNING_KEY, using an ephemeral key"
                    );
                }
            }
        }

        if let Some(val) = var("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) if hours > MAX_SESSION_TTL_HOURS => {
                    tracing::warn!(
                        value = hours,
                        max = MAX_SESSION_TTL_HOURS,
                        "SESSION_TTL_HOURS too large, capping"
                    );
                    config.session_ttl_hours = MAX_SESSION_TTL_HOURS;
                }
                Ok(hours) if hours > 0 => config.session_ttl_hours = hours,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let Some(token) = var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(val) = var("OUTBOUND_QUEUE_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.outbound_queue_capacity = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid OUTBOUND_QUEUE_CAPACITY, using default"
                ),
            }
        }

        if let Some(val) = var("IDENTIFY_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.identify_timeout_secs = secs,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid IDENTIFY_TIMEOUT_SECS, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_key(value: &str) -> Result<[u8; 32], String> {
    let value = value.trim();
    if value.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", value.len()));
    }

    let bytes = hex::decode(value).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
