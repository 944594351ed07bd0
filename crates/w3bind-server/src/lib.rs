//! w3bind HTTP server.
//!
//! Exposes signing sessions (creation, polling, SSE status stream, wallet
//! callback), the witness-set check, and read access to binding documents.
//! A session that carries a binding intent countersigns its document once
//! the wallet signature verifies.

pub mod api;
pub mod api_bindings;
pub mod api_sse;
pub mod background;
pub mod config;

use axum::{
    routing::{delete, get, post},
    Extension, Json, Router,
};
use config::{Config, SessionStoreKind};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use w3bind_binding::BindingClient;
use w3bind_db::DbRuntimeSettings;
use w3bind_registry::{RegistryClient, RegistryConfig, RegistryError};
use w3bind_session::{
    MemorySessionStore, SessionManager, SessionStore, SqliteSessionStore, StoreError,
};
use w3bind_vault::VaultClient;
use w3bind_verify::CertificateVerifier;

/// Path wallets post signatures to.
pub const CALLBACK_PATH: &str = "/api/signing/callback";

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub bindings: BindingClient,
    /// Externally reachable base URL, without trailing slash.
    pub public_url: String,
    /// Vault writes may use sessions verified without a bound key.
    pub allow_unenforced_writes: bool,
}

impl AppState {
    /// Default wallet callback target for sessions that do not name one.
    pub fn default_callback_url(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.public_url.trim_end_matches('/'))
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("registry client: {0}")]
    Registry(#[from] RegistryError),

    #[error("session store: {0}")]
    Store(#[from] StoreError),

    #[error("server i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Wires the registry, vault, verifier, session store, and binding clients
/// described by `config`.
///
/// # Errors
///
/// Fails when no registry URL is configured or the SQLite store cannot be
/// opened.
pub fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let registry = RegistryClient::new(RegistryConfig {
        base_url: config.registry.base_url.clone(),
        platform: config.registry.platform.clone(),
        timeout: config.registry.timeout(),
        token_refresh_margin: config.registry.token_refresh_margin(),
    })?;
    let vault = VaultClient::new(Arc::new(registry));
    let verifier = Arc::new(CertificateVerifier::new(vault.clone(), config.verifier.strict));

    let store: Arc<dyn SessionStore> = match config.sessions.store {
        SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
        SessionStoreKind::Sqlite => Arc::new(SqliteSessionStore::open(
            &config.database.path,
            DbRuntimeSettings {
                busy_timeout_ms: config.database.busy_timeout_ms,
                pool_max_size: config.database.pool_max_size,
            },
        )?),
    };
    tracing::info!(
        store = ?config.sessions.store,
        strict = config.verifier.strict,
        allow_unenforced_writes = config.verifier.unenforced_writes_allowed(),
        ttl_secs = config.sessions.ttl_secs,
        "session manager ready"
    );

    Ok(AppState {
        sessions: SessionManager::new(store, verifier, config.sessions.ttl()),
        bindings: BindingClient::new(vault),
        public_url: config.server.public_url.clone(),
        allow_unenforced_writes: config.verifier.unenforced_writes_allowed(),
    })
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/signing/sessions", post(api::create_session_handler))
        .route(
            "/api/signing/sessions/{id}",
            get(api::get_session_handler),
        )
        .route(
            "/api/signing/sessions/{id}/events",
            get(api_sse::session_events_handler),
        )
        .route(CALLBACK_PATH, post(api::callback_handler))
        .route("/api/witness/verify", post(api::verify_witnesses_handler))
        .route(
            "/api/bindings/{ename}/pending",
            get(api_bindings::pending_handler),
        )
        .route(
            "/api/bindings/{ename}/connections",
            get(api_bindings::connections_handler),
        )
        .route(
            "/api/bindings/{ename}/documents",
            post(api_bindings::create_document_handler),
        )
        .route(
            "/api/bindings/{ename}/documents/{documentId}",
            delete(api_bindings::decline_document_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
