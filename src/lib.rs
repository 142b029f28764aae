//! social-login - sign in with Google or GitHub and show a profile page
//!
//! # Architecture
//!
//! ```text
//! browser ──> auth (redirect) ──> identity provider
//!    ^                                   │
//!    └──── auth (callback) <─────────────┘
//!                │
//!                ├──> SessionStore (create)
//!                └──> 302 /profile ──> session guard ──> profile renderer
//! ```
//!
//! # Modules
//!
//! - `auth`: provider adapters, sign-in flow, sessions, session guard
//! - `api`: profile page and metrics endpoint
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use auth::{MemorySessionStore, Provider, ProviderRegistry, SessionStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Server-side sessions
    pub sessions: Arc<dyn SessionStore>,

    /// Provider -> adapter dispatch table
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    /// Initialize application state with the in-memory session store
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let max_age = Duration::from_secs(config.auth.session_max_age.max(1) as u64);
        Self::with_session_store(config, Arc::new(MemorySessionStore::new(max_age)))
    }

    /// Initialize application state with an injected session store
    pub fn with_session_store(
        config: config::AppConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        metrics::init_metrics();

        // Every provider call is bounded; elapsed timeouts surface as
        // ProviderError::Timeout.
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("social-login/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.auth.provider_timeout_seconds))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let providers = ProviderRegistry::new(&config.providers, http_client);
        for provider in Provider::ALL {
            tracing::info!(
                provider = %provider,
                configured = providers.get(provider).is_configured(),
                "Identity provider registered"
            );
        }
        for provider in config.providers.unconfigured() {
            tracing::warn!(
                provider = %provider,
                "Client credentials not configured; sign-in with this provider is disabled"
            );
        }

        Ok(Self {
            config: Arc::new(config),
            sessions,
            providers: Arc::new(providers),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware, routing::get};
    use tower::ServiceBuilder;
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .merge(auth::auth_router())
        .merge(api::profile_router(state.clone()))
        .merge(api::metrics_router())
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(middleware::from_fn(api::track_requests)),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn startup_warns_about_providers_without_credentials() {
        let config = config::AppConfig::load_from(
            [
                ("SESSION_SECRET", "s".repeat(32)),
                ("GITHUB_CLIENT_ID", "gh-id".to_string()),
                ("GITHUB_CLIENT_SECRET", "gh-secret".to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        )
        .unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || AppState::new(config)).unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let warnings: Vec<&str> = output.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("provider=google"));
        assert!(warnings[0].contains("Client credentials not configured"));
    }
}
