//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (SOCIAL_LOGIN__SECTION__KEY)
//! 4. Plain deployment variables (PORT, SESSION_SECRET, GOOGLE_CLIENT_ID, ...)

use config::{Config, ConfigBuilder, Environment, File, Map, builder::DefaultState};
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::Provider;
use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (default: 3000)
    pub port: u16,
    /// Directory of static front-end files served at `/`
    pub static_dir: PathBuf,
    /// Mark cookies `Secure` (enable behind TLS termination)
    pub secure_cookies: bool,
}

/// Session and login settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes), signs the session cookie
    pub session_secret: String,
    /// Session max age in seconds (default: 86400 = 1 day)
    pub session_max_age: i64,
    /// Upper bound for each call to an identity provider
    pub provider_timeout_seconds: u64,
}

/// Identity provider settings, one entry per supported provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub google: ProviderConfig,
    pub github: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Google => &self.google,
            Provider::GitHub => &self.github,
        }
    }

    /// Providers missing a client ID or secret
    pub fn unconfigured(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| self.get(*provider).credentials().is_none())
            .collect()
    }
}

/// OAuth client registration and endpoints for a single provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Redirect URI registered with the provider
    pub callback_url: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Endpoint returning the signed-in user's profile
    pub profile_url: String,
}

impl ProviderConfig {
    /// Client ID and secret, when both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.client_id.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let secret = self
            .client_secret
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())?;
        Some((id, secret))
    }
}

/// Logging configuration
///
/// Tracing is installed before the rest of the configuration is loaded, so
/// these settings come from the environment only.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Read `SOCIAL_LOGIN__LOGGING__LEVEL` and `SOCIAL_LOGIN__LOGGING__FORMAT`
    pub fn from_vars(vars: &Map<String, String>) -> Self {
        let var = |key: &str, default: &str| {
            vars.get(key)
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            level: var("SOCIAL_LOGIN__LOGGING__LEVEL", "info"),
            format: var("SOCIAL_LOGIN__LOGGING__FORMAT", "pretty"),
        }
    }
}

/// Plain variables honoured for compatibility with common deployments
const PLAIN_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("SESSION_SECRET", "auth.session_secret"),
    ("GOOGLE_CLIENT_ID", "providers.google.client_id"),
    ("GOOGLE_CLIENT_SECRET", "providers.google.client_secret"),
    ("GOOGLE_CALLBACK_URL", "providers.google.callback_url"),
    ("GITHUB_CLIENT_ID", "providers.github.client_id"),
    ("GITHUB_CLIENT_SECRET", "providers.github.client_secret"),
    ("GITHUB_CALLBACK_URL", "providers.github.callback_url"),
];

impl AppConfig {
    /// Load configuration from files and the process environment
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(std::env::vars().collect())
    }

    /// Load configuration with `vars` standing in for the process environment
    pub fn load_from(vars: Map<String, String>) -> Result<Self, AppError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOCIAL_LOGIN")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        let config = with_plain_overrides(builder, &vars)?
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, AppError> {
        Ok(Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.static_dir", "public")?
            .set_default("server.secure_cookies", false)?
            .set_default("auth.session_max_age", 86_400)?
            .set_default("auth.provider_timeout_seconds", 10)?
            .set_default(
                "providers.google.callback_url",
                "http://localhost:3000/auth/google/callback",
            )?
            .set_default(
                "providers.google.authorize_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default(
                "providers.google.token_url",
                "https://oauth2.googleapis.com/token",
            )?
            .set_default(
                "providers.google.profile_url",
                "https://www.googleapis.com/oauth2/v3/userinfo",
            )?
            .set_default(
                "providers.github.callback_url",
                "http://localhost:3000/auth/github/callback",
            )?
            .set_default(
                "providers.github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "providers.github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("providers.github.profile_url", "https://api.github.com/user")?)
    }

    fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.provider_timeout_seconds == 0 {
            return Err(AppError::Config(
                "auth.provider_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for provider in Provider::ALL {
            let provider_config = self.providers.get(provider);
            for (key, value) in [
                ("callback_url", &provider_config.callback_url),
                ("authorize_url", &provider_config.authorize_url),
                ("token_url", &provider_config.token_url),
                ("profile_url", &provider_config.profile_url),
            ] {
                url::Url::parse(value).map_err(|e| {
                    AppError::Config(format!("providers.{provider}.{key} is not a valid URL: {e}"))
                })?;
            }
        }

        Ok(())
    }
}

fn with_plain_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    vars: &Map<String, String>,
) -> Result<ConfigBuilder<DefaultState>, AppError> {
    for (variable, key) in PLAIN_ENV_OVERRIDES {
        builder = builder.set_override_option(*key, vars.get(*variable).cloned())?;
    }
    Ok(builder)
}
