//! Error types for social-login
//!
//! All handler errors are converted to `AppError`, which implements
//! `IntoResponse`. Provider failures never reach the browser as text:
//! they become the uniform redirect to the login failure page.

use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::auth::ProviderError;

/// Path every failed login is redirected to
pub const LOGIN_FAILURE_PATH: &str = "/login-failure";

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown route segment (404)
    #[error("Resource not found")]
    NotFound,

    /// Missing or invalid configuration (500)
    ///
    /// Raised at startup, or at first use of a provider whose
    /// credentials are absent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity provider rejected or failed the login (302 to failure page)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Config(_) => "config",
            AppError::Provider(_) => "provider",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Provider(err) => {
                tracing::warn!(reason = err.reason(), error = %err, "Login failed");
                found(LOGIN_FAILURE_PATH)
            }
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                internal_error_page()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                internal_error_page()
            }
        }
    }
}

/// `302 Found` redirect
///
/// axum's `Redirect` only offers 303/307/308; the login flow answers
/// with plain 302 like every browser-facing OAuth client.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn internal_error_page() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h2>Internal server error</h2><p><a href=\"/\">Back</a></p>"),
    )
        .into_response()
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_redirect_to_failure_page() {
        for err in [
            ProviderError::Denied,
            ProviderError::InvalidCode,
            ProviderError::Network("connection refused".to_string()),
            ProviderError::Timeout,
        ] {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(
                response.headers().get(header::LOCATION).unwrap(),
                LOGIN_FAILURE_PATH
            );
        }
    }

    #[test]
    fn config_error_is_internal_server_error() {
        let response =
            AppError::Config("providers.google.client_id is not set".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
