//! Sign-in flow
//!
//! Implements the OAuth 2.0 authorization code flow against Google and
//! GitHub, with a per-attempt anti-forgery state carried in a cookie.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::middleware::{SESSION_COOKIE, session_id_from_jar};
use super::provider::{Provider, ProviderError};
use super::session::{User, generate_token, sign_session_id};
use crate::AppState;
use crate::error::{AppError, found};
use crate::metrics::{LOGINS_TOTAL, LOGOUTS_TOTAL};

/// Cookie holding the pending sign-in attempt
pub const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/auth";
const STATE_COOKIE_MAX_AGE_SECONDS: i64 = 600;

/// Create authentication router
///
/// Routes:
/// - GET /auth/:provider - Redirect to the provider
/// - GET /auth/:provider/callback - OAuth callback
/// - GET /login-failure - Failure page
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider", get(begin_auth))
        .route("/auth/:provider/callback", get(handle_callback))
        .route("/login-failure", get(login_failure))
        .route("/logout", get(logout))
}

// =============================================================================
// Pending sign-in attempt
// =============================================================================

/// One browser round-trip to a provider
///
/// Issued at `begin_auth`, consumed by the next callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub provider: Provider,
    pub state: String,
}

impl AuthRequest {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: generate_token(),
        }
    }

    fn to_cookie_value(&self) -> String {
        format!("{}.{}", self.provider, self.state)
    }

    fn from_cookie_value(value: &str) -> Option<Self> {
        let (provider, state) = value.split_once('.')?;
        if state.is_empty() {
            return None;
        }
        Some(Self {
            provider: provider.parse().ok()?,
            state: state.to_string(),
        })
    }

    /// Whether a callback belongs to this attempt
    fn matches(&self, provider: Provider, state: Option<&str>) -> bool {
        self.provider == provider && state == Some(self.state.as_str())
    }
}

fn build_state_cookie(request: &AuthRequest, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, request.to_cookie_value()))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECONDS))
        .build()
}

fn build_session_cookie(value: String, max_age: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

// =============================================================================
// Begin
// =============================================================================

/// GET /auth/:provider
///
/// Redirects the browser to the provider's consent page.
///
/// # Steps
/// 1. Generate anti-forgery state token
/// 2. Build the authorization URL (fails fast without credentials)
/// 3. Store the pending attempt in a cookie
/// 4. 302 to the provider
async fn begin_auth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let provider: Provider = provider.parse()?;
    let request = AuthRequest::new(provider);

    let authorization_url = state
        .providers
        .get(provider)
        .authorization_url(&request.state)?;

    tracing::debug!(provider = %provider, "Redirecting to identity provider");

    let cookie = build_state_cookie(&request, state.config.server.secure_cookies);
    Ok((jar.add(cookie), found(authorization_url.as_str())))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Anti-forgery state token
    pub state: Option<String>,
    /// OAuth error code, e.g. `access_denied`
    pub error: Option<String>,
}

/// GET /auth/:provider/callback
///
/// # Steps
/// 1. Consume the pending attempt cookie
/// 2. Verify state and exchange the code for a profile
/// 3. Replace any existing session with a new one for the user
/// 4. 302 to /profile, or to /login-failure on any provider failure
async fn handle_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    let pending = jar
        .get(STATE_COOKIE)
        .and_then(|cookie| AuthRequest::from_cookie_value(cookie.value()));
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH));

    match sign_in(&state, &provider, pending, params, &jar).await {
        Ok((provider, cookie)) => {
            LOGINS_TOTAL
                .with_label_values(&[provider.as_str(), "success"])
                .inc();
            tracing::info!(provider = %provider, "User signed in");

            (jar.add(cookie), found("/profile")).into_response()
        }
        Err(err) => {
            if let AppError::Provider(reason) = &err {
                LOGINS_TOTAL
                    .with_label_values(&[provider.as_str(), reason.reason()])
                    .inc();
            }
            // The state cookie removal rides along with every failure
            (jar, err).into_response()
        }
    }
}

/// Complete the login and open a fresh session, returning its cookie
async fn sign_in(
    state: &AppState,
    provider: &str,
    pending: Option<AuthRequest>,
    params: CallbackParams,
    jar: &CookieJar,
) -> Result<(Provider, Cookie<'static>), AppError> {
    let provider: Provider = provider.parse()?;
    let user = complete_login(state, provider, pending, params).await?;

    let secret = &state.config.auth.session_secret;
    if let Some(previous) = session_id_from_jar(jar, secret) {
        state.sessions.destroy(&previous).await?;
    }
    let session = state.sessions.create(user).await?;

    let cookie = build_session_cookie(
        sign_session_id(&session.id, secret)?,
        state.config.auth.session_max_age,
        state.config.server.secure_cookies,
    );
    Ok((provider, cookie))
}

/// Validate the callback and turn it into a [`User`]
async fn complete_login(
    state: &AppState,
    provider: Provider,
    pending: Option<AuthRequest>,
    params: CallbackParams,
) -> Result<User, AppError> {
    if let Some(error) = params.error {
        return Err(ProviderError::from_error_code(&error).into());
    }

    let pending = pending.ok_or(ProviderError::InvalidCode)?;
    if !pending.matches(provider, params.state.as_deref()) {
        tracing::warn!(provider = %provider, "Callback state does not match pending attempt");
        return Err(ProviderError::InvalidCode.into());
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(ProviderError::InvalidCode)?;

    let identity = state
        .providers
        .get(provider)
        .exchange_code_for_profile(&code)
        .await?;

    Ok(User {
        provider,
        profile: identity.profile,
        access_token: identity.access_token,
    })
}

// =============================================================================
// Failure page
// =============================================================================

/// GET /login-failure
async fn login_failure() -> Html<&'static str> {
    Html(r#"<h2>Falha no login</h2><p><a href="/">Voltar</a></p>"#)
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Destroys the session (if any), clears the cookie and redirects to `/`.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(id) = session_id_from_jar(&jar, &state.config.auth.session_secret) {
        state.sessions.destroy(&id).await?;
        LOGOUTS_TOTAL.inc();
        tracing::info!("User signed out");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, found("/")))
}
