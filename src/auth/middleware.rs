//! Session guard
//!
//! Protects routes that require a signed-in user. Anonymous requests
//! are sent back to the front page instead of receiving an error.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::session::{Session, User, verify_session_cookie};
use crate::AppState;
use crate::error::{AppError, found};

/// Cookie carrying the signed session id
pub const SESSION_COOKIE: &str = "session";

/// Where anonymous requests to protected routes are sent
const ANONYMOUS_REDIRECT: &str = "/";

/// Session id from the request cookie, if present and correctly signed
pub fn session_id_from_jar(jar: &CookieJar, session_secret: &str) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| verify_session_cookie(cookie.value(), session_secret))
}

/// Resolve the request's session through the session store
///
/// Missing cookies, bad signatures, unknown and destroyed ids all
/// resolve to `None`.
pub async fn resolve_session(
    jar: &CookieJar,
    state: &AppState,
) -> Result<Option<Session>, AppError> {
    match session_id_from_jar(jar, &state.config.auth.session_secret) {
        Some(id) => state.sessions.get(&id).await,
        None => Ok(None),
    }
}

/// Middleware to require a session
///
/// Adds the [`Session`] to request extensions when present, otherwise
/// redirects to `/` without running the wrapped handler.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/profile", get(profile))
///     .route_layer(middleware::from_fn_with_state(state, require_session));
/// ```
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(session) = resolve_session(&jar, &state).await? else {
        tracing::debug!(path = %request.uri().path(), "No session; redirecting to front page");
        return Ok(found(ANONYMOUS_REDIRECT));
    };

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Extractor for the signed-in user
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.provider)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(CurrentUser(session.user.clone()));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        match resolve_session(&jar, &app_state).await {
            Ok(Some(session)) => {
                let user = session.user.clone();
                parts.extensions.insert(session);
                Ok(CurrentUser(user))
            }
            Ok(None) => Err(found(ANONYMOUS_REDIRECT)),
            Err(err) => Err(err.into_response()),
        }
    }
}
