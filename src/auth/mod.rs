//! Google and GitHub sign-in
//!
//! Handles:
//! - Identity provider adapters
//! - OAuth authorization code flow
//! - Session management
//! - Session guard for protected routes

mod middleware;
mod oauth;
pub mod provider;
pub mod session;

pub use middleware::{CurrentUser, SESSION_COOKIE, require_session, resolve_session};
pub use oauth::{AuthRequest, CallbackParams, STATE_COOKIE, auth_router};
pub use provider::{IdentityProvider, Provider, ProviderError, ProviderIdentity, ProviderRegistry};
pub use session::{
    MemorySessionStore, Photo, Profile, Session, SessionStore, User, sign_session_id,
    verify_session_cookie,
};
