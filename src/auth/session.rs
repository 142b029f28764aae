//! Session management
//!
//! Sessions live server-side behind the [`SessionStore`] trait. The
//! browser only holds an opaque id, HMAC-signed so forged or tampered
//! cookies are treated like unknown ids.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use moka::future::Cache;
use prometheus::IntGauge;
use rand::RngCore;
use sha2::Sha256;

use super::provider::Provider;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Profile picture reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub value: String,
}

/// Provider profile normalized to a common shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub username: Option<String>,
    /// Ordered as returned by the provider
    pub photos: Vec<Photo>,
}

/// Signed-in user, created once per successful provider callback
#[derive(Clone)]
pub struct User {
    pub provider: Provider,
    pub profile: Profile,
    pub access_token: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("provider", &self.provider)
            .field("profile", &self.profile)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// Authenticated session
///
/// Only authenticated sessions are ever stored, so a session always
/// carries exactly one user. Anonymous browsers have no session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Server-side session storage
///
/// Implementations must make operations on one key atomic and keep
/// operations on different keys independent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new authenticated session for `user`
    async fn create(&self, user: User) -> Result<Session, AppError>;

    /// Look up a session; `None` if unknown, destroyed or expired
    async fn get(&self, id: &str) -> Result<Option<Session>, AppError>;

    /// Remove a session; destroying an unknown id is a no-op
    async fn destroy(&self, id: &str) -> Result<(), AppError>;
}

/// In-process session store (volatile, cleared on restart)
pub struct MemorySessionStore {
    /// Session ID -> Session
    sessions: Cache<String, Arc<Session>>,
    max_age: Duration,
    /// Tracks the live entry count
    active: IntGauge,
}

impl MemorySessionStore {
    /// Create a store whose entries expire after `max_age`
    pub fn new(max_age: Duration) -> Self {
        Self::with_gauge(max_age, crate::metrics::SESSIONS_ACTIVE.clone())
    }

    /// Create a store reporting its size to `active`
    pub fn with_gauge(max_age: Duration, active: IntGauge) -> Self {
        let sessions = Cache::builder().time_to_live(max_age).build();
        Self {
            sessions,
            max_age,
            active,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    async fn record_size(&self) {
        self.active.set(self.session_count().await as i64);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user: User) -> Result<Session, AppError> {
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(self.max_age)
            .map_err(|e| AppError::Internal(e.into()))?;

        let session = Session {
            id: generate_token(),
            user,
            created_at: now,
            expires_at: now + max_age,
        };

        self.sessions
            .insert(session.id.clone(), Arc::new(session.clone()))
            .await;
        self.record_size().await;

        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, AppError> {
        let session = self
            .sessions
            .get(id)
            .await
            .filter(|session| !session.is_expired())
            .map(|session| session.as_ref().clone());
        // TTL evictions happen without a write, so reads refresh the gauge too
        self.record_size().await;
        Ok(session)
    }

    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        self.sessions.invalidate(id).await;
        self.record_size().await;
        Ok(())
    }
}

/// Generate a random 256-bit token, base64url encoded
pub fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign a session id for the cookie
///
/// Format: `{id}.{base64(hmac_sha256(id))}`
pub fn sign_session_id(id: &str, secret: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    mac.update(id.as_bytes());
    let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", id, signature))
}

/// Verify a signed cookie value and return the session id
///
/// Returns `None` for malformed values or signature mismatches.
pub fn verify_session_cookie(value: &str, secret: &str) -> Option<String> {
    let (id, signature_b64) = value.split_once('.')?;
    if id.is_empty() {
        return None;
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(id.to_string())
}
