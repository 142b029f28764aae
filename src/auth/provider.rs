//! Identity provider adapters
//!
//! Google and GitHub differ only in endpoints, credentials and scope
//! vocabulary. Both are driven by one [`IdentityProvider`] and selected
//! through the [`ProviderRegistry`] dispatch table.

use std::fmt;
use std::str::FromStr;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::session::{Photo, Profile};
use crate::config::{ProviderConfig, ProvidersConfig};
use crate::error::AppError;

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    GitHub,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::GitHub];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
        }
    }

    /// Scopes requested at the authorization endpoint
    pub fn scopes(self) -> &'static [&'static str] {
        match self {
            Provider::Google => &["profile", "email"],
            Provider::GitHub => &["user:email"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            _ => Err(AppError::NotFound),
        }
    }
}

/// Why a login with a provider did not complete
#[derive(Debug, Error)]
pub enum ProviderError {
    /// User refused consent at the provider
    #[error("user denied consent")]
    Denied,

    /// Code (or anti-forgery state) rejected
    #[error("authorization code is invalid or expired")]
    InvalidCode,

    /// Transport failure or unusable provider response
    #[error("provider request failed: {0}")]
    Network(String),

    /// Provider did not answer within the configured timeout
    #[error("provider request timed out")]
    Timeout,
}

impl ProviderError {
    /// Stable reason code for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ProviderError::Denied => "denied",
            ProviderError::InvalidCode => "invalid_code",
            ProviderError::Network(_) => "network",
            ProviderError::Timeout => "timeout",
        }
    }

    /// Map an OAuth2 `error` code from a callback or token response
    pub fn from_error_code(code: &str) -> Self {
        match code {
            "access_denied" => ProviderError::Denied,
            _ => ProviderError::InvalidCode,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Outcome of a successful code exchange
#[derive(Clone)]
pub struct ProviderIdentity {
    pub profile: Profile,
    pub access_token: String,
}

/// Token endpoint response (both providers answer JSON when asked to)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Google OpenID userinfo document
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    name: Option<String>,
    picture: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn photos_from(url: Option<String>) -> Vec<Photo> {
    non_empty(url)
        .map(|value| vec![Photo { value }])
        .unwrap_or_default()
}

impl From<GoogleUserInfo> for Profile {
    fn from(info: GoogleUserInfo) -> Self {
        Profile {
            display_name: non_empty(info.name),
            username: None,
            photos: photos_from(info.picture),
        }
    }
}

impl From<GitHubUser> for Profile {
    fn from(user: GitHubUser) -> Self {
        Profile {
            display_name: non_empty(user.name),
            username: non_empty(user.login),
            photos: photos_from(user.avatar_url),
        }
    }
}

/// OAuth2 authorization-code client for one provider
pub struct IdentityProvider {
    provider: Provider,
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl IdentityProvider {
    pub fn new(provider: Provider, config: ProviderConfig, http_client: reqwest::Client) -> Self {
        Self {
            provider,
            config,
            http_client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), AppError> {
        self.config.credentials().ok_or_else(|| {
            AppError::Config(format!(
                "providers.{0}.client_id and providers.{0}.client_secret must be set",
                self.provider
            ))
        })
    }

    /// Build the URL the browser is sent to for consent
    ///
    /// # Errors
    /// `AppError::Config` when client credentials are absent, so no
    /// redirect with an empty `client_id` is ever issued.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AppError> {
        let (client_id, _) = self.credentials()?;

        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| {
            AppError::Config(format!("providers.{}.authorize_url: {e}", self.provider))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", &self.config.callback_url)
                .append_pair("scope", &self.provider.scopes().join(" "))
                .append_pair("state", state);
        }
        Ok(url)
    }

    /// Exchange an authorization code and fetch the normalized profile
    pub async fn exchange_code_for_profile(
        &self,
        code: &str,
    ) -> Result<ProviderIdentity, AppError> {
        let (client_id, client_secret) = self.credentials()?;

        let access_token = self.exchange_code(code, client_id, client_secret).await?;
        let profile = self.fetch_profile(&access_token).await?;

        Ok(ProviderIdentity {
            profile,
            access_token,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, ProviderError> {
        let mut form = vec![
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", self.config.callback_url.as_str()),
        ];
        if self.provider == Provider::Google {
            form.push(("grant_type", "authorization_code"));
        }

        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Network(format!(
                "token endpoint returned {status}"
            )));
        }

        let body = response.json::<TokenResponse>().await;
        if status.is_client_error() {
            let code = body.ok().and_then(|b| b.error);
            return Err(code.map_or(ProviderError::InvalidCode, |c| {
                ProviderError::from_error_code(&c)
            }));
        }

        let body = body.map_err(ProviderError::from_transport)?;
        if let Some(code) = body.error {
            return Err(ProviderError::from_error_code(&code));
        }

        non_empty(body.access_token).ok_or_else(|| {
            ProviderError::Network("token response carried no access_token".to_string())
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, ProviderError> {
        let response = self
            .http_client
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Network(format!(
                "profile endpoint returned {status}"
            )));
        }

        let profile: Profile = match self.provider {
            Provider::Google => response
                .json::<GoogleUserInfo>()
                .await
                .map_err(ProviderError::from_transport)?
                .into(),
            Provider::GitHub => response
                .json::<GitHubUser>()
                .await
                .map_err(ProviderError::from_transport)?
                .into(),
        };
        Ok(profile)
    }
}

/// Provider -> adapter dispatch table
pub struct ProviderRegistry {
    google: IdentityProvider,
    github: IdentityProvider,
}

impl ProviderRegistry {
    pub fn new(config: &ProvidersConfig, http_client: reqwest::Client) -> Self {
        Self {
            google: IdentityProvider::new(
                Provider::Google,
                config.google.clone(),
                http_client.clone(),
            ),
            github: IdentityProvider::new(Provider::GitHub, config.github.clone(), http_client),
        }
    }

    pub fn get(&self, provider: Provider) -> &IdentityProvider {
        match provider {
            Provider::Google => &self.google,
            Provider::GitHub => &self.github,
        }
    }
}
