//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod fake_provider;

use std::sync::Arc;
use std::time::Duration;

use social_login::auth::{MemorySessionStore, Provider};
use social_login::{AppState, config};
use tokio::net::TcpListener;

pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
///
/// Runs the real router on an ephemeral port, wired to a fake identity
/// provider for both Google and GitHub.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub sessions: Arc<MemorySessionStore>,
    pub provider_addr: String,
    /// Client that never follows redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig)) -> Self {
        let provider_addr = fake_provider::spawn().await;

        let mut config = test_config(&provider_addr);
        customize(&mut config);

        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
            config.auth.session_max_age as u64,
        )));
        let state = AppState::with_session_store(config, sessions.clone()).unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = social_login::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            sessions,
            provider_addr,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Cookie", cookie)
            .send()
            .await
            .unwrap()
    }

    /// Start a sign-in; returns the state token and the `oauth_state` cookie pair
    pub async fn begin(&self, provider: Provider) -> (String, String) {
        let response = self.get(&format!("/auth/{provider}")).await;
        assert_eq!(response.status(), 302);

        let location = url::Url::parse(location(&response).unwrap()).unwrap();
        let state = location
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state parameter");
        let cookie = format!(
            "oauth_state={}",
            set_cookie_value(&response, "oauth_state").expect("oauth_state cookie")
        );

        (state, cookie)
    }

    /// Run a full sign-in and return the callback response
    pub async fn login(&self, provider: Provider, code: &str) -> reqwest::Response {
        let (state, cookie) = self.begin(provider).await;
        self.get_with_cookie(
            &format!("/auth/{provider}/callback?code={code}&state={state}"),
            &cookie,
        )
        .await
    }

    /// Run a full sign-in and return the `session=...` cookie pair
    pub async fn login_cookie(&self, provider: Provider, code: &str) -> String {
        let response = self.login(provider, code).await;
        assert_eq!(location(&response), Some("/profile"));
        format!(
            "session={}",
            set_cookie_value(&response, "session").expect("session cookie")
        )
    }
}

/// Configuration pointing both providers at the fake provider
pub fn test_config(provider_addr: &str) -> config::AppConfig {
    let provider = |name: &str, profile_path: &str| config::ProviderConfig {
        client_id: Some(format!("{name}-client-id")),
        client_secret: Some(fake_provider::CLIENT_SECRET.to_string()),
        callback_url: format!("http://localhost:3000/auth/{name}/callback"),
        authorize_url: format!("{provider_addr}/{name}/authorize"),
        token_url: format!("{provider_addr}/{name}/token"),
        profile_url: format!("{provider_addr}/{name}/{profile_path}"),
    };

    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            static_dir: "public".into(),
            secure_cookies: false,
        },
        auth: config::AuthConfig {
            session_secret: SESSION_SECRET.to_string(),
            session_max_age: 3600,
            provider_timeout_seconds: 1,
        },
        providers: config::ProvidersConfig {
            google: provider("google", "userinfo"),
            github: provider("github", "user"),
        },
    }
}

pub fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
}

/// Value of the `Set-Cookie` header for `name`, if one was sent
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| {
            let pair = header.split(';').next()?.trim();
            pair.strip_prefix(&prefix).map(ToOwned::to_owned)
        })
}
