use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::tokens::{TokenRefreshCallback, TokenStore};
use crate::types::{Credentials, TokenSet};
use crate::verifier::TokenVerifier;

/// Header carrying the raw id token on every service call.
pub const AUTH_HEADER: &str = "authtoken";

const NO_TOKENS: &str = "no tokens available, must log in first";

/// Build a full URL from the service host and an endpoint path.
pub(crate) fn join_url(host: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Timeouts passed straight through to the HTTP client.
pub fn http_client(connect_timeout: Duration, read_timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .build()?)
}

/// Transport used by [`crate::VueClient`].
///
/// Implementors supply the primitives; the provided [`Requester::request`]
/// adds the 401 refresh-and-retry-once step and the bounded 5xx backoff loop,
/// so production and simulator requesters behave identically.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Check preconditions and refresh proactively if the current token is stale.
    async fn prepare(&mut self) -> Result<()>;

    /// Issue a single call with the current credential attached.
    async fn send(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Response>;

    async fn refresh_tokens(&mut self) -> Result<TokenSet>;

    /// Canonical username (the account email).
    async fn username(&mut self) -> Result<String>;

    fn tokens(&self) -> Option<&TokenSet>;

    fn host(&self) -> &str;

    fn retry_policy(&self) -> &RetryPolicy;

    fn sleeper(&self) -> Arc<dyn Sleeper>;

    /// Send an authenticated request.
    ///
    /// A 5xx response that survives every retry is returned, not raised.
    /// Transport errors propagate unchanged.
    async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        self.prepare().await?;

        let mut response = self.send(&method, path, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            info!("{} {} was unauthorized, refreshing tokens", method, path);
            self.refresh_tokens().await?;
            response = self.send(&method, path, body).await?;
        }

        let policy = self.retry_policy().clone();
        let sleeper = self.sleeper();
        let mut attempt = 0;
        while response.status().is_server_error() && attempt + 1 < policy.max_attempts {
            let delay = policy.delay_for(attempt);
            warn!(
                "{} {} returned {}, retrying in {:?}",
                method,
                path,
                response.status(),
                delay
            );
            sleeper.sleep(delay).await;
            response = self.send(&method, path, body).await?;
            attempt += 1;
        }

        Ok(response)
    }
}

/// Requester backed by a real identity provider.
pub struct AuthenticatedRequester {
    client: reqwest::Client,
    host: String,
    credentials: Credentials,
    store: TokenStore,
    provider: Box<dyn IdentityProvider>,
    verifier: TokenVerifier,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AuthenticatedRequester {
    pub fn new(
        host: impl Into<String>,
        provider: Box<dyn IdentityProvider>,
        credentials: Credentials,
        tokens: Option<TokenSet>,
    ) -> Self {
        let verifier = TokenVerifier::new(provider.jwks_url());
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            credentials,
            store: TokenStore::new(tokens, None),
            provider,
            verifier,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.verifier = TokenVerifier::with_client(client.clone(), self.verifier.jwks_url());
        self.client = client;
        self
    }

    pub fn with_refresh_callback(mut self, callback: Arc<dyn TokenRefreshCallback>) -> Self {
        let tokens = self.store.current().cloned();
        self.store = TokenStore::new(tokens, Some(callback));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Hand the current tokens to the persistence callback again.
    pub fn persist_tokens(&self) {
        self.store.persist(self.known_username());
    }

    fn known_username(&self) -> Option<&str> {
        Some(self.credentials.username.as_str()).filter(|u| !u.is_empty())
    }

    /// Whether `token` must be replaced before use.
    ///
    /// Anything that cannot be verified counts as expired.
    async fn is_token_expired(&self, token: &str) -> bool {
        match self.verifier.decode_token(token).await {
            Ok(claims) => claims.exp <= Utc::now().timestamp(),
            Err(e) => {
                debug!("Treating token as expired: {}", e);
                true
            }
        }
    }

    /// Check if current token needs refresh and refresh if needed.
    /// A pending password with no tokens yet triggers the initial login.
    async fn ensure_valid_token(&mut self) -> Result<()> {
        let access_token = match self.store.current() {
            Some(tokens) => tokens.access_token.clone(),
            None if self.credentials.has_password() => {
                self.refresh_tokens().await?;
                return Ok(());
            }
            None => return Err(Error::Config(NO_TOKENS.to_string())),
        };

        if self.is_token_expired(&access_token).await {
            debug!("Access token expired, refreshing before request");
            self.refresh_tokens().await?;
        }
        Ok(())
    }

    fn get_headers(&self, with_body: bool) -> Result<HeaderMap> {
        let tokens = self
            .store
            .current()
            .ok_or_else(|| Error::Config(NO_TOKENS.to_string()))?;

        let mut headers = HeaderMap::new();
        if with_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(AUTH_HEADER, HeaderValue::from_str(&tokens.id_token)?);
        Ok(headers)
    }
}

#[async_trait]
impl Requester for AuthenticatedRequester {
    async fn prepare(&mut self) -> Result<()> {
        self.ensure_valid_token().await
    }

    async fn send(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = join_url(&self.host, path);
        let headers = self.get_headers(body.is_some())?;

        debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn refresh_tokens(&mut self) -> Result<TokenSet> {
        let tokens = match self.credentials.password.as_deref() {
            Some(password) => {
                let tokens = self
                    .provider
                    .authenticate(&self.credentials.username, password)
                    .await?;
                // single use: later refreshes go through the refresh token
                self.credentials.password = None;
                info!("Authenticated {} with password", self.credentials.username);
                tokens
            }
            None => {
                let current = self
                    .store
                    .current()
                    .cloned()
                    .ok_or_else(|| Error::Config(NO_TOKENS.to_string()))?;
                let tokens = self.provider.renew(&current).await?;
                debug!("Renewed tokens with refresh token");
                tokens
            }
        };

        let username = Some(self.credentials.username.as_str()).filter(|u| !u.is_empty());
        self.store.replace(tokens.clone(), username);
        Ok(tokens)
    }

    async fn username(&mut self) -> Result<String> {
        self.prepare().await?;
        let access_token = self
            .store
            .current()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| Error::Config(NO_TOKENS.to_string()))?;

        let attributes = self.provider.user_attributes(&access_token).await?;
        let email = attributes
            .get("email")
            .cloned()
            .ok_or_else(|| Error::Auth("account has no email attribute".to_string()))?;
        self.credentials.username = email.clone();
        Ok(email)
    }

    fn tokens(&self) -> Option<&TokenSet> {
        self.store.current()
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.sleeper.clone()
    }
}
