use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{join_url, Requester, AUTH_HEADER};
use crate::error::Result;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::types::TokenSet;

/// Offline stand-in for [`crate::AuthenticatedRequester`].
///
/// Talks to a local simulator host with a fixed token and never contacts an
/// identity provider. Request handling is shared with the real requester.
pub struct SimulatedRequester {
    client: reqwest::Client,
    host: String,
    username: Option<String>,
    password: Option<String>,
    tokens: TokenSet,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SimulatedRequester {
    pub fn new(host: impl Into<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            username,
            password,
            tokens: TokenSet::simulator(),
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
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

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

#[async_trait]
impl Requester for SimulatedRequester {
    async fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = join_url(&self.host, path);

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, HeaderValue::from_str(&self.tokens.id_token)?);
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        debug!("[simulator] {} {}", method, url);
        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn refresh_tokens(&mut self) -> Result<TokenSet> {
        Ok(self.tokens.clone())
    }

    async fn username(&mut self) -> Result<String> {
        Ok(self
            .username
            .clone()
            .unwrap_or_else(|| "simulator".to_string()))
    }

    fn tokens(&self) -> Option<&TokenSet> {
        Some(&self.tokens)
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
