#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use emvue::{Error, IdentityProvider, IdentitySettings, Result, Sleeper, TokenSet};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_private.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KEY_ID: &str = "test-key-1";
pub const EMAIL: &str = "test@example.com";

/// A token signed with the fixture key, expiring `expires_in` seconds from now.
pub fn signed_token(subject: &str, expires_in: i64) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KEY_ID.to_string());
    let claims = serde_json::json!({
        "sub": subject,
        "exp": Utc::now().timestamp() + expires_in,
    });
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

pub fn fresh_tokens(tag: &str) -> TokenSet {
    TokenSet::new(
        signed_token(&format!("{}-access", tag), 3600),
        signed_token(&format!("{}-id", tag), 3600),
        format!("{}-refresh", tag),
        "Bearer",
    )
}

pub fn expired_tokens(tag: &str) -> TokenSet {
    TokenSet::new(
        signed_token(&format!("{}-access", tag), -60),
        signed_token(&format!("{}-id", tag), -60),
        format!("{}-refresh", tag),
        "Bearer",
    )
}

/// Identity settings pointing every identity call at `server`.
pub fn identity_settings(server: &MockServer) -> IdentitySettings {
    IdentitySettings {
        endpoint: Some(server.uri()),
        ..IdentitySettings::default()
    }
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}/.well-known/jwks.json", identity_settings(server).user_pool_url())
}

pub async fn mount_jwks(server: &MockServer) {
    let pool = IdentitySettings::default().user_pool_id;
    Mock::given(method("GET"))
        .and(path(format!("/{}/.well-known/jwks.json", pool)))
        .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
        .mount(server)
        .await;
}

#[derive(Debug, Default)]
pub struct ProviderCalls {
    pub authenticate: AtomicUsize,
    pub renew: AtomicUsize,
    pub user_attributes: AtomicUsize,
}

impl ProviderCalls {
    pub fn authenticate(&self) -> usize {
        self.authenticate.load(Ordering::SeqCst)
    }

    pub fn renew(&self) -> usize {
        self.renew.load(Ordering::SeqCst)
    }
}

/// In-process identity provider that issues fixture-signed tokens.
pub struct FakeIdentityProvider {
    jwks_url: String,
    password: String,
    issued: TokenSet,
    pub calls: Arc<ProviderCalls>,
}

impl FakeIdentityProvider {
    pub fn new(jwks_url: String) -> Self {
        Self {
            jwks_url,
            password: "password123".to_string(),
            issued: fresh_tokens("issued"),
            calls: Arc::new(ProviderCalls::default()),
        }
    }

    pub fn issued(&self) -> TokenSet {
        self.issued.clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authenticate(&self, _username: &str, password: &str) -> Result<TokenSet> {
        self.calls.authenticate.fetch_add(1, Ordering::SeqCst);
        if password != self.password {
            return Err(Error::Auth("NotAuthorizedException: Incorrect username or password.".to_string()));
        }
        Ok(self.issued.clone())
    }

    async fn renew(&self, current: &TokenSet) -> Result<TokenSet> {
        self.calls.renew.fetch_add(1, Ordering::SeqCst);
        Ok(TokenSet {
            refresh_token: current.refresh_token.clone(),
            ..self.issued.clone()
        })
    }

    async fn user_attributes(&self, _access_token: &str) -> Result<HashMap<String, String>> {
        self.calls.user_attributes.fetch_add(1, Ordering::SeqCst);
        Ok(HashMap::from([("email".to_string(), EMAIL.to_string())]))
    }

    fn jwks_url(&self) -> String {
        self.jwks_url.clone()
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
