//! Identity provider seam and the hosted user-pool implementation.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::TokenSet;

pub const DEFAULT_REGION: &str = "us-east-2";
pub const DEFAULT_USER_POOL_ID: &str = "us-east-2_ghlOXVLi1";
pub const DEFAULT_CLIENT_ID: &str = "4qte47jbstod8apnfic0bunmrq";

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// The only component allowed to mint tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Full username/password authentication.
    async fn authenticate(&self, username: &str, password: &str) -> Result<TokenSet>;

    /// Exchange the refresh token in `current` for a new set.
    async fn renew(&self, current: &TokenSet) -> Result<TokenSet>;

    /// Attributes of the user owning `access_token` (e.g. `email`).
    async fn user_attributes(&self, access_token: &str) -> Result<HashMap<String, String>>;

    /// Where the provider publishes its signing keys.
    fn jwks_url(&self) -> String;
}

/// User-pool coordinates, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    /// Overrides the regional service endpoint (used for local testing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            user_pool_id: DEFAULT_USER_POOL_ID.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            endpoint: None,
        }
    }
}

impl IdentitySettings {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://cognito-idp.{}.amazonaws.com", self.region),
        }
    }

    pub fn user_pool_url(&self) -> String {
        format!("{}/{}", self.endpoint(), self.user_pool_id)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    #[serde(default)]
    user_attributes: Vec<UserAttribute>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserAttribute {
    name: String,
    value: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Hosted user pool spoken to over its JSON API.
pub struct CognitoIdentityProvider {
    client: reqwest::Client,
    settings: IdentitySettings,
}

impl CognitoIdentityProvider {
    pub fn new(settings: IdentitySettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: IdentitySettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &IdentitySettings {
        &self.settings
    }

    fn headers(action: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON));
        headers.insert(
            "x-amz-target",
            HeaderValue::from_str(&format!("{}.{}", TARGET_PREFIX, action))?,
        );
        Ok(headers)
    }

    async fn call<B: Serialize + ?Sized>(&self, action: &str, body: &B) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/", self.settings.endpoint()))
            .headers(Self::headers(action)?)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            return Ok(response_text);
        }

        let detail = serde_json::from_str::<ErrorResponse>(&response_text).ok();
        let kind = detail
            .as_ref()
            .and_then(|d| d.kind.as_deref())
            .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
            .unwrap_or_else(|| status.to_string());
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| response_text.clone());

        if status.is_client_error() {
            debug!("{} rejected with {}", action, kind);
            Err(Error::Auth(format!("{}: {}", kind, message)))
        } else {
            error!("{} failed with status {}", action, status);
            Err(Error::Api(format!("{} failed ({}): {}", action, status, message)))
        }
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: HashMap<&str, &str>,
    ) -> Result<AuthenticationResult> {
        let request = InitiateAuthRequest {
            auth_flow: flow,
            client_id: &self.settings.client_id,
            auth_parameters: parameters,
        };
        let response_text = self.call("InitiateAuth", &request).await?;
        let response: InitiateAuthResponse = serde_json::from_str(&response_text)?;

        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(result),
            (None, Some(challenge)) => Err(Error::Auth(format!(
                "unsupported authentication challenge: {}",
                challenge
            ))),
            (None, None) => Err(Error::Auth(
                "identity provider returned no tokens".to_string(),
            )),
        }
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<TokenSet> {
        debug!("Authenticating user: {}", username);
        let parameters = HashMap::from([("USERNAME", username), ("PASSWORD", password)]);
        let result = self.initiate_auth("USER_PASSWORD_AUTH", parameters).await?;

        Ok(TokenSet {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token: result.refresh_token.unwrap_or_default(),
            token_type: result.token_type.unwrap_or_default(),
        })
    }

    async fn renew(&self, current: &TokenSet) -> Result<TokenSet> {
        if current.refresh_token.is_empty() {
            return Err(Error::Auth(
                "no refresh token available, must log in again".to_string(),
            ));
        }
        let parameters = HashMap::from([("REFRESH_TOKEN", current.refresh_token.as_str())]);
        let result = self.initiate_auth("REFRESH_TOKEN_AUTH", parameters).await?;

        // renewal usually leaves the refresh token unchanged and omits it
        Ok(TokenSet {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token: result
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            token_type: result
                .token_type
                .unwrap_or_else(|| current.token_type.clone()),
        })
    }

    async fn user_attributes(&self, access_token: &str) -> Result<HashMap<String, String>> {
        let response_text = self.call("GetUser", &GetUserRequest { access_token }).await?;
        let response: GetUserResponse = serde_json::from_str(&response_text)?;
        Ok(response
            .user_attributes
            .into_iter()
            .filter_map(|attr| attr.value.map(|value| (attr.name, value)))
            .collect())
    }

    fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.settings.user_pool_url())
    }
}
