use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::VerificationError;

/// Decoded token payload. Only `exp` is interpreted; everything else is kept opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub exp: i64,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Checks token signatures against the identity provider's published key set.
///
/// The key set is fetched for every verification and never cached.
pub struct TokenVerifier {
    client: reqwest::Client,
    jwks_url: String,
}

impl TokenVerifier {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), jwks_url)
    }

    pub fn with_client(client: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            client,
            jwks_url: jwks_url.into(),
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, VerificationError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerificationError::KeySetUnavailable(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| VerificationError::KeySetUnavailable(e.to_string()))
    }

    /// Verify `raw_token` and return its claims.
    ///
    /// Fails on an unknown key id, a bad signature or an expired token.
    pub async fn decode_token(&self, raw_token: &str) -> Result<Claims, VerificationError> {
        let header = decode_header(raw_token).map_err(VerificationError::MalformedHeader)?;
        let kid = header.kid.ok_or(VerificationError::MissingKeyId)?;

        let key_set = self.fetch_key_set().await?;
        let jwk = key_set
            .find(&kid)
            .ok_or_else(|| VerificationError::KeyNotFound(kid.clone()))?;
        let key = DecodingKey::from_jwk(jwk).map_err(VerificationError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        // signature and expiry only
        validation.validate_aud = false;

        let data =
            decode::<Claims>(raw_token, &key, &validation).map_err(VerificationError::InvalidToken)?;
        debug!("Verified token signed with key {}", kid);
        Ok(data.claims)
    }
}
