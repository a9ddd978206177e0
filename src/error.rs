use thiserror::Error;

/// Reasons a token could not be verified locally.
///
/// These never escape the requester: any of them simply means the token is
/// treated as expired and a refresh is attempted.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("token header could not be decoded: {0}")]
    MalformedHeader(jsonwebtoken::errors::Error),
    #[error("token header has no key id")]
    MissingKeyId,
    #[error("no key with id {0} in the published key set")]
    KeyNotFound(String),
    #[error("failed to fetch key set: {0}")]
    KeySetUnavailable(String),
    #[error("token rejected: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),
    #[error("API error: {0}")]
    Api(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_keep_category_prefix() {
        let err = Error::Config("no tokens available, must log in first".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: no tokens available, must log in first"
        );

        let err = Error::Auth("Incorrect username or password.".to_string());
        assert!(err.to_string().starts_with("Authentication error:"));
    }

    #[test]
    fn test_verification_error_converts() {
        let err: Error = VerificationError::KeyNotFound("abc".to_string()).into();
        assert!(matches!(err, Error::Verification(VerificationError::KeyNotFound(ref kid)) if kid == "abc"));
        assert_eq!(
            err.to_string(),
            "Verification error: no key with id abc in the published key set"
        );
    }
}
