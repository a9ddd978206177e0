use dirs::home_dir;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::identity::IdentitySettings;
use crate::retry::{RetryPolicy, RetrySettings};
use crate::tokens::TokenRefreshCallback;
use crate::types::TokenSet;

pub const DEFAULT_HOST: &str = "https://api.emporiaenergy.com";
pub const DEFAULT_MAINTENANCE_URL: &str =
    "https://s3.amazonaws.com/com.emporiaenergy.manual.ota/maintenance/maintenance.json";

const TOKEN_FILE_NAME: &str = ".emvue_keys.json";

/// Client settings, usually loaded from a YAML file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub maintenance_url: String,
    pub connect_timeout_secs: f64,
    pub read_timeout_secs: f64,
    pub retry: RetrySettings,
    pub identity: IdentitySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            maintenance_url: DEFAULT_MAINTENANCE_URL.to_string(),
            connect_timeout_secs: 6.03,
            read_timeout_secs: 10.03,
            retry: RetrySettings::default(),
            identity: IdentitySettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&content)?;
        debug!("Loaded client configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot run with. Hand-built configs are
    /// checked again when a client is created.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        self.connect_timeout()?;
        self.read_timeout()?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Result<Duration> {
        timeout("connect_timeout_secs", self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Result<Duration> {
        timeout("read_timeout_secs", self.read_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

fn timeout(name: &str, secs: f64) -> Result<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(Error::Config(format!("{} must be positive, got {}", name, secs)));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{} is out of range ({}): {}", name, secs, e)))
}

/// Default location of the token file (~/.emvue_keys.json)
pub fn default_token_path() -> Result<PathBuf> {
    let home =
        home_dir().ok_or_else(|| Error::Config("Failed to determine home directory".to_string()))?;
    Ok(home.join(TOKEN_FILE_NAME))
}

/// Contents of a token file. Every key may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl StoredTokens {
    fn from_token_set(tokens: &TokenSet, username: Option<&str>) -> Self {
        let present = |value: &str| Some(value.to_string()).filter(|v| !v.is_empty());
        Self {
            access_token: present(&tokens.access_token),
            id_token: present(&tokens.id_token),
            refresh_token: present(&tokens.refresh_token),
            token_type: present(&tokens.token_type),
            username: username.map(str::to_string),
        }
    }

    /// The stored set, or `None` when the file holds no usable token.
    pub fn token_set(&self) -> Option<TokenSet> {
        let tokens = TokenSet {
            access_token: self.access_token.clone().unwrap_or_default(),
            id_token: self.id_token.clone().unwrap_or_default(),
            refresh_token: self.refresh_token.clone().unwrap_or_default(),
            token_type: self.token_type.clone().unwrap_or_default(),
        };
        (!tokens.is_empty()).then_some(tokens)
    }
}

/// JSON token file kept in sync with every refresh.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the file. A missing file is not an error and yields no tokens.
    pub fn load(&self) -> Result<StoredTokens> {
        if !self.exists() {
            debug!("Token file {} does not exist yet", self.path.display());
            return Ok(StoredTokens::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let stored: StoredTokens = serde_json::from_str(&content)?;
        debug!("Loaded tokens from {}", self.path.display());
        Ok(stored)
    }

    pub fn save(&self, tokens: &TokenSet, username: Option<&str>) -> Result<()> {
        let stored = StoredTokens::from_token_set(tokens, username);
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, content)?;
        debug!("Saved tokens to {}", self.path.display());
        Ok(())
    }

    /// Remove the file (logout)
    pub fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path)?;
            debug!("Token file {} cleared", self.path.display());
        }
        Ok(())
    }
}

impl TokenRefreshCallback for TokenFile {
    fn on_tokens_refreshed(&self, tokens: &TokenSet, username: Option<&str>) -> Result<()> {
        self.save(tokens, username)
    }
}
