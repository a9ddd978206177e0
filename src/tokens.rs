use log::{debug, warn};
use std::sync::Arc;

use crate::error::Result;
use crate::types::TokenSet;

/// Trait for callbacks when tokens are refreshed
pub trait TokenRefreshCallback: Send + Sync {
    fn on_tokens_refreshed(&self, tokens: &TokenSet, username: Option<&str>) -> Result<()>;
}

/// In-memory holder of the current [`TokenSet`].
///
/// Every replacement is forwarded to the persistence callback, if one is set.
#[derive(Default)]
pub struct TokenStore {
    tokens: Option<TokenSet>,
    on_refresh: Option<Arc<dyn TokenRefreshCallback>>,
}

impl TokenStore {
    pub fn new(
        tokens: Option<TokenSet>,
        on_refresh: Option<Arc<dyn TokenRefreshCallback>>,
    ) -> Self {
        Self {
            tokens: tokens.filter(|t| !t.is_empty()),
            on_refresh,
        }
    }

    pub fn current(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_none()
    }

    /// Swap in a new set and hand it to the persistence callback.
    ///
    /// Persistence failures are logged; the in-memory set is replaced regardless.
    pub fn replace(&mut self, tokens: TokenSet, username: Option<&str>) {
        self.tokens = Some(tokens);
        self.persist(username);
    }

    /// Re-run the persistence callback with the current set.
    pub fn persist(&self, username: Option<&str>) {
        let (Some(tokens), Some(callback)) = (&self.tokens, &self.on_refresh) else {
            return;
        };
        match callback.on_tokens_refreshed(tokens, username) {
            Ok(()) => debug!("Persisted refreshed tokens"),
            Err(e) => warn!("Failed to persist refreshed tokens: {}", e),
        }
    }
}
