//! OAuth token storage
//!
//! Tokens live behind the [`TokenProvider`] trait so the OAuth manager and
//! the Google clients never touch storage directly.
//!
//! ```toml
//! [tokens]
//! provider = "file"
//! ```

mod file;

pub use file::FileTokenProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, TokenProviderConfig};
use crate::error::{Error, Result};

/// Stored OAuth tokens for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    pub refresh_token: String,

    /// Token expiry timestamp (Unix seconds)
    pub expires_at: i64,

    /// Token scopes
    pub scopes: Vec<String>,
}

impl OAuthTokens {
    /// Check if the access token is expired or will expire soon
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    /// Less than 5 minutes remaining counts as expired
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now + 300
    }
}

/// Trait for OAuth token storage backends
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get tokens for an account
    async fn get_tokens(&self, account_id: &str) -> Result<Option<OAuthTokens>>;

    /// Store tokens for an account
    async fn store_tokens(&self, account_id: &str, tokens: &OAuthTokens) -> Result<()>;

    /// Delete tokens for an account
    async fn delete_tokens(&self, account_id: &str) -> Result<()>;

    /// Update just the access token (after refresh)
    async fn update_access_token(
        &self,
        account_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> Result<()> {
        let mut tokens = self
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::Token("No existing tokens to update".to_string()))?;

        tokens.access_token = access_token.to_string();
        tokens.expires_at = expires_at;

        self.store_tokens(account_id, &tokens).await
    }

    /// Check if tokens exist for an account
    async fn has_tokens(&self, account_id: &str) -> Result<bool> {
        Ok(self.get_tokens(account_id).await?.is_some())
    }
}

/// Create a token provider based on configuration
pub fn create_token_provider(config: &Config) -> Arc<dyn TokenProvider> {
    match &config.tokens {
        TokenProviderConfig::File => Arc::new(FileTokenProvider::new(config.tokens_dir())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_grace_window() {
        let tokens = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 1_000,
            scopes: vec![],
        };
        assert!(!tokens.is_expired_at(600));
        assert!(tokens.is_expired_at(701));
        assert!(tokens.is_expired_at(2_000));
    }
}
