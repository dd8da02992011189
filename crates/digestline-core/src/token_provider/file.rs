//! File-based token provider
//!
//! Stores tokens in ~/.config/digestline/tokens/<account>.json

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

use super::{OAuthTokens, TokenProvider};

/// JSON-file token store with an in-memory read cache
pub struct FileTokenProvider {
    dir: PathBuf,
    cache: RwLock<HashMap<String, OAuthTokens>>,
}

impl FileTokenProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `me@corp.com` -> `me_at_corp_com.json`
    fn token_path(&self, account_id: &str) -> PathBuf {
        let sanitized = account_id.replace('@', "_at_").replace('.', "_");
        self.dir.join(format!("{}.json", sanitized))
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn get_tokens(&self, account_id: &str) -> Result<Option<OAuthTokens>> {
        if let Some(tokens) = self.cache.read().get(account_id) {
            debug!("Retrieved OAuth tokens for {} from cache", account_id);
            return Ok(Some(tokens.clone()));
        }

        let path = self.token_path(account_id);
        if !path.exists() {
            debug!("No token file for {} at {:?}", account_id, path);
            return Ok(None);
        }

        let data = fs::read_to_string(&path)
            .map_err(|e| Error::Token(format!("Failed to read {:?}: {}", path, e)))?;
        let tokens: OAuthTokens = serde_json::from_str(&data)?;

        self.cache
            .write()
            .insert(account_id.to_string(), tokens.clone());
        debug!("Retrieved OAuth tokens for {} from {:?}", account_id, path);
        Ok(Some(tokens))
    }

    async fn store_tokens(&self, account_id: &str, tokens: &OAuthTokens) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.token_path(account_id);
        fs::write(&path, serde_json::to_string_pretty(tokens)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        self.cache
            .write()
            .insert(account_id.to_string(), tokens.clone());
        debug!("Stored OAuth tokens for {}", account_id);
        Ok(())
    }

    async fn delete_tokens(&self, account_id: &str) -> Result<()> {
        self.cache.write().remove(account_id);
        let path = self.token_path(account_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        debug!("Deleted OAuth tokens for {}", account_id);
        Ok(())
    }
}
