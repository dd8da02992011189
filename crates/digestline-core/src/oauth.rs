//! OAuth 2.0 installed-app flow for Google

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::token_provider::{OAuthTokens, TokenProvider};

/// Port the local callback listener binds to
pub const CALLBACK_PORT: u16 = 8085;

/// Google OAuth client configuration
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        let (client_id, client_secret) = Self::load_credentials();
        Self {
            client_id,
            client_secret,
            redirect_uri: format!("http://localhost:{}/oauth/callback", CALLBACK_PORT),
        }
    }
}

impl GoogleOAuthConfig {
    /// Load OAuth credentials from env vars or ~/.secrets file
    fn load_credentials() -> (String, String) {
        let client_id = std::env::var("DIGESTLINE_CLIENT_ID")
            .or_else(|_| std::env::var("GOOGLE_CLIENT_ID"))
            .ok();
        let client_secret = std::env::var("DIGESTLINE_CLIENT_SECRET")
            .or_else(|_| std::env::var("GOOGLE_CLIENT_SECRET"))
            .ok();

        if let (Some(id), Some(secret)) = (client_id, client_secret) {
            return (id, secret);
        }

        if let Some(home) = dirs::home_dir() {
            if let Ok(contents) = std::fs::read_to_string(home.join(".secrets")) {
                if let (Some(id), Some(secret)) = Self::parse_secrets_file(&contents) {
                    return (id, secret);
                }
            }
        }

        ("YOUR_CLIENT_ID".to_string(), "YOUR_CLIENT_SECRET".to_string())
    }

    /// Parse `export NAME="value"` lines
    fn parse_secrets_file(contents: &str) -> (Option<String>, Option<String>) {
        let mut client_id = None;
        let mut client_secret = None;

        for line in contents.lines() {
            let Some(rest) = line.trim().strip_prefix("export ") else {
                continue;
            };
            let Some((key, value)) = rest.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "DIGESTLINE_CLIENT_ID" | "GOOGLE_CLIENT_ID" => client_id = Some(value.to_string()),
                "DIGESTLINE_CLIENT_SECRET" | "GOOGLE_CLIENT_SECRET" => {
                    client_secret = Some(value.to_string())
                }
                _ => {}
            }
        }

        (client_id, client_secret)
    }
}

/// Read-only mail and calendar, plus send for report delivery
pub const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Response from Google token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
}

/// User info from Google
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: Option<String>,
}

/// OAuth manager for handling Google authentication
pub struct OAuthManager {
    config: GoogleOAuthConfig,
    client: Client,
    token_provider: Arc<dyn TokenProvider>,
}

impl OAuthManager {
    pub fn new(token_provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_config(GoogleOAuthConfig::default(), token_provider)
    }

    pub fn with_config(config: GoogleOAuthConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            config,
            client: Client::new(),
            token_provider,
        }
    }

    /// Generate the OAuth authorization URL
    pub fn authorization_url(&self, state: &str) -> String {
        let scopes = OAUTH_SCOPES.join(" ");
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            encode(&self.config.client_id),
            encode(&self.config.redirect_uri),
            encode(&scopes),
            encode(state)
        )
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<(OAuthTokens, UserInfo)> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);
            return Err(Error::OAuth(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = chrono::Utc::now().timestamp() + token_response.expires_in;

        let tokens = OAuthTokens {
            access_token: token_response.access_token.clone(),
            refresh_token: token_response
                .refresh_token
                .ok_or_else(|| Error::OAuth("No refresh token in response".to_string()))?,
            expires_at,
            scopes: token_response
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_else(|| OAUTH_SCOPES.iter().map(|s| s.to_string()).collect()),
        };

        let user_info = self.get_user_info(&token_response.access_token).await?;
        info!("Authenticated as {}", user_info.email);

        Ok((tokens, user_info))
    }

    /// Refresh an access token and persist the result
    pub async fn refresh_token(&self, account_id: &str) -> Result<OAuthTokens> {
        let current = self
            .token_provider
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::TokenExpired {
                account: account_id.to_string(),
            })?;

        debug!("Refreshing access token for {}", account_id);

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", current.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed for {}: {} - {}", account_id, status, body);
            return Err(Error::TokenRefreshFailed {
                account: account_id.to_string(),
                reason: format!("{} - {}", status, body),
            });
        }

        let token_response: TokenResponse = response.json().await?;
        let new_tokens = OAuthTokens {
            access_token: token_response.access_token,
            refresh_token: token_response
                .refresh_token
                .unwrap_or(current.refresh_token),
            expires_at: chrono::Utc::now().timestamp() + token_response.expires_in,
            scopes: current.scopes,
        };

        self.token_provider
            .store_tokens(account_id, &new_tokens)
            .await?;
        info!("Refreshed access token for {}", account_id);

        Ok(new_tokens)
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!(
                "Failed to get user info: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn get_valid_token(&self, account_id: &str) -> Result<String> {
        let tokens = self
            .token_provider
            .get_tokens(account_id)
            .await?
            .ok_or_else(|| Error::TokenExpired {
                account: account_id.to_string(),
            })?;

        if tokens.is_expired() {
            info!("Token expired for {}, refreshing...", account_id);
            Ok(self.refresh_token(account_id).await?.access_token)
        } else {
            debug!("Token still valid for {}", account_id);
            Ok(tokens.access_token)
        }
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.token_provider
    }
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Extract `code` from the callback request line, checking `state`
pub fn parse_callback(request_line: &str, expected_state: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::OAuth("Malformed callback request".to_string()))?;
    let parsed = url::Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| Error::OAuth(format!("Malformed callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(Error::OAuth(format!("Authorization denied: {}", value))),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(Error::OAuth("State mismatch in OAuth callback".to_string()));
    }
    code.ok_or_else(|| Error::OAuth("No authorization code in callback".to_string()))
}
