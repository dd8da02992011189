//! Error types for Digestline

use thiserror::Error;

/// Result type alias using Digestline's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Digestline
#[derive(Error, Debug)]
pub enum Error {
    // Authentication errors
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Token expired for account {account}")]
    TokenExpired { account: String },

    #[error("Token refresh failed for account {account}: {reason}")]
    TokenRefreshFailed { account: String, reason: String },

    #[error("Token storage error: {0}")]
    Token(String),

    // Retrieval errors
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Failed to retrieve {kind} {id}: {reason}")]
    RetrievalItem {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Google API returned {status}: {body}")]
    Api { status: u16, body: String },

    // Parse errors
    #[error("Could not normalize record {id}: {reason}")]
    Normalize { id: String, reason: String },

    // Collaborator errors
    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Rate limiting
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Returns true if this error indicates the user needs to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::TokenExpired { .. } | Error::TokenRefreshFailed { .. }
        )
    }

    /// Returns true if the run cannot continue past this error.
    ///
    /// Per-item retrieval, parse, summarizer and delivery failures are
    /// recovered locally; everything that stops us from listing or
    /// authenticating is not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::RetrievalItem { .. }
                | Error::Normalize { .. }
                | Error::Summarizer(_)
                | Error::Delivery(_)
        )
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns a user-friendly action message for recoverable errors
    pub fn action_hint(&self) -> Option<&'static str> {
        match self {
            Error::TokenExpired { .. } | Error::TokenRefreshFailed { .. } => {
                Some("Run `digestline auth` to re-authenticate")
            }
            Error::RateLimited { .. } => Some("Please wait and try again"),
            Error::Retrieval(_) => Some("Check your network connection"),
            _ => None,
        }
    }
}
