//! Configuration management for Digestline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// The mailbox owner the digest is built for
    #[serde(default)]
    pub account: AccountConfig,

    /// Time window settings
    #[serde(default)]
    pub window: WindowConfig,

    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Analysis tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Language-model summarizer
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Outbound report delivery
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// JSON audit trail
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Token storage provider configuration
    #[serde(default)]
    pub tokens: TokenProviderConfig,
}

/// Token storage provider configuration
///
/// ```toml
/// [tokens]
/// provider = "file"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum TokenProviderConfig {
    /// Stores tokens in ~/.config/digestline/tokens/<account>.json
    #[default]
    File,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log file path
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Timezone used when rendering timestamps in the report (e.g., "Europe/Berlin")
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string())
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: default_log_file(),
            data_dir: default_data_dir(),
            timezone: default_timezone(),
        }
    }
}

/// Identity of the mailbox owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Primary address; decides inbound vs outbound
    #[serde(default)]
    pub user_address: String,

    /// Owner's display name, excluded from contact rankings
    #[serde(default)]
    pub display_name: Option<String>,

    /// Other names or addresses the owner appears under
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Time window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// How many days of history to analyze
    #[serde(default = "default_window_days")]
    pub days: i64,

    /// Page size for message listing
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How far ahead to look for important meetings
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            days: default_window_days(),
            page_size: default_page_size(),
            lookahead_days: default_lookahead_days(),
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Max parallel message fetches
    #[serde(default = "default_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Global rate limit (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,

    /// Delay after each message fetch (milliseconds)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Retries for a single message on transient HTTP errors before skipping it
    #[serde(default = "default_item_retries")]
    pub max_item_retries: u32,

    /// Max calendar events per window
    #[serde(default = "default_max_events")]
    pub max_events: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_concurrent_fetches(),
            rate_limit_per_second: default_rate_limit(),
            pacing_ms: default_pacing_ms(),
            max_item_retries: default_item_retries(),
            max_events: default_max_events(),
        }
    }
}

/// Analysis tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Inbound messages younger than this are not yet awaiting a reply
    #[serde(default = "default_awaiting_min_age_secs")]
    pub awaiting_min_age_secs: i64,

    /// Inbound messages older than this are considered abandoned
    #[serde(default = "default_awaiting_max_age_days")]
    pub awaiting_max_age_days: i64,

    /// Contacts in the output table
    #[serde(default = "default_top_n")]
    pub top_contacts: usize,

    /// Organizations in the output table
    #[serde(default = "default_top_n")]
    pub top_organizations: usize,

    /// Theme keywords extracted from the window
    #[serde(default = "default_theme_keywords")]
    pub theme_keywords: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            awaiting_min_age_secs: default_awaiting_min_age_secs(),
            awaiting_max_age_days: default_awaiting_max_age_days(),
            top_contacts: default_top_n(),
            top_organizations: default_top_n(),
            theme_keywords: default_theme_keywords(),
        }
    }
}

/// Language-model summarizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// File containing the prompt sent ahead of the data
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,

    #[serde(default = "default_summarizer_timeout_ms")]
    pub timeout_ms: u64,

    /// API root override, e.g. a regional endpoint or proxy
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            model: default_model(),
            prompt_file: None,
            timeout_ms: default_summarizer_timeout_ms(),
            base_url: None,
        }
    }
}

/// Report delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where the report goes (defaults to the account owner)
    #[serde(default)]
    pub recipient: Option<String>,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: None,
            sender_name: default_sender_name(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

/// JSON audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for digest_<timestamp>.json files (defaults to <data_dir>/digests)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    get_data_dir().join("logs").join("digestline.log")
}

fn default_data_dir() -> PathBuf {
    get_data_dir()
}

fn default_true() -> bool {
    true
}

fn default_window_days() -> i64 {
    14
}

fn default_page_size() -> u32 {
    50
}

fn default_lookahead_days() -> i64 {
    7
}

fn default_concurrent_fetches() -> usize {
    5
}

fn default_rate_limit() -> u32 {
    10
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_item_retries() -> u32 {
    2
}

fn default_max_events() -> u32 {
    100
}

fn default_awaiting_min_age_secs() -> i64 {
    3600
}

fn default_awaiting_max_age_days() -> i64 {
    14
}

fn default_top_n() -> usize {
    10
}

fn default_theme_keywords() -> usize {
    20
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_summarizer_timeout_ms() -> u64 {
    60000
}

fn default_sender_name() -> String {
    "Digestline".to_string()
}

fn default_subject_prefix() -> String {
    "Weekly Brief".to_string()
}

/// Get the data directory (XDG: ~/.local/share/digestline)
fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join(crate::APP_NAME)
}

/// Get the config directory (XDG: ~/.config/digestline)
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(crate::APP_NAME)
}

/// Longest history window a run may cover
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Longest calendar lookahead
pub const MAX_LOOKAHEAD_DAYS: i64 = 365;

fn check_range(field: &str, value: i64, range: std::ops::RangeInclusive<i64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(Error::InvalidConfig {
        field: field.to_string(),
        reason: format!(
            "{} is outside {}..={}",
            value,
            range.start(),
            range.end()
        ),
    })
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = get_config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_dir().join("config.toml");
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Check the settings a run cannot do without
    pub fn validate(&self) -> Result<()> {
        if !self.account.user_address.contains('@') {
            return Err(Error::InvalidConfig {
                field: "account.user_address".to_string(),
                reason: format!("'{}' is not an email address", self.account.user_address),
            });
        }
        check_range("window.days", self.window.days, 1..=MAX_WINDOW_DAYS)?;
        check_range(
            "window.lookahead_days",
            self.window.lookahead_days,
            0..=MAX_LOOKAHEAD_DAYS,
        )?;
        check_range(
            "analysis.awaiting_max_age_days",
            self.analysis.awaiting_max_age_days,
            1..=MAX_WINDOW_DAYS,
        )?;
        if self.analysis.awaiting_min_age_secs < 0
            || self.analysis.awaiting_min_age_secs >= self.analysis.awaiting_max_age_days * 86400
        {
            return Err(Error::InvalidConfig {
                field: "analysis.awaiting_min_age_secs".to_string(),
                reason: "grace period must be shorter than the staleness bound".to_string(),
            });
        }
        Ok(())
    }

    /// Directory the JSON audit trail is written to
    pub fn archive_dir(&self) -> PathBuf {
        self.archive
            .dir
            .clone()
            .unwrap_or_else(|| self.general.data_dir.join("digests"))
    }

    /// Directory holding stored OAuth tokens
    pub fn tokens_dir(&self) -> PathBuf {
        get_config_dir().join("tokens")
    }

    /// Where report mail is sent
    pub fn report_recipient(&self) -> &str {
        self.delivery
            .recipient
            .as_deref()
            .unwrap_or(&self.account.user_address)
    }

    /// Parsed display timezone, falling back to UTC
    pub fn display_timezone(&self) -> chrono_tz::Tz {
        self.general.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.window.days, 14);
        assert_eq!(config.window.lookahead_days, 7);
        assert_eq!(config.analysis.awaiting_min_age_secs, 3600);
        assert_eq!(config.analysis.top_contacts, 10);
        assert!(config.summarizer.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [account]
            user_address = "me@corp.com"

            [window]
            days = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.account.user_address, "me@corp.com");
        assert_eq!(config.window.days, 7);
        assert_eq!(config.window.page_size, 50);
        assert_eq!(config.retrieval.max_concurrent_fetches, 5);
        assert_eq!(config.report_recipient(), "me@corp.com");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.account.user_address = "me@corp.com".to_string();
        assert!(config.validate().is_ok());

        config.analysis.awaiting_max_age_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_window_days() {
        let mut config = Config::default();
        config.account.user_address = "me@corp.com".to_string();

        config.window.days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        for days in [0, -1, MAX_WINDOW_DAYS + 1, 200_000_000] {
            config.window.days = days;
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfig { ref field, .. }) if field == "window.days"
            ));
        }
    }

    #[test]
    fn test_validate_bounds_lookahead_days() {
        let mut config = Config::default();
        config.account.user_address = "me@corp.com".to_string();

        config.window.lookahead_days = 0;
        assert!(config.validate().is_ok());

        for days in [-1, MAX_LOOKAHEAD_DAYS + 1, 200_000_000_000_000] {
            config.window.lookahead_days = days;
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfig { ref field, .. }) if field == "window.lookahead_days"
            ));
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.account.user_address = "me@corp.com".to_string();
        config.delivery.recipient = Some("boss@corp.com".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.account.user_address, "me@corp.com");
        assert_eq!(loaded.report_recipient(), "boss@corp.com");
    }

    #[test]
    fn test_display_timezone_fallback() {
        let mut config = Config::default();
        config.general.timezone = "Not/AZone".to_string();
        assert_eq!(config.display_timezone(), chrono_tz::UTC);
        config.general.timezone = "Europe/Berlin".to_string();
        assert_eq!(config.display_timezone(), chrono_tz::Europe::Berlin);
    }
}
