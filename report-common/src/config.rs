//! Configuration management for the report bot.
//!
//! The bot reads one JSON file at startup, by default `~/.report-bot/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (REPORT_* prefix, secrets only)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `REPORT_BOT_CONFIG` → path of the config file
//! - `REPORT_BOT_TOKEN` → telegram.bot_token
//! - `REPORT_DB_PASSWORD` → database.password
//! - `REPORT_LOG_LEVEL` → observability.log_level
//!
//! # Example
//!
//! ```json
//! {
//!   "telegram": { "bot_token": "123:ABC", "channel_id": -100123, "user_id": 42 },
//!   "database": { "host": "db.local", "name": "reports", "user": "bot", "password": "..." },
//!   "report": { "result_folder": "./reports" },
//!   "schedule": { "cron": "0 0 11 * * Tue-Sat" }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "REPORT_BOT_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".report-bot"),
        |dirs| dirs.home_dir().join(".report-bot"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram bot configuration.
///
/// `channel_id` and `user_id` form the allow-list: the scheduled report always
/// goes to the channel, manual requests are accepted from either identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub channel_id: i64,

    #[serde(default)]
    pub user_id: i64,

    /// Bot API base URL (overridable for tests and self-hosted API servers)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Bot command name, without the leading slash
    #[serde(default = "default_command")]
    pub command: String,

    /// Keyword regex that also triggers a report
    #[serde(default = "default_keyword_pattern")]
    pub keyword_pattern: String,

    /// Reply sent to chats outside the allow-list
    #[serde(default = "default_rejection_text")]
    pub rejection_text: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            user_id: 0,
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            command: default_command(),
            keyword_pattern: default_keyword_pattern(),
            rejection_text: default_rejection_text(),
        }
    }
}

impl TelegramConfig {
    /// Chat identities allowed to request a report.
    pub fn allowed_chats(&self) -> [i64; 2] {
        [self.channel_id, self.user_id]
    }

    /// Check whether a chat may request a report.
    pub fn is_chat_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats().contains(&chat_id)
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_command() -> String {
    "report".into()
}

fn default_keyword_pattern() -> String {
    "(?i)report".into()
}

fn default_rejection_text() -> String {
    "No permissions".into()
}

// ============================================================================
// Database
// ============================================================================

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Schema (database) name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Table listing the account identifiers that get their own sheet
    #[serde(default = "default_control_table")]
    pub control_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_db_port(),
            name: String::new(),
            user: String::new(),
            password: String::new(),
            control_table: default_control_table(),
        }
    }
}

fn default_db_port() -> u16 {
    3306
}

fn default_control_table() -> String {
    "dbt_stats_report".into()
}

// ============================================================================
// Report
// ============================================================================

/// Report output and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Folder the `{date}_report.xlsx` files are written to
    #[serde(default = "default_result_folder")]
    pub result_folder: PathBuf,

    /// Delay between failed report builds
    #[serde(default = "default_build_retry_delay_secs")]
    pub build_retry_delay_secs: u64,

    /// Delay between failed database connection attempts
    #[serde(default = "default_connect_retry_delay_secs")]
    pub connect_retry_delay_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            result_folder: default_result_folder(),
            build_retry_delay_secs: default_build_retry_delay_secs(),
            connect_retry_delay_secs: default_connect_retry_delay_secs(),
        }
    }
}

impl ReportConfig {
    pub fn build_retry_delay(&self) -> Duration {
        Duration::from_secs(self.build_retry_delay_secs)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }
}

fn default_result_folder() -> PathBuf {
    PathBuf::from("reports")
}

fn default_build_retry_delay_secs() -> u64 {
    60
}

fn default_connect_retry_delay_secs() -> u64 {
    180
}

// ============================================================================
// Schedule
// ============================================================================

/// Scheduled delivery settings.
///
/// The cron expression uses the six-field `sec min hour day month weekday`
/// format and is evaluated in local time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_report_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_report_cron(),
        }
    }
}

fn default_report_cron() -> String {
    "0 0 11 * * Tue-Sat".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Append-only log file; `None` logs to stdout only
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("report.log"))
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration, loaded once at startup and handed to each component.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("REPORT_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(password) = std::env::var("REPORT_DB_PASSWORD") {
            self.database.password = password;
        }
        if let Ok(level) = std::env::var("REPORT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }
}
