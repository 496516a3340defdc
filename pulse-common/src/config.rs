//! Configuration types for Pulse services.
//!
//! Every value has a default matching the fixed constants the quote resolver
//! has always used, so a missing config file yields a working setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path (`~/.pulse`).
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".pulse"),
        |dirs| dirs.home_dir().join(".pulse"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Quote resolution configuration
    #[serde(default)]
    pub quotes: QuotesConfig,

    /// Watchlist polling configuration
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PULSE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("PULSE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(list) = std::env::var("PULSE_WATCHLIST") {
            let symbols = parse_symbol_list(&list);
            if !symbols.is_empty() {
                self.watch.symbols = symbols;
            }
        }
    }
}

/// Split a comma-separated symbol list, dropping blanks.
pub fn parse_symbol_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
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
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Quote Resolution
// ============================================================================

/// Quote resolution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotesConfig {
    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Dispatcher retry settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Bulk snapshot source settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Single-symbol backup endpoint settings
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of market snapshots kept
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Seconds a snapshot stays fresh after it was fetched
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl_secs() -> u64 {
    120
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Dispatcher retry settings, applied to each resolver independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Calls made to one resolver before moving on
    #[serde(default = "default_attempts_per_resolver")]
    pub attempts_per_resolver: u32,

    /// Linear backoff step; the n-th retry waits `n * step`
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

fn default_attempts_per_resolver() -> u32 {
    2
}

fn default_backoff_step_ms() -> u64 {
    500
}

impl DispatchConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attempts_per_resolver: default_attempts_per_resolver(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

/// Bulk snapshot (full market list) source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Full-market list endpoint
    #[serde(default = "default_snapshot_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Rows requested per page; the list is fetched page by page up to its `total`
    #[serde(default = "default_snapshot_page_size")]
    pub page_size: usize,
}

fn default_snapshot_page_size() -> usize {
    100
}

fn default_snapshot_endpoint() -> String {
    "https://82.push2.eastmoney.com/api/qt/clist/get".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            endpoint: default_snapshot_endpoint(),
            timeout_secs: default_request_timeout_secs(),
            page_size: default_snapshot_page_size(),
        }
    }
}

/// Single-symbol backup endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Single-symbol quote endpoint
    #[serde(default = "default_backup_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level attempts per request
    #[serde(default = "default_transport_attempts")]
    pub max_attempts: u32,

    /// Exponential backoff factor; the n-th retry waits `factor * 2^(n-1)`
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,

    /// HTTP statuses worth retrying
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

fn default_backup_endpoint() -> String {
    "https://push2.eastmoney.com/api/qt/stock/get".to_string()
}

fn default_transport_attempts() -> u32 {
    3
}

fn default_backoff_factor_ms() -> u64 {
    1000
}

fn default_retry_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

impl BackupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_factor(&self) -> Duration {
        Duration::from_millis(self.backoff_factor_ms)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backup_endpoint(),
            timeout_secs: default_request_timeout_secs(),
            max_attempts: default_transport_attempts(),
            backoff_factor_ms: default_backoff_factor_ms(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

// ============================================================================
// Watchlist Polling
// ============================================================================

/// Watchlist polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Symbols polled every cycle, in order
    #[serde(default = "default_watch_symbols")]
    pub symbols: Vec<String>,

    /// Target length of one polling cycle in seconds
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: u64,

    /// Pause between two symbols of the same cycle
    #[serde(default = "default_symbol_delay_ms")]
    pub symbol_delay_ms: u64,

    /// Trading session bounds
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Price alerts evaluated on every resolved quote
    #[serde(default = "default_alerts")]
    pub alerts: Vec<AlertConfig>,
}

fn default_watch_symbols() -> Vec<String> {
    ["002261", "000977", "600133", "600588", "002747", "601012"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cycle_secs() -> u64 {
    180
}

fn default_symbol_delay_ms() -> u64 {
    500
}

fn default_alerts() -> Vec<AlertConfig> {
    vec![AlertConfig {
        symbol: "600133".to_string(),
        threshold: 10.9,
        direction: AlertDirection::Above,
    }]
}

impl WatchConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }

    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            symbols: default_watch_symbols(),
            cycle_secs: default_cycle_secs(),
            symbol_delay_ms: default_symbol_delay_ms(),
            sessions: SessionsConfig::default(),
            alerts: default_alerts(),
        }
    }
}

/// Trading session bounds in local exchange time (HH:MM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_morning_open")]
    pub morning_open: String,

    #[serde(default = "default_morning_close")]
    pub morning_close: String,

    #[serde(default = "default_afternoon_open")]
    pub afternoon_open: String,

    #[serde(default = "default_afternoon_close")]
    pub afternoon_close: String,
}

fn default_morning_open() -> String {
    "09:30".to_string()
}
fn default_morning_close() -> String {
    "11:30".to_string()
}
fn default_afternoon_open() -> String {
    "13:00".to_string()
}
fn default_afternoon_close() -> String {
    "15:00".to_string()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            morning_open: default_morning_open(),
            morning_close: default_morning_close(),
            afternoon_open: default_afternoon_open(),
            afternoon_close: default_afternoon_close(),
        }
    }
}

/// Which side of the threshold triggers an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Trigger when price >= threshold
    #[default]
    Above,
    /// Trigger when price <= threshold
    Below,
}

/// A price alert on one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub symbol: String,
    pub threshold: f64,
    #[serde(default)]
    pub direction: AlertDirection,
}

// ============================================================================
// Tests
// ============================================================================
