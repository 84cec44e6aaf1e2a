use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "data/logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Daily run time in HH:MM format (default: "09:00")
    #[serde(default = "default_run_time")]
    pub run_time: String,
    /// How many artists are searched concurrently (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Per-request timeout in seconds for provider calls (default: 20)
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    /// Attempts per provider call before skipping it for this cycle (default: 2)
    #[serde(default = "default_search_attempts")]
    pub search_attempts: u32,
    /// Optional country restriction forwarded to providers that take one
    #[serde(default)]
    pub search_country: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_time: default_run_time(),
            worker_count: default_worker_count(),
            request_timeout_sec: default_request_timeout_sec(),
            search_attempts: default_search_attempts(),
            search_country: None,
        }
    }
}

fn default_run_time() -> String {
    "09:00".to_string()
}

fn default_worker_count() -> usize {
    4
}

fn default_request_timeout_sec() -> u64 {
    20
}

fn default_search_attempts() -> u32 {
    2
}

impl SchedulerConfig {
    /// Parse run_time into (hour, minute), rejecting malformed values
    pub fn run_time_parts(&self) -> Result<(u32, u32)> {
        let (h, m) = self
            .run_time
            .split_once(':')
            .with_context(|| format!("Invalid run_time (expected HH:MM): {}", self.run_time))?;
        let hour: u32 = h
            .parse()
            .with_context(|| format!("Invalid hour in run_time: {}", self.run_time))?;
        let minute: u32 = m
            .parse()
            .with_context(|| format!("Invalid minute in run_time: {}", self.run_time))?;
        if hour > 23 || minute > 59 {
            anyhow::bail!("run_time out of range: {}", self.run_time);
        }
        Ok((hour, minute))
    }
}

/// Provider credentials. A section left out of the config disables that
/// service globally.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ticketmaster: Option<TicketmasterConfig>,
    #[serde(default)]
    pub spotify: Option<SpotifyConfig>,
    #[serde(default)]
    pub setlistfm: Option<SetlistFmConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TicketmasterConfig {
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SetlistFmConfig {
    pub api_key: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("CONCERT").separator("__"));

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn log_level(&self) -> tracing::Level {
        match self.logging.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}
