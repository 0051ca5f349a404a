use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::modes::FetchErrorPolicy;
use crate::utils::parse_address;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub market: MarketConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_http: String,
    pub watched_contract: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_api_base")]
    pub api_base: String,
    #[serde(default = "default_market_link_base")]
    pub link_base: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
    #[serde(default)]
    pub chat_ids: Vec<String>,
    #[serde(default = "default_buy_link_base")]
    pub buy_link_base: String,
    #[serde(default = "default_request_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub announce_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    #[serde(default = "default_max_pending_age_ms")]
    pub max_pending_age_ms: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_fetch_error_policy")]
    pub fetch_error_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_bind")]
    pub metrics_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    /// Loads the optional TOML file at `path`, then overlays `MOONWATCH__*`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MOONWATCH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.chat_ids")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: Self = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.rpc_http.trim().is_empty() {
            return Err(Error::Invalid("chain.rpc_http is empty".to_string()));
        }
        parse_address(&self.chain.watched_contract)
            .map_err(|err| Error::Invalid(format!("chain.watched_contract: {err}")))?;
        if self.telegram.chat_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(Error::Invalid("telegram.chat_ids is empty".to_string()));
        }
        self.telegram.bot_token()?;
        FetchErrorPolicy::parse(&self.queue.fetch_error_policy)?;
        if self.queue.poll_interval_ms == 0 {
            return Err(Error::Invalid("queue.poll_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

impl TelegramConfig {
    /// Reads the bot token from the environment variable named by `bot_token_env`.
    pub fn bot_token(&self) -> Result<String> {
        std::env::var(&self.bot_token_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::Invalid(format!("{} is not set", self.bot_token_env)))
    }

    pub fn chat_ids(&self) -> Vec<String> {
        self.chat_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_base: default_market_api_base(),
            link_base: default_market_link_base(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            max_pending: default_max_pending(),
            max_pending_age_ms: default_max_pending_age_ms(),
            fetch_concurrency: default_fetch_concurrency(),
            fetch_error_policy: default_fetch_error_policy(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_bind: default_metrics_bind(),
            log_level: default_log_level(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_market_api_base() -> String {
    "https://api.dexscreener.com/latest/dex/tokens".to_string()
}

fn default_market_link_base() -> String {
    "https://dexscreener.com/abstract".to_string()
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_buy_link_base() -> String {
    "https://t.me/looter_ai_bot?start=".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    60
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_error_backoff_ms() -> u64 {
    3_000
}

fn default_max_pending() -> usize {
    1_024
}

fn default_max_pending_age_ms() -> u64 {
    600_000
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_fetch_error_policy() -> String {
    "count".to_string()
}

fn default_metrics_bind() -> String {
    "127.0.0.1:9108".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
