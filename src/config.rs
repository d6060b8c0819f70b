use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::OrderType;

pub const ENV_PREFIX: &str = "SIGNAL";
/// Risk counters reset at the UTC day boundary, so longer cooldowns mean nothing.
pub const MAX_COOLDOWN_SECONDS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Secret resolution failed: {0}")]
    Secret(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub mode: ModeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub trading: TradingConfig,
    pub parser: ParserConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub latency: LatencyBudget,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub target_overrides: HashMap<String, AssetOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModeConfig {
    pub exchange: String,
    pub environment: String,
    pub market_type: String,
    /// Replaces the environment's REST endpoint (proxies, mocks).
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: SecretRef,
    #[serde(default)]
    pub api_secret: SecretRef,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    pub default_base_notional: Decimal,
    pub max_notional: Decimal,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    #[serde(default)]
    pub slippage_bps: u32,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_order_type() -> String {
    "market".to_string()
}

fn default_max_in_flight() -> usize {
    1
}

impl TradingConfig {
    pub fn order_type(&self) -> Result<OrderType, ConfigError> {
        match self.order_type.to_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Err(ConfigError::Invalid(
                "trading.order_type 'limit' needs a price source; only 'market' is supported"
                    .to_string(),
            )),
            other => Err(ConfigError::Invalid(format!(
                "trading.order_type must be 'market', got {:?}",
                other
            ))),
        }
    }
}

/// Template rules for the signal parser.
#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    #[serde(default)]
    pub required_tokens: Vec<String>,
    pub link_host: String,
    pub link_path_prefix: String,
    pub pair_separator: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    #[serde(default = "default_update_batch")]
    pub max_update_batch: u32,
    #[serde(default)]
    pub bot_token: SecretRef,
    /// Bot API root, overridable for tests.
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_update_batch() -> u32 {
    100
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_chat_ids: Vec::new(),
            poll_timeout_seconds: default_poll_timeout(),
            max_update_batch: default_update_batch(),
            bot_token: SecretRef::default(),
            api_base: default_telegram_api(),
        }
    }
}

/// Zero disables the corresponding limit.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RiskConfig {
    #[serde(default)]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub max_daily_trades: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LatencyBudget {
    #[serde(default)]
    pub parse_budget_ms: u64,
    #[serde(default)]
    pub order_budget_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub http_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            http_port: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AssetOverride {
    #[serde(default)]
    pub max_notional: Decimal,
    #[serde(default)]
    pub default_base_notional: Decimal,
}

/// How to obtain a secret: `env:NAME`, `file:/path`, or the literal value.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(from = "String")]
pub struct SecretRef(String);

impl From<String> for SecretRef {
    fn from(value: String) -> Self {
        SecretRef(value.trim().to_string())
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.starts_with("env:") || self.0.starts_with("file:") {
            write!(f, "SecretRef({:?})", self.0)
        } else if self.0.is_empty() {
            write!(f, "SecretRef(<empty>)")
        } else {
            write!(f, "SecretRef(<literal>)")
        }
    }
}

impl SecretRef {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve into the trimmed secret value.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        let raw = if let Some(key) = self.0.strip_prefix("env:") {
            if key.is_empty() {
                return Err(ConfigError::Secret("empty env key".to_string()));
            }
            env::var(key).map_err(|_| ConfigError::Secret(format!("env var {} not set", key)))?
        } else if let Some(path) = self.0.strip_prefix("file:") {
            fs::read_to_string(Path::new(path))
                .map_err(|e| ConfigError::Secret(format!("read secret file {}: {}", path, e)))?
        } else {
            self.0.clone()
        };
        let value = raw.trim().to_string();
        if value.is_empty() {
            return Err(ConfigError::Secret("secret resolved to an empty value".to_string()));
        }
        Ok(value)
    }
}

/// Exchange credentials after secret resolution.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Settings {
    /// Load from a TOML file, then apply `SIGNAL_SECTION__KEY` environment overrides.
    /// `force_dry_run` wins over both.
    pub fn load(path: &str, force_dry_run: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::new(path, FileFormat::Toml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        if force_dry_run {
            builder = builder.set_override("debug.dry_run", true)?;
        }

        Self::finish(builder.build()?.try_deserialize()?)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;

        Self::finish(s.try_deserialize()?)
    }

    fn finish(mut settings: Settings) -> Result<Self, ConfigError> {
        // Symbols are matched uppercase; the loader may have folded key case.
        settings.target_overrides = settings
            .target_overrides
            .into_iter()
            .map(|(symbol, ov)| (symbol.to_uppercase(), ov))
            .collect();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.mode.exchange != "mexc" {
            return invalid(format!("unsupported exchange {:?}", self.mode.exchange));
        }
        match self.mode.environment.as_str() {
            "testnet" | "live" => {}
            other => {
                return invalid(format!(
                    "environment must be testnet or live, got {:?}",
                    other
                ))
            }
        }
        match self.mode.market_type.as_str() {
            "spot" | "futures" => {}
            other => {
                return invalid(format!(
                    "market_type must be spot or futures, got {:?}",
                    other
                ))
            }
        }

        if self.trading.default_base_notional <= Decimal::ZERO {
            return invalid("default_base_notional must be positive".to_string());
        }
        if self.trading.max_notional < self.trading.default_base_notional {
            return invalid("max_notional must be >= default_base_notional".to_string());
        }
        if self.trading.max_in_flight == 0 {
            return invalid("trading.max_in_flight must be >= 1".to_string());
        }
        self.trading.order_type()?;

        if self.parser.link_host.is_empty() || self.parser.link_path_prefix.is_empty() {
            return invalid("parser link_host and link_path_prefix required".to_string());
        }
        if self.parser.pair_separator.is_empty() {
            return invalid("parser pair_separator required".to_string());
        }

        if self.telegram.enabled {
            if self.telegram.poll_timeout_seconds == 0 {
                return invalid(
                    "telegram poll_timeout_seconds must be > 0 when enabled".to_string(),
                );
            }
            if self.telegram.bot_token.is_empty() {
                return invalid("telegram bot_token must be provided when enabled".to_string());
            }
        }

        if self.risk.cooldown_seconds > MAX_COOLDOWN_SECONDS {
            return invalid(format!(
                "risk.cooldown_seconds must be <= {}, got {}",
                MAX_COOLDOWN_SECONDS, self.risk.cooldown_seconds
            ));
        }

        for (symbol, ov) in &self.target_overrides {
            if ov.max_notional < Decimal::ZERO || ov.default_base_notional < Decimal::ZERO {
                return invalid(format!("target_overrides.{} values must be >= 0", symbol));
            }
        }

        if !self.debug.dry_run && (self.auth.api_key.is_empty() || self.auth.api_secret.is_empty())
        {
            return invalid("auth api_key/api_secret required for live trading".to_string());
        }

        Ok(())
    }

    /// Resolve exchange credentials. Only needed when trading live.
    pub fn resolve_credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            api_key: self.auth.api_key.resolve()?,
            api_secret: self.auth.api_secret.resolve()?,
        })
    }
}
