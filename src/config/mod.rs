//! Configuration for the pump-shield trader

pub mod rpc;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Environment variables that override file/default settings
pub mod env_vars {
    pub const MAX_SOL_PER_TRADE: &str = "MAX_SOL_PER_TRADE";
    pub const JITO_RELAY_URL: &str = "JITO_RELAY_URL";
    pub const PUMP_API_URL: &str = "PUMP_API_URL";
    pub const WALLET_FILE: &str = "WALLET_FILE";
}

/// Trade sizing, pacing and admission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Smallest accepted buy (SOL)
    pub min_sol_per_trade: f64,
    /// Per-trade ceiling (SOL); randomized amounts are clamped to it
    pub max_sol_per_trade: f64,
    /// Absolute cap on the random amount variation (SOL)
    pub max_amount_jitter_sol: f64,
    /// Relative cap on the random amount variation (fraction of the amount)
    pub amount_jitter_fraction: f64,
    /// Lower bound of the pre-trade pacing delay (milliseconds)
    pub pacing_min_ms: u64,
    /// Upper bound of the pre-trade pacing delay (milliseconds)
    pub pacing_max_ms: u64,
    /// Minimum seconds between two accepted requests from one caller
    pub cooldown_seconds: u64,
    /// Default number of buy/sell rounds in a trading loop
    pub loop_rounds: u32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_sol_per_trade: 0.001,
            max_sol_per_trade: 1.0,
            max_amount_jitter_sol: 0.02,
            amount_jitter_fraction: 0.10,
            pacing_min_ms: 500,
            pacing_max_ms: 3_000,
            cooldown_seconds: 5,
            loop_rounds: 5,
        }
    }
}

impl TradingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Rug-risk scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Base URL of the token metadata API (`{base}/coins/{mint}`)
    pub metadata_url: String,
    /// Bound on the metadata request (milliseconds)
    pub timeout_ms: u64,
    /// 24h volume below this counts as a risk factor
    pub min_volume: f64,
    /// Holder count below this counts as a risk factor
    pub min_holders: u64,
    /// Market cap below this counts as a risk factor
    pub min_market_cap: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            metadata_url: "https://api.pump.fun".to_string(),
            timeout_ms: 10_000,
            min_volume: 1_000.0,
            min_holders: 50,
            min_market_cap: 10_000.0,
        }
    }
}

impl RiskConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Bundle relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// JSON-RPC endpoint accepting `sendBundle`
    pub url: String,
    /// Bound on a single submission (milliseconds)
    pub timeout_ms: u64,
    /// Total submission attempts, including the first
    pub max_attempts: u32,
    /// Backoff before retry `n` is `base_delay_ms * 2^n`
    pub base_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "https://mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
            timeout_ms: 30_000,
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sizing, pacing and cooldown
    pub trading: TradingConfig,
    /// Risk scoring
    pub risk: RiskConfig,
    /// Bundle relay
    pub relay: RelayConfig,
    /// RPC endpoints
    pub rpc: RpcConfig,
    /// Path to the wallet registry file
    pub wallet_file: String,
    /// Path to the trade audit log (JSONL); `None` disables it
    pub audit_log_path: Option<String>,
    /// Prefix for result links (`{explorer_url}/{bundle_id}`)
    pub explorer_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            risk: RiskConfig::default(),
            relay: RelayConfig::default(),
            rpc: RpcConfig::default(),
            wallet_file: "wallets.json".to_string(),
            audit_log_path: Some("trades.jsonl".to_string()),
            explorer_url: "https://solscan.io/tx".to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file (or defaults), apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            None => Config::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoints) = RpcConfig::endpoints_from(&lookup) {
            self.rpc.endpoints = endpoints;
        }
        if let Some(raw) = lookup(env_vars::MAX_SOL_PER_TRADE) {
            self.trading.max_sol_per_trade = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a number, got {:?}",
                    env_vars::MAX_SOL_PER_TRADE,
                    raw
                ))
            })?;
        }
        if let Some(url) = lookup(env_vars::JITO_RELAY_URL) {
            self.relay.url = url;
        }
        if let Some(url) = lookup(env_vars::PUMP_API_URL) {
            self.risk.metadata_url = url;
        }
        if let Some(path) = lookup(env_vars::WALLET_FILE) {
            self.wallet_file = path;
        }
        Ok(())
    }

    /// Reject settings the trader cannot run with
    pub fn validate(&self) -> Result<()> {
        let trading = &self.trading;
        if !(trading.min_sol_per_trade > 0.0) {
            return Err(Error::Config("min_sol_per_trade must be positive".into()));
        }
        if !(trading.max_sol_per_trade >= trading.min_sol_per_trade) {
            return Err(Error::Config(format!(
                "max_sol_per_trade ({}) is below min_sol_per_trade ({})",
                trading.max_sol_per_trade, trading.min_sol_per_trade
            )));
        }
        if trading.pacing_min_ms > trading.pacing_max_ms {
            return Err(Error::Config(
                "pacing_min_ms must not exceed pacing_max_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&trading.amount_jitter_fraction) || trading.max_amount_jitter_sol < 0.0
        {
            return Err(Error::Config("amount jitter bounds are out of range".into()));
        }
        if self.relay.max_attempts == 0 {
            return Err(Error::Config("relay.max_attempts must be at least 1".into()));
        }
        if self.rpc.endpoints.is_empty() {
            return Err(Error::Config("at least one RPC endpoint is required".into()));
        }

        check_url("relay.url", &self.relay.url)?;
        check_url("risk.metadata_url", &self.risk.metadata_url)?;
        for endpoint in &self.rpc.endpoints {
            check_url("rpc.endpoints", endpoint)?;
        }
        Ok(())
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}
