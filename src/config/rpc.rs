//! RPC endpoint configuration
//!
//! Endpoints are resolved in this order:
//! 1. `SOLANA_RPC_URLS` - comma separated list, highest priority
//! 2. `SOLANA_RPC_URL` - a single endpoint
//! 3. Public mainnet fallbacks (rate limited, for testing only)
//!
//! # Examples
//!
//! ```bash
//! # Option 1: several private endpoints, probed in random order
//! export SOLANA_RPC_URLS="https://mainnet.helius-rpc.com/?api-key=KEY,https://rpc.ankr.com/solana/KEY"
//!
//! # Option 2: a single endpoint
//! export SOLANA_RPC_URL="https://mainnet.helius-rpc.com/?api-key=KEY"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable names
pub mod env_vars {
    pub const SOLANA_RPC_URLS: &str = "SOLANA_RPC_URLS";
    pub const SOLANA_RPC_URL: &str = "SOLANA_RPC_URL";
}

/// Public RPC endpoints (rate limited, for testing only)
pub mod public_rpcs {
    pub const ENDPOINTS: &[&str] = &[
        "https://api.mainnet-beta.solana.com",
        "https://solana-api.projectserum.com",
        "https://rpc.ankr.com/solana",
        "https://solana-mainnet.g.alchemy.com/v2/demo",
    ];
}

/// RPC endpoint list plus per-call timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Candidate endpoints; the first one is the unconditional fallback
    pub endpoints: Vec<String>,
    /// Bound on a single `getHealth` probe (milliseconds)
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    /// Bound on every other RPC request (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl RpcConfig {
    /// Create RPC config from environment variables
    pub fn from_env() -> Self {
        let endpoints =
            Self::endpoints_from(|name| std::env::var(name).ok()).unwrap_or_else(|| {
                tracing::warn!("No RPC configured, using public Solana RPCs (rate limited)");
                public_rpcs::ENDPOINTS.iter().map(|s| s.to_string()).collect()
            });

        Self::with_endpoints(endpoints)
    }

    /// Endpoints named by `SOLANA_RPC_URLS` or `SOLANA_RPC_URL`, if either is set
    pub fn endpoints_from<F>(lookup: F) -> Option<Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup(env_vars::SOLANA_RPC_URLS) {
            let endpoints: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !endpoints.is_empty() {
                tracing::debug!(count = endpoints.len(), "Using SOLANA_RPC_URLS");
                return Some(endpoints);
            }
        }

        if let Some(url) = lookup(env_vars::SOLANA_RPC_URL) {
            let url = url.trim();
            if !url.is_empty() {
                tracing::debug!("Using SOLANA_RPC_URL");
                return Some(vec![url.to_string()]);
            }
        }

        None
    }

    /// Create with explicit endpoints and default timeouts
    pub fn with_endpoints(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            health_timeout_ms: default_health_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The endpoint used when no probe succeeds
    pub fn fallback(&self) -> Option<&str> {
        self.endpoints.first().map(|s| s.as_str())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_rpc_fallbacks() {
        std::env::remove_var(env_vars::SOLANA_RPC_URLS);
        std::env::remove_var(env_vars::SOLANA_RPC_URL);

        let config = RpcConfig::from_env();

        assert_eq!(config.endpoints.len(), public_rpcs::ENDPOINTS.len());
        assert_eq!(config.fallback(), Some(public_rpcs::ENDPOINTS[0]));
    }

    #[test]
    fn test_with_endpoints_keeps_order() {
        let config = RpcConfig::with_endpoints(vec![
            "https://a.rpc".to_string(),
            "https://b.rpc".to_string(),
        ]);

        assert_eq!(config.fallback(), Some("https://a.rpc"));
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_list_beats_single_url() {
        let lookup = |name: &str| match name {
            "SOLANA_RPC_URLS" => Some(" https://a.rpc , ,https://b.rpc".to_string()),
            "SOLANA_RPC_URL" => Some("https://single.rpc".to_string()),
            _ => None,
        };

        assert_eq!(
            RpcConfig::endpoints_from(lookup),
            Some(vec!["https://a.rpc".to_string(), "https://b.rpc".to_string()])
        );
        assert_eq!(
            RpcConfig::endpoints_from(|name| {
                (name == "SOLANA_RPC_URL").then(|| "https://single.rpc".to_string())
            }),
            Some(vec!["https://single.rpc".to_string()])
        );
        assert_eq!(RpcConfig::endpoints_from(|_| None), None);
    }

    #[test]
    fn test_empty_list_has_no_fallback() {
        let config = RpcConfig::with_endpoints(Vec::new());
        assert_eq!(config.fallback(), None);
    }
}
