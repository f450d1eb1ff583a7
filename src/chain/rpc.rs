//! Solana JSON-RPC transport and endpoint selection
//!
//! The transport is a trait so the chain reader and orchestrator can run against
//! in-memory fakes. [`select_endpoint`] is re-run for every call; nothing about
//! endpoint health is remembered between calls.

use crate::config::RpcConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

/// The four RPC methods the trader needs
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// `getHealth`; `Ok` only when the node reports `"ok"`
    async fn get_health(&self, endpoint: &str) -> Result<()>;

    async fn get_latest_blockhash(&self, endpoint: &str) -> Result<Hash>;

    /// Native balance in lamports
    async fn get_balance(&self, endpoint: &str, owner: &Pubkey) -> Result<u64>;

    /// Raw account data, `None` when the account does not exist
    async fn get_account_data(&self, endpoint: &str, account: &Pubkey)
        -> Result<Option<Vec<u8>>>;
}

/// JSON-RPC 2.0 over HTTP POST
pub struct HttpRpcTransport {
    client: Client,
    request_timeout: Duration,
}

impl HttpRpcTransport {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            client: Client::new(),
            request_timeout: config.request_timeout(),
        }
    }

    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .timeout(self.request_timeout)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request to {} failed: {}", method, endpoint, e)))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            Error::Transport(format!(
                "{} returned an unreadable body (HTTP {}): {}",
                method, status, e
            ))
        })?;

        if let Some(error) = body.get("error") {
            return Err(Error::Transport(format!("{} error: {}", method, error)));
        }
        if !status.is_success() {
            return Err(Error::Transport(format!("{} returned HTTP {}", method, status)));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| Error::Transport(format!("{} response has no result", method)))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn get_health(&self, endpoint: &str) -> Result<()> {
        let result = self.call(endpoint, "getHealth", json!([])).await?;
        match result.as_str() {
            Some("ok") => Ok(()),
            _ => Err(Error::Transport(format!("node unhealthy: {}", result))),
        }
    }

    async fn get_latest_blockhash(&self, endpoint: &str) -> Result<Hash> {
        let result = self
            .call(
                endpoint,
                "getLatestBlockhash",
                json!([{ "commitment": "finalized" }]),
            )
            .await?;

        let blockhash = result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("getLatestBlockhash: missing blockhash".to_string()))?;

        Hash::from_str(blockhash)
            .map_err(|e| Error::Transport(format!("invalid blockhash {}: {}", blockhash, e)))
    }

    async fn get_balance(&self, endpoint: &str, owner: &Pubkey) -> Result<u64> {
        let result = self
            .call(endpoint, "getBalance", json!([owner.to_string()]))
            .await?;

        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Transport("getBalance: missing value".to_string()))
    }

    async fn get_account_data(
        &self,
        endpoint: &str,
        account: &Pubkey,
    ) -> Result<Option<Vec<u8>>> {
        let result = self
            .call(
                endpoint,
                "getAccountInfo",
                json!([account.to_string(), { "encoding": "base64" }]),
            )
            .await?;

        let value = match result.get("value") {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };

        // data is ["<base64>", "base64"]
        let encoded = value
            .pointer("/data/0")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("getAccountInfo: missing data".to_string()))?;

        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Transport(format!("getAccountInfo: bad base64: {}", e)))?;
        Ok(Some(data))
    }
}

/// Pick a healthy endpoint, probing candidates in random order
///
/// Each probe is bounded by the configured health timeout. When no candidate
/// answers healthy the first configured endpoint is returned anyway.
pub async fn select_endpoint(rpc: &dyn RpcTransport, config: &RpcConfig) -> Result<String> {
    let fallback = config
        .fallback()
        .ok_or_else(|| Error::Config("no RPC endpoints configured".to_string()))?
        .to_string();

    let mut candidates = config.endpoints.clone();
    candidates.shuffle(&mut rand::thread_rng());

    for endpoint in candidates {
        match tokio::time::timeout(config.health_timeout(), rpc.get_health(&endpoint)).await {
            Ok(Ok(())) => {
                tracing::debug!(endpoint = %endpoint, "Selected healthy RPC endpoint");
                return Ok(endpoint);
            }
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "RPC endpoint unhealthy");
            }
            Err(_) => {
                tracing::debug!(endpoint = %endpoint, "RPC health probe timed out");
            }
        }
    }

    tracing::warn!(endpoint = %fallback, "No healthy RPC endpoint, using fallback");
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRpc;
    use httpmock::prelude::*;

    fn rpc_config(endpoints: &[&str]) -> RpcConfig {
        RpcConfig::with_endpoints(endpoints.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_select_prefers_healthy_endpoint() {
        let rpc = FakeRpc::new().with_unhealthy("https://a.rpc");
        let config = rpc_config(&["https://a.rpc", "https://b.rpc"]);

        for _ in 0..10 {
            let chosen = select_endpoint(&rpc, &config).await.unwrap();
            assert_eq!(chosen, "https://b.rpc");
        }
    }

    #[tokio::test]
    async fn test_select_falls_back_to_first() {
        let rpc = FakeRpc::new()
            .with_unhealthy("https://a.rpc")
            .with_unhealthy("https://b.rpc");
        let config = rpc_config(&["https://a.rpc", "https://b.rpc"]);

        let chosen = select_endpoint(&rpc, &config).await.unwrap();
        assert_eq!(chosen, "https://a.rpc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_bounds_slow_probe() {
        let rpc = FakeRpc::new().with_hanging_health("https://slow.rpc");
        let config = rpc_config(&["https://slow.rpc"]);

        let started = tokio::time::Instant::now();
        let chosen = select_endpoint(&rpc, &config).await.unwrap();

        assert_eq!(chosen, "https://slow.rpc");
        assert_eq!(started.elapsed(), config.health_timeout());
    }

    #[tokio::test]
    async fn test_select_empty_list_is_config_error() {
        let rpc = FakeRpc::new();
        let err = select_endpoint(&rpc, &rpc_config(&[])).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_http_health_and_balance() {
        let server = MockServer::start_async().await;
        let health = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("getHealth");
                then.status(200)
                    .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": "ok" }));
            })
            .await;
        let balance = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("getBalance");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": { "context": { "slot": 1 }, "value": 2_500_000_000u64 }
                }));
            })
            .await;

        let config = rpc_config(&[]);
        let transport = HttpRpcTransport::new(&config);
        let endpoint = server.base_url();

        transport.get_health(&endpoint).await.unwrap();
        let lamports = transport
            .get_balance(&endpoint, &Pubkey::new_unique())
            .await
            .unwrap();

        assert_eq!(lamports, 2_500_000_000);
        health.assert_async().await;
        balance.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_account_data() {
        let server = MockServer::start_async().await;
        let mut raw = vec![0u8; 165];
        raw[..8].copy_from_slice(&1_000u64.to_le_bytes());
        let encoded = general_purpose::STANDARD.encode(&raw);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("getAccountInfo");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "context": { "slot": 1 },
                        "value": {
                            "data": [encoded, "base64"],
                            "executable": false,
                            "lamports": 2039280,
                            "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                            "rentEpoch": 0
                        }
                    }
                }));
            })
            .await;

        let transport = HttpRpcTransport::new(&rpc_config(&[]));
        let data = transport
            .get_account_data(&server.base_url(), &Pubkey::new_unique())
            .await
            .unwrap()
            .expect("account exists");

        assert_eq!(data, raw);
    }

    #[tokio::test]
    async fn test_http_missing_account_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": { "context": { "slot": 1 }, "value": null }
                }));
            })
            .await;

        let transport = HttpRpcTransport::new(&rpc_config(&[]));
        let data = transport
            .get_account_data(&server.base_url(), &Pubkey::new_unique())
            .await
            .unwrap();

        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_http_rpc_error_is_transport() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32005, "message": "Node is behind" }
                }));
            })
            .await;

        let transport = HttpRpcTransport::new(&rpc_config(&[]));
        let err = transport.get_health(&server.base_url()).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("Node is behind"));
    }

    #[tokio::test]
    async fn test_http_blockhash() {
        let server = MockServer::start_async().await;
        let expected = Hash::new_unique();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("getLatestBlockhash");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "context": { "slot": 1 },
                        "value": { "blockhash": expected.to_string(), "lastValidBlockHeight": 100 }
                    }
                }));
            })
            .await;

        let transport = HttpRpcTransport::new(&rpc_config(&[]));
        let hash = transport
            .get_latest_blockhash(&server.base_url())
            .await
            .unwrap();

        assert_eq!(hash, expected);
    }
}
