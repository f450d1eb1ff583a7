//! Transaction assembly and bundle relay submission
//!
//! A trade is compiled into a single-instruction v0 message, signed, bincode
//! serialized, base64 encoded and posted to the relay as a one-transaction
//! bundle. Relay failures are classified by [`RelayError`] and retried with
//! exponential backoff according to [`RetryPolicy`].

use crate::config::RelayConfig;
use crate::instruction::TradeInstruction;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;

/// Why a relay submission did not produce a bundle id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Connect failure, timeout, or an error status without a JSON-RPC body
    #[error("relay unreachable: {0}")]
    Transport(String),

    /// JSON-RPC `error` present, whatever the HTTP status
    #[error("relay rejected bundle: {0}")]
    Rejected(String),

    /// Success status without a usable bundle id: a body that is not JSON,
    /// or JSON without an id
    ///
    /// Never retried. The relay answered with a success status, so the bundle
    /// may already have landed; resubmitting could double the trade.
    #[error("malformed relay response: {0}")]
    Malformed(String),
}

impl RelayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport(_) | RelayError::Rejected(_) => true,
            RelayError::Malformed(_) => false,
        }
    }
}

/// A bundle relay accepting base64 transactions
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Submit one encoded transaction as a bundle, returning the bundle id
    async fn send_bundle(&self, encoded_tx: &str) -> std::result::Result<String, RelayError>;
}

/// Jito block engine `sendBundle`
pub struct JitoRelay {
    client: Client,
    url: String,
    timeout: Duration,
}

impl JitoRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl RelayTransport for JitoRelay {
    async fn send_bundle(&self, encoded_tx: &str) -> std::result::Result<String, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "sendBundle",
                "params": [[encoded_tx], { "encoding": "base64" }],
            }))
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(RelayError::Transport(format!("HTTP {}", status.as_u16())))
            }
            Err(e) => return Err(RelayError::Malformed(format!("invalid JSON: {}", e))),
        };

        if let Some(error) = body.get("error") {
            return Err(RelayError::Rejected(error.to_string()));
        }
        if !status.is_success() {
            return Err(RelayError::Transport(format!("HTTP {}", status.as_u16())));
        }

        bundle_id_from_result(body.get("result"))
            .ok_or_else(|| RelayError::Malformed(format!("no bundle id in {}", body)))
    }
}

/// `result` is either the id itself or an object carrying it
fn bundle_id_from_result(result: Option<&Value>) -> Option<String> {
    let id = match result? {
        Value::String(id) => id.as_str(),
        Value::Object(fields) => fields
            .get("bundleId")
            .or_else(|| fields.get("bundle_id"))?
            .as_str()?,
        _ => return None,
    };
    (!id.is_empty()).then(|| id.to_string())
}

/// Attempt budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }

    /// Sleep after failed attempt `attempt` (0-based): `base_delay * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Compile and sign a single-instruction v0 transaction paid by `signer`
pub fn build_transaction(
    instruction: &TradeInstruction,
    signer: &Keypair,
    recent_blockhash: Hash,
) -> Result<VersionedTransaction> {
    let message = v0::Message::try_compile(
        &signer.pubkey(),
        &[instruction.to_instruction()],
        &[],
        recent_blockhash,
    )
    .map_err(|e| Error::Transaction(format!("failed to compile message: {}", e)))?;

    VersionedTransaction::try_new(VersionedMessage::V0(message), &[signer])
        .map_err(|e| Error::Transaction(format!("failed to sign transaction: {}", e)))
}

/// Wire form expected by the relay
pub fn encode_transaction(tx: &VersionedTransaction) -> Result<String> {
    let bytes = bincode::serialize(tx)
        .map_err(|e| Error::Transaction(format!("failed to serialize transaction: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Signs trades and pushes them through the relay
#[derive(Clone)]
pub struct TransactionSubmitter {
    relay: Arc<dyn RelayTransport>,
    policy: RetryPolicy,
}

impl TransactionSubmitter {
    pub fn new(relay: Arc<dyn RelayTransport>, policy: RetryPolicy) -> Self {
        Self { relay, policy }
    }

    /// Sign and submit `instruction`, returning the relay's bundle id
    pub async fn submit(
        &self,
        instruction: &TradeInstruction,
        signer: &Keypair,
        recent_blockhash: Hash,
    ) -> Result<String> {
        if instruction.payer() != signer.pubkey() {
            return Err(Error::Transaction(format!(
                "signer {} is not the payer {}",
                signer.pubkey(),
                instruction.payer()
            )));
        }

        let tx = build_transaction(instruction, signer, recent_blockhash)?;
        let encoded = encode_transaction(&tx)?;
        let signature = tx.signatures.first().copied().unwrap_or_default();

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.relay.send_bundle(&encoded).await {
                Ok(bundle_id) => {
                    tracing::info!(
                        op = instruction.label(),
                        amount = instruction.amount(),
                        attempt = attempt + 1,
                        bundle_id = %bundle_id,
                        signature = %signature,
                        "Bundle accepted"
                    );
                    return Ok(bundle_id);
                }
                Err(err) => {
                    tracing::warn!(
                        op = instruction.label(),
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "Bundle submission failed"
                    );

                    if !err.is_retryable() {
                        return Err(Error::Transaction(format!(
                            "{} (attempt {} of {}, not retried)",
                            err,
                            attempt + 1,
                            max_attempts
                        )));
                    }
                    if attempt + 1 >= max_attempts {
                        return Err(Error::Transaction(format!(
                            "{} (gave up after {} attempts)",
                            err, max_attempts
                        )));
                    }

                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
