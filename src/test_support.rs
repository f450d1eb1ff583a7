//! In-memory fakes for the RPC, relay and risk seams

use crate::admission::CooldownGate;
use crate::chain::{derive_token_account, ChainReader, RpcTransport};
use crate::config::{Config, RpcConfig};
use crate::orchestrator::Orchestrator;
use crate::risk::{factors, RiskAssessor, RiskReport};
use crate::submitter::{RelayError, RelayTransport, RetryPolicy, TransactionSubmitter};
use crate::wallet::{TradingWallet, WalletRegistry};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Size of an SPL token account
const TOKEN_ACCOUNT_LEN: usize = 165;

pub(crate) struct FakeRpc {
    unhealthy: HashSet<String>,
    hanging: HashSet<String>,
    lamports: HashMap<Pubkey, u64>,
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    blockhash: Hash,
    fail_reads: bool,
    balance_reads: AtomicUsize,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self {
            unhealthy: HashSet::new(),
            hanging: HashSet::new(),
            lamports: HashMap::new(),
            accounts: Mutex::new(HashMap::new()),
            blockhash: Hash::new_unique(),
            fail_reads: false,
            balance_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_unhealthy(mut self, endpoint: &str) -> Self {
        self.unhealthy.insert(endpoint.to_string());
        self
    }

    pub fn with_hanging_health(mut self, endpoint: &str) -> Self {
        self.hanging.insert(endpoint.to_string());
        self
    }

    pub fn with_lamports(mut self, owner: Pubkey, lamports: u64) -> Self {
        self.lamports.insert(owner, lamports);
        self
    }

    pub fn with_token_balance(self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Self {
        self.set_token_balance(owner, mint, amount);
        self
    }

    pub fn with_blockhash(mut self, blockhash: Hash) -> Self {
        self.blockhash = blockhash;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn set_token_balance(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) {
        let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
        data[..8].copy_from_slice(&amount.to_le_bytes());
        self.accounts
            .lock()
            .unwrap()
            .insert(derive_token_account(owner, mint), data);
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for FakeRpc {
    async fn get_health(&self, endpoint: &str) -> Result<()> {
        if self.hanging.contains(endpoint) {
            std::future::pending::<()>().await;
        }
        if self.unhealthy.contains(endpoint) {
            return Err(Error::Transport("node is behind".to_string()));
        }
        Ok(())
    }

    async fn get_latest_blockhash(&self, _endpoint: &str) -> Result<Hash> {
        Ok(self.blockhash)
    }

    async fn get_balance(&self, _endpoint: &str, owner: &Pubkey) -> Result<u64> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(self.lamports.get(owner).copied().unwrap_or(0))
    }

    async fn get_account_data(
        &self,
        _endpoint: &str,
        account: &Pubkey,
    ) -> Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(self.accounts.lock().unwrap().get(account).cloned())
    }
}

type RelayResponse = std::result::Result<String, RelayError>;

/// Relay that replays scripted responses, then accepts everything
pub(crate) struct FakeRelay {
    responses: Mutex<VecDeque<RelayResponse>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(self, responses: Vec<RelayResponse>) -> Self {
        *self.responses.lock().unwrap() = responses.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Decoded transactions, in submission order
    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(encoded, _)| {
                let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
                bincode::deserialize(&bytes).unwrap()
            })
            .collect()
    }
}

#[async_trait]
impl RelayTransport for FakeRelay {
    async fn send_bundle(&self, encoded_tx: &str) -> RelayResponse {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((encoded_tx.to_string(), Instant::now()));
            calls.len()
        };
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("bundle-{}", call_number)))
    }
}

/// Risk assessor returning a fixed report
pub(crate) struct FakeRisk {
    report: RiskReport,
    calls: AtomicUsize,
}

impl FakeRisk {
    /// Report with the first `score` factors triggered
    pub fn scoring(score: u8) -> Self {
        let all = [
            factors::LP_NOT_LOCKED,
            factors::OWNER_HAS_ADMIN,
            factors::LOW_VOLUME,
            factors::FEW_HOLDERS,
            factors::LOW_MARKET_CAP,
        ];
        let triggered = all
            .iter()
            .take(score as usize)
            .map(|f| f.to_string())
            .collect();
        Self::with_report(RiskReport::scored(triggered, None))
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::with_report(RiskReport::unavailable(reason))
    }

    fn with_report(report: RiskReport) -> Self {
        Self {
            report,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RiskAssessor for FakeRisk {
    async fn assess(&self, _target_id: &str) -> RiskReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.report.clone()
    }
}

/// An orchestrator over fakes and a temporary wallet registry
pub(crate) struct TestHarness {
    pub dir: TempDir,
    pub rpc: Arc<FakeRpc>,
    pub relay: Arc<FakeRelay>,
    pub risk: Arc<FakeRisk>,
    pub wallets: Arc<WalletRegistry>,
    config: Config,
}

impl TestHarness {
    /// No pacing, no cooldown, no audit log
    pub fn new(rpc: FakeRpc, relay: FakeRelay, risk: FakeRisk) -> Self {
        let dir = TempDir::new().unwrap();
        let wallet_file = dir.path().join("wallets.json");

        let mut config = Config {
            rpc: RpcConfig::with_endpoints(vec!["https://fake.rpc".to_string()]),
            wallet_file: wallet_file.display().to_string(),
            audit_log_path: None,
            ..Config::default()
        };
        config.trading.pacing_min_ms = 0;
        config.trading.pacing_max_ms = 0;
        config.trading.cooldown_seconds = 0;

        Self {
            dir,
            rpc: Arc::new(rpc),
            relay: Arc::new(relay),
            risk: Arc::new(risk),
            wallets: Arc::new(WalletRegistry::new(wallet_file)),
            config,
        }
    }

    pub fn with_pacing(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.trading.pacing_min_ms = min_ms;
        self.config.trading.pacing_max_ms = max_ms;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.trading.cooldown_seconds = cooldown.as_secs();
        self
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let chain = ChainReader::new(self.rpc.clone(), self.config.rpc.clone());
        let submitter = TransactionSubmitter::new(
            self.relay.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        );

        Orchestrator::new(
            &self.config,
            Arc::new(CooldownGate::new(self.config.trading.cooldown())),
            self.wallets.clone(),
            chain,
            self.risk.clone(),
            submitter,
        )
    }

    /// Create (or fetch) the wallet the orchestrator will use for `target`
    pub async fn wallet_for(&self, target: &str) -> Pubkey {
        let record = self.wallets.get_or_create(target).await.unwrap();
        TradingWallet::from_record(&record).unwrap().pubkey()
    }
}
