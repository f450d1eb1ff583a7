//! Trading workflows
//!
//! Every request is handled end to end by [`Orchestrator::handle`]:
//!
//! 1. **Admission**: per-caller cooldown; rejected requests are dropped
//! 2. **Validation**: target and amounts, before any network call
//! 3. **Risk gate**: buys and loops refuse risky tokens unless forced
//! 4. **Pacing**: a random human-like delay before paced trades
//! 5. **Execution**: wallet lookup, instruction encoding, relay submission
//! 6. **Reporting**: typed outcome, plus one audit log line
//!
//! Work inside one request is strictly sequential.

use crate::admission::CooldownGate;
use crate::audit::{AuditEntry, TradeAuditLog};
use crate::chain::{Balance, ChainReader, HttpRpcTransport};
use crate::config::{Config, TradingConfig};
use crate::error::shorten_address;
use crate::instruction::{encode_buy, encode_sell, TradeInstruction};
use crate::risk::{RiskAssessor, RiskReport, RiskScorer};
use crate::submitter::{JitoRelay, RetryPolicy, TransactionSubmitter};
use crate::wallet::{TradingWallet, WalletRegistry};
use crate::{Error, Result};
use rand::Rng;
use serde::Serialize;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Parameters of a buy/sell loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopParams {
    /// SOL per buy, before randomization
    pub buy_sol: f64,
    /// Share of the current balance sold after each buy
    pub sell_percent: f64,
    /// Sleep after each buy and after each sell
    pub delay: Duration,
    pub rounds: u32,
    /// Trade even if the token scores as risky
    pub force: bool,
}

/// What a caller asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TradeOp {
    Buy { sol_amount: f64, force: bool },
    Sell { percent: f64 },
    Balance,
    RugCheck,
    AutoProtect,
    Loop(LoopParams),
}

impl TradeOp {
    pub fn name(&self) -> &'static str {
        match self {
            TradeOp::Buy { .. } => "buy",
            TradeOp::Sell { .. } => "sell",
            TradeOp::Balance => "balance",
            TradeOp::RugCheck => "rugcheck",
            TradeOp::AutoProtect => "auto_protect",
            TradeOp::Loop(_) => "loop",
        }
    }

    /// What the request tried to move, for failure messages
    pub fn amount_label(&self) -> String {
        match self {
            TradeOp::Buy { sol_amount, .. } => format!("{} SOL", sol_amount),
            TradeOp::Sell { percent } => format!("{}%", percent),
            TradeOp::Balance | TradeOp::RugCheck => "none".to_string(),
            TradeOp::AutoProtect => "100%".to_string(),
            TradeOp::Loop(params) => format!(
                "{} SOL / {}% x{}",
                params.buy_sol, params.sell_percent, params.rounds
            ),
        }
    }
}

/// One request from one caller
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub request_id: Uuid,
    pub caller_id: String,
    /// Mint address of the token
    pub target: String,
    pub op: TradeOp,
}

impl TradeRequest {
    pub fn new(caller_id: impl Into<String>, target: impl Into<String>, op: TradeOp) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller_id: caller_id.into(),
            target: target.into(),
            op,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuyReceipt {
    pub target: String,
    pub wallet: String,
    /// Amount the caller asked for
    pub requested_sol: f64,
    /// Amount actually spent after randomization
    pub sol_amount: f64,
    pub lamports: u64,
    pub bundle_id: String,
    pub link: String,
    /// Report the buy was gated on
    pub risk: RiskReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellReceipt {
    pub target: String,
    pub wallet: String,
    pub percent: f64,
    /// Raw token units held before the sale
    pub balance_before: u64,
    /// Raw token units sold
    pub token_amount: u64,
    pub bundle_id: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub target: String,
    pub wallet: String,
    #[serde(flatten)]
    pub balance: Balance,
}

/// Result of one auto-protect check
#[derive(Debug, Clone, Serialize)]
pub struct ProtectionReport {
    pub target: String,
    pub risk: RiskReport,
    /// Tokens held when the check found high risk
    pub token_balance: Option<u64>,
    /// Emergency sale, if one was made
    pub sale: Option<SellReceipt>,
}

impl ProtectionReport {
    pub fn status(&self) -> &'static str {
        match (&self.sale, self.risk.risk) {
            (Some(_), _) => "sold",
            (None, true) => "high risk, nothing held",
            (None, false) => "monitoring",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopSummary {
    pub target: String,
    pub rounds_requested: u32,
    pub rounds_completed: u32,
    pub buys: Vec<BuyReceipt>,
    pub sells: Vec<SellReceipt>,
    /// Why the loop stopped early
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Bought(BuyReceipt),
    Sold(SellReceipt),
    Balance(BalanceReport),
    Risk(RiskReport),
    Protection(ProtectionReport),
    Loop(LoopSummary),
}

/// Parse a mint address: base58, 32 to 44 characters, decodes to a public key
pub fn parse_target(target: &str) -> Result<Pubkey> {
    if !(32..=44).contains(&target.len()) {
        return Err(Error::InvalidArgument(format!(
            "Invalid contract address: {}",
            target
        )));
    }
    Pubkey::from_str(target)
        .map_err(|_| Error::InvalidArgument(format!("Invalid contract address: {}", target)))
}

/// `floor(balance * percent / 100)` without float rounding on large balances
///
/// The percent is resolved to 1e-12 of a percent, well inside `f64`'s exact
/// integer range for values up to 100.
pub fn sell_amount(balance: u64, percent: f64) -> u64 {
    const SCALE: f64 = 1e12;
    let scaled = (percent * SCALE).round() as u128;
    (balance as u128 * scaled / (100 * SCALE as u128)) as u64
}

fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

/// Runs trade requests against the registry, chain, risk scorer and relay
pub struct Orchestrator {
    trading: TradingConfig,
    explorer_url: String,
    gate: Arc<CooldownGate>,
    wallets: Arc<WalletRegistry>,
    chain: ChainReader,
    risk: Arc<dyn RiskAssessor>,
    submitter: TransactionSubmitter,
    audit: Option<TradeAuditLog>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        gate: Arc<CooldownGate>,
        wallets: Arc<WalletRegistry>,
        chain: ChainReader,
        risk: Arc<dyn RiskAssessor>,
        submitter: TransactionSubmitter,
    ) -> Self {
        Self {
            trading: config.trading.clone(),
            explorer_url: config.explorer_url.trim_end_matches('/').to_string(),
            gate,
            wallets,
            chain,
            risk,
            submitter,
            audit: None,
        }
    }

    /// Wire up the HTTP-backed components described by `config`
    pub fn from_config(config: &Config) -> Self {
        let rpc = Arc::new(HttpRpcTransport::new(&config.rpc));
        let chain = ChainReader::new(rpc, config.rpc.clone());
        let risk = Arc::new(RiskScorer::new(config.risk.clone()));
        let relay = Arc::new(JitoRelay::new(&config.relay));
        let submitter = TransactionSubmitter::new(relay, RetryPolicy::from_config(&config.relay));
        let gate = Arc::new(CooldownGate::new(config.trading.cooldown()));
        let wallets = Arc::new(WalletRegistry::new(&config.wallet_file));

        let orchestrator = Self::new(config, gate, wallets, chain, risk, submitter);
        match &config.audit_log_path {
            Some(path) => orchestrator.with_audit_log(TradeAuditLog::new(path)),
            None => orchestrator,
        }
    }

    pub fn with_audit_log(mut self, audit: TradeAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Handle one request end to end
    pub async fn handle(&self, request: TradeRequest) -> Result<TradeOutcome> {
        let span = tracing::info_span!(
            "trade",
            request_id = %request.request_id,
            caller = %request.caller_id,
            op = request.op.name(),
            target = %shorten_address(&request.target),
        );

        async {
            let started = Instant::now();
            let result = self.dispatch(&request).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(_) => tracing::info!(duration_ms, "Request succeeded"),
                Err(e) => tracing::warn!(
                    duration_ms,
                    kind = ?e.kind(),
                    error = %e,
                    "Request failed"
                ),
            }

            if let Some(audit) = &self.audit {
                audit
                    .record(&AuditEntry::new(&request, &result, duration_ms))
                    .await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, request: &TradeRequest) -> Result<TradeOutcome> {
        self.gate.admit(&request.caller_id).await?;
        let mint = parse_target(&request.target)?;
        let target = request.target.as_str();

        let result = match &request.op {
            TradeOp::Buy { sol_amount, force } => self
                .buy(target, mint, *sol_amount, *force)
                .await
                .map(TradeOutcome::Bought),
            TradeOp::Sell { percent } => self
                .sell(target, mint, *percent)
                .await
                .map(TradeOutcome::Sold),
            TradeOp::Balance => self.balance(target, mint).await.map(TradeOutcome::Balance),
            TradeOp::RugCheck => Ok(TradeOutcome::Risk(self.risk.assess(target).await)),
            TradeOp::AutoProtect => self
                .auto_protect(target, mint)
                .await
                .map(TradeOutcome::Protection),
            TradeOp::Loop(params) => self
                .run_loop(target, mint, params)
                .await
                .map(TradeOutcome::Loop),
        };
        result.map_err(|e| {
            e.with_trade_context(request.op.name(), target, request.op.amount_label())
        })
    }

    async fn buy(
        &self,
        target: &str,
        mint: Pubkey,
        sol_amount: f64,
        force: bool,
    ) -> Result<BuyReceipt> {
        self.validate_sol_amount(sol_amount)?;
        let risk = self.risk_gate(target, force).await?;

        self.pace().await;
        let actual = self.randomize_amount(sol_amount);
        self.execute_buy(target, mint, sol_amount, actual, risk).await
    }

    async fn sell(&self, target: &str, mint: Pubkey, percent: f64) -> Result<SellReceipt> {
        validate_percent(percent)?;
        let wallet = self.wallet_for(target).await?;
        let (balance_before, token_amount) = self.sellable(target, &wallet, mint, percent).await?;

        self.pace().await;
        self.execute_sell("sell", target, mint, &wallet, percent, balance_before, token_amount)
            .await
    }

    async fn balance(&self, target: &str, mint: Pubkey) -> Result<BalanceReport> {
        let wallet = self.wallet_for(target).await?;
        let balance = self.chain.read_balance(&wallet.pubkey(), &mint).await?;

        Ok(BalanceReport {
            target: target.to_string(),
            wallet: wallet.address_string(),
            balance,
        })
    }

    /// One-shot check: sell everything immediately if the token scores as risky
    async fn auto_protect(&self, target: &str, mint: Pubkey) -> Result<ProtectionReport> {
        let risk = self.risk.assess(target).await;
        if !risk.risk {
            tracing::info!(score = ?risk.score, "Risk low, monitoring");
            return Ok(ProtectionReport {
                target: target.to_string(),
                risk,
                token_balance: None,
                sale: None,
            });
        }

        let wallet = self.wallet_for(target).await?;
        let balance = self.chain.read_balance(&wallet.pubkey(), &mint).await?;
        if balance.token_amount == 0 {
            tracing::info!("High risk but no tokens held");
            return Ok(ProtectionReport {
                target: target.to_string(),
                risk,
                token_balance: Some(0),
                sale: None,
            });
        }

        tracing::warn!(
            score = ?risk.score,
            factors = ?risk.factors,
            token_amount = balance.token_amount,
            "High risk detected, selling entire balance"
        );
        // No pacing: the point is to get out first
        let sale = self
            .execute_sell(
                "emergency sell (manual sale required)",
                target,
                mint,
                &wallet,
                100.0,
                balance.token_amount,
                balance.token_amount,
            )
            .await?;

        Ok(ProtectionReport {
            target: target.to_string(),
            risk,
            token_balance: Some(balance.token_amount),
            sale: Some(sale),
        })
    }

    async fn run_loop(
        &self,
        target: &str,
        mint: Pubkey,
        params: &LoopParams,
    ) -> Result<LoopSummary> {
        self.validate_sol_amount(params.buy_sol)?;
        validate_percent(params.sell_percent)?;
        if params.rounds == 0 {
            return Err(Error::InvalidArgument(
                "Loop needs at least one round".to_string(),
            ));
        }
        let risk = self.risk_gate(target, params.force).await?;

        let mut summary = LoopSummary {
            target: target.to_string(),
            rounds_requested: params.rounds,
            rounds_completed: 0,
            buys: Vec::new(),
            sells: Vec::new(),
            aborted: None,
        };

        for round in 1..=params.rounds {
            match self.loop_round(target, mint, params, &risk, &mut summary).await {
                Ok(()) => {
                    summary.rounds_completed = round;
                    tracing::info!(round, rounds = params.rounds, "Loop round complete");
                }
                Err(e) => {
                    tracing::warn!(round, error = %e, "Loop aborted");
                    summary.aborted = Some(format!("round {}: {}", round, e));
                    break;
                }
            }
        }

        Ok(summary)
    }

    async fn loop_round(
        &self,
        target: &str,
        mint: Pubkey,
        params: &LoopParams,
        risk: &RiskReport,
        summary: &mut LoopSummary,
    ) -> Result<()> {
        let actual = self.randomize_amount(params.buy_sol);
        let buy = self
            .execute_buy(target, mint, params.buy_sol, actual, risk.clone())
            .await?;
        summary.buys.push(buy);
        tokio::time::sleep(params.delay).await;

        let sell_label = || format!("{}%", params.sell_percent);
        let wallet = self
            .wallet_for(target)
            .await
            .map_err(|e| e.with_trade_context("sell", target, sell_label()))?;
        let (balance_before, token_amount) = self
            .sellable(target, &wallet, mint, params.sell_percent)
            .await
            .map_err(|e| e.with_trade_context("sell", target, sell_label()))?;
        let sell = self
            .execute_sell(
                "sell",
                target,
                mint,
                &wallet,
                params.sell_percent,
                balance_before,
                token_amount,
            )
            .await?;
        summary.sells.push(sell);
        tokio::time::sleep(params.delay).await;

        Ok(())
    }

    /// Assess and refuse risky tokens unless forced
    async fn risk_gate(&self, target: &str, force: bool) -> Result<RiskReport> {
        let report = self.risk.assess(target).await;
        if !report.risk {
            return Ok(report);
        }
        if force {
            tracing::warn!(
                score = ?report.score,
                factors = ?report.factors,
                "High rug risk overridden by force"
            );
            return Ok(report);
        }

        let factors = match (&report.reason, report.factors.is_empty()) {
            (Some(reason), true) => vec![reason.clone()],
            _ => report.factors.clone(),
        };
        Err(Error::HighRisk {
            target: shorten_address(target),
            score: report.score,
            factors,
        })
    }

    /// Current balance and the amount a `percent` sale would move
    async fn sellable(
        &self,
        target: &str,
        wallet: &TradingWallet,
        mint: Pubkey,
        percent: f64,
    ) -> Result<(u64, u64)> {
        let balance = self.chain.read_balance(&wallet.pubkey(), &mint).await?;
        if balance.token_amount == 0 {
            return Err(Error::NothingToSell {
                target: shorten_address(target),
                detail: "no tokens held".to_string(),
            });
        }

        let amount = sell_amount(balance.token_amount, percent);
        if amount == 0 {
            return Err(Error::NothingToSell {
                target: shorten_address(target),
                detail: format!(
                    "{}% of {} rounds down to 0",
                    percent, balance.token_amount
                ),
            });
        }
        Ok((balance.token_amount, amount))
    }

    async fn execute_buy(
        &self,
        target: &str,
        mint: Pubkey,
        requested_sol: f64,
        sol_amount: f64,
        risk: RiskReport,
    ) -> Result<BuyReceipt> {
        let lamports = sol_to_lamports(sol_amount);
        let wallet = self.wallet_for(target).await?;
        let instruction = encode_buy(wallet.pubkey(), mint, lamports)?;
        let amount_label = format!("{:.5} SOL", sol_amount);

        let bundle_id = self
            .submit(&instruction, &wallet)
            .await
            .map_err(|e| e.in_trade("buy", target, amount_label))?;

        Ok(BuyReceipt {
            target: target.to_string(),
            wallet: wallet.address_string(),
            requested_sol,
            sol_amount,
            lamports,
            link: self.link(&bundle_id),
            bundle_id,
            risk,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_sell(
        &self,
        op: &'static str,
        target: &str,
        mint: Pubkey,
        wallet: &TradingWallet,
        percent: f64,
        balance_before: u64,
        token_amount: u64,
    ) -> Result<SellReceipt> {
        let instruction = encode_sell(wallet.pubkey(), mint, token_amount)?;

        let bundle_id = self
            .submit(&instruction, wallet)
            .await
            .map_err(|e| e.in_trade(op, target, format!("{} tokens", token_amount)))?;

        Ok(SellReceipt {
            target: target.to_string(),
            wallet: wallet.address_string(),
            percent,
            balance_before,
            token_amount,
            link: self.link(&bundle_id),
            bundle_id,
        })
    }

    async fn submit(
        &self,
        instruction: &TradeInstruction,
        wallet: &TradingWallet,
    ) -> Result<String> {
        let blockhash = self.chain.latest_blockhash().await?;
        self.submitter
            .submit(instruction, wallet.signer(), blockhash)
            .await
    }

    async fn wallet_for(&self, target: &str) -> Result<TradingWallet> {
        let record = self.wallets.get_or_create(target).await?;
        TradingWallet::from_record(&record)
    }

    fn validate_sol_amount(&self, amount: f64) -> Result<()> {
        let (min, max) = (
            self.trading.min_sol_per_trade,
            self.trading.max_sol_per_trade,
        );
        if !(min..=max).contains(&amount) {
            return Err(Error::InvalidArgument(format!(
                "SOL amount must be between {} and {}, got {}",
                min, max, amount
            )));
        }
        Ok(())
    }

    /// `amount` plus uniform noise of at most `min(max_jitter, amount * fraction)`,
    /// clamped to the per-trade bounds
    fn randomize_amount(&self, amount: f64) -> f64 {
        let cfg = &self.trading;
        let variation = (amount * cfg.amount_jitter_fraction).min(cfg.max_amount_jitter_sol);
        let noise = if variation > 0.0 {
            rand::thread_rng().gen_range(-variation..=variation)
        } else {
            0.0
        };
        (amount + noise).clamp(cfg.min_sol_per_trade, cfg.max_sol_per_trade)
    }

    /// Random delay in `[pacing_min_ms, pacing_max_ms]`
    async fn pace(&self) {
        let delay_ms = rand::thread_rng()
            .gen_range(self.trading.pacing_min_ms..=self.trading.pacing_max_ms);
        tracing::debug!(delay_ms, "Pacing before trade");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    fn link(&self, bundle_id: &str) -> String {
        format!("{}/{}", self.explorer_url, bundle_id)
    }
}

fn validate_percent(percent: f64) -> Result<()> {
    if !(percent > 0.0 && percent <= 100.0) {
        return Err(Error::InvalidArgument(format!(
            "Percentage must be in (0, 100], got {}",
            percent
        )));
    }
    Ok(())
}
