//! Rug-risk scoring from pump.fun coin metadata
//!
//! Scoring is advisory and fails closed: if the metadata cannot be fetched or
//! read, the report says "risky" with no score and the reason attached.

use crate::config::RiskConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of triggered factors at which a token counts as risky
pub const HIGH_RISK_SCORE: u8 = 3;

/// Factor labels, in scoring order
pub mod factors {
    pub const LP_NOT_LOCKED: &str = "LP not locked";
    pub const OWNER_HAS_ADMIN: &str = "Owner has admin rights";
    pub const LOW_VOLUME: &str = "Low volume";
    pub const FEW_HOLDERS: &str = "Few holders";
    pub const LOW_MARKET_CAP: &str = "Low market cap";
}

/// Outcome of one risk assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub risk: bool,
    /// Triggered factor count in `0..=5`, `None` when metadata was unavailable
    pub score: Option<u8>,
    pub factors: Vec<String>,
    /// Why the check failed closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Raw metadata the score was computed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl RiskReport {
    /// A report for metadata that could not be evaluated
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            risk: true,
            score: None,
            factors: Vec::new(),
            reason: Some(reason.into()),
            metadata: None,
        }
    }

    pub(crate) fn scored(factors: Vec<String>, metadata: Option<Value>) -> Self {
        let score = factors.len() as u8;
        Self {
            risk: score >= HIGH_RISK_SCORE,
            score: Some(score),
            factors,
            reason: None,
            metadata,
        }
    }

    /// `"4/5"`, or `"n/a"` when unscored
    pub fn score_label(&self) -> String {
        self.score
            .map_or_else(|| "n/a".to_string(), |s| format!("{}/5", s))
    }
}

/// The fields of `/coins/{mint}` that feed the score
///
/// Missing or null fields count against the token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoinMetadata {
    pub lp_locked: Option<bool>,
    pub owner_has_admin: Option<bool>,
    pub recent_volume: Option<f64>,
    pub holder_count: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Score metadata against the configured thresholds
pub fn score_metadata(meta: &CoinMetadata, config: &RiskConfig) -> Vec<String> {
    let mut triggered = Vec::new();

    if !meta.lp_locked.unwrap_or(false) {
        triggered.push(factors::LP_NOT_LOCKED.to_string());
    }
    if meta.owner_has_admin.unwrap_or(false) {
        triggered.push(factors::OWNER_HAS_ADMIN.to_string());
    }
    if meta.recent_volume.unwrap_or(0.0) < config.min_volume {
        triggered.push(factors::LOW_VOLUME.to_string());
    }
    if meta.holder_count.unwrap_or(0.0) < config.min_holders as f64 {
        triggered.push(factors::FEW_HOLDERS.to_string());
    }
    if meta.market_cap.unwrap_or(0.0) < config.min_market_cap {
        triggered.push(factors::LOW_MARKET_CAP.to_string());
    }

    triggered
}

/// Seam between the orchestrator and the metadata source
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    /// Never fails; problems become a fail-closed report
    async fn assess(&self, target_id: &str) -> RiskReport;
}

/// Scores tokens from the pump.fun HTTP API
pub struct RiskScorer {
    client: Client,
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn coin_url(&self, target_id: &str) -> String {
        format!(
            "{}/coins/{}",
            self.config.metadata_url.trim_end_matches('/'),
            target_id
        )
    }

    async fn fetch(&self, target_id: &str) -> std::result::Result<Value, String> {
        let response = self
            .client
            .get(self.coin_url(target_id))
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| format!("check failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("endpoint unavailable (HTTP {})", status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("check failed: unreadable metadata: {}", e))
    }
}

#[async_trait]
impl RiskAssessor for RiskScorer {
    async fn assess(&self, target_id: &str) -> RiskReport {
        let raw = match self.fetch(target_id).await {
            Ok(raw) => raw,
            Err(reason) => {
                tracing::warn!(target_id, reason = %reason, "Risk check failed closed");
                return RiskReport::unavailable(reason);
            }
        };

        let meta: CoinMetadata = match serde_json::from_value(raw.clone()) {
            Ok(meta) => meta,
            Err(e) => {
                let reason = format!("check failed: unexpected metadata shape: {}", e);
                tracing::warn!(target_id, reason = %reason, "Risk check failed closed");
                return RiskReport::unavailable(reason);
            }
        };

        let report = RiskReport::scored(score_metadata(&meta, &self.config), Some(raw));
        tracing::info!(
            target_id,
            score = ?report.score,
            risk = report.risk,
            factors = ?report.factors,
            "Risk assessed"
        );
        report
    }
}
