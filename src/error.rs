//! Error types for the pump-shield trader

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("High rug risk for {target} (score {}): {}", .score.map_or("n/a".to_string(), |s| format!("{s}/5")), .factors.join(", "))]
    HighRisk {
        target: String,
        score: Option<u8>,
        factors: Vec<String>,
    },

    #[error("Nothing to sell for {target}: {detail}")]
    NothingToSell { target: String, detail: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Wallet storage error: {0}")]
    Storage(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{op} failed for {target} (amount {amount}): {source}")]
    Trade {
        op: &'static str,
        target: String,
        amount: String,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification handed to whatever renders results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RateLimited,
    HighRisk,
    NothingToSell,
    Transport,
    Transaction,
    Storage,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::Validation,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::HighRisk { .. } => ErrorKind::HighRisk,
            Error::NothingToSell { .. } => ErrorKind::NothingToSell,
            Error::Transport(_) | Error::Network(_) | Error::Json(_) => ErrorKind::Transport,
            Error::Transaction(_) => ErrorKind::Transaction,
            Error::Storage(_) | Error::Wallet(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Config,
            Error::Trade { source, .. } => source.kind(),
        }
    }

    /// Attach the target and attempted amount to a failure
    pub fn in_trade(self, op: &'static str, target: &str, amount: impl Into<String>) -> Self {
        Error::Trade {
            op,
            target: shorten_address(target),
            amount: amount.into(),
            source: Box::new(self),
        }
    }

    /// Like [`Error::in_trade`], but leaves refusals and already wrapped
    /// failures alone
    ///
    /// Refusals (bad input, cooldown, risk, empty balance) already say what
    /// went wrong with the request; everything else needs the target and
    /// amount so the trade can be finished by hand.
    pub fn with_trade_context(
        self,
        op: &'static str,
        target: &str,
        amount: impl Into<String>,
    ) -> Self {
        match self {
            Error::InvalidArgument(_)
            | Error::RateLimited(_)
            | Error::HighRisk { .. }
            | Error::NothingToSell { .. }
            | Error::Trade { .. } => self,
            other => other.in_trade(op, target, amount),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `7xKXtg2C...uJosgAsU`-style fragment for messages and logs
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 16 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..8], &address[address.len() - 8..])
}
