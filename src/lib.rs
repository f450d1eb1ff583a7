//! pump-shield
//!
//! Risk-gated trading of pump.fun tokens through a private bundle relay:
//! - One dedicated wallet per traded token, kept in a flat JSON registry
//! - Buy/sell instructions signed locally and submitted as Jito bundles
//! - Rug-risk scoring from coin metadata gates buys and triggers emergency sells
//!
//! # Security Model
//!
//! - Secret keys live only in the wallet registry file and in memory for one trade
//! - `Debug` output of every key-holding type is redacted
//! - Every request passes a per-caller cooldown and is recorded in an audit log

pub mod admission;
pub mod audit;
pub mod chain;
pub mod config;
pub mod instruction;
pub mod orchestrator;
pub mod risk;
pub mod submitter;
pub mod wallet;

mod error;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{Config, RpcConfig};
pub use error::{shorten_address, Error, ErrorKind, Result};
pub use orchestrator::{LoopParams, Orchestrator, TradeOp, TradeOutcome, TradeRequest};
