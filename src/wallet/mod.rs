//! Per-token wallet management
//!
//! Secret material is created and persisted by the registry and decoded into a
//! signer only for the duration of one trade. Nothing outside this module
//! formats or logs a secret.

mod registry;
mod signer;

pub use registry::{WalletRecord, WalletRegistry};
pub use signer::TradingWallet;
