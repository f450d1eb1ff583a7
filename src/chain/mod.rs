//! On-chain reads: token balances and recent blockhashes

pub mod rpc;

pub use rpc::{select_endpoint, HttpRpcTransport, RpcTransport};

use crate::config::RpcConfig;
use crate::{Error, Result};
use serde::Serialize;
use solana_sdk::hash::Hash;
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Token accounts shorter than this are treated as empty
pub const MIN_TOKEN_ACCOUNT_LEN: usize = 64;

/// Holdings of one wallet for one mint
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Balance {
    /// Raw token units
    pub token_amount: u64,
    /// Native balance of the owner
    pub sol: f64,
}

/// Associated token account of `owner` for `mint`
pub fn derive_token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Raw token amount held in an account's data
fn token_amount_from_data(data: &[u8]) -> u64 {
    if data.len() < MIN_TOKEN_ACCOUNT_LEN {
        return 0;
    }
    let mut amount = [0u8; 8];
    amount.copy_from_slice(&data[..8]);
    u64::from_le_bytes(amount)
}

/// Reads balances and blockhashes, re-selecting an endpoint for every call
#[derive(Clone)]
pub struct ChainReader {
    rpc: Arc<dyn RpcTransport>,
    config: RpcConfig,
}

impl ChainReader {
    pub fn new(rpc: Arc<dyn RpcTransport>, config: RpcConfig) -> Self {
        Self { rpc, config }
    }

    /// Token and SOL balance of `owner`
    ///
    /// A missing token account reads as zero tokens. Any RPC failure is an
    /// error; an unknown balance is never reported as zero.
    pub async fn read_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Balance> {
        let endpoint = select_endpoint(self.rpc.as_ref(), &self.config).await?;
        let token_account = derive_token_account(owner, mint);

        let lamports = self
            .rpc
            .get_balance(&endpoint, owner)
            .await
            .map_err(|e| balance_error(owner, e))?;

        let token_amount = self
            .rpc
            .get_account_data(&endpoint, &token_account)
            .await
            .map_err(|e| balance_error(owner, e))?
            .map(|data| token_amount_from_data(&data))
            .unwrap_or(0);

        tracing::debug!(
            owner = %owner,
            token_account = %token_account,
            token_amount,
            lamports,
            "Read balance"
        );

        Ok(Balance {
            token_amount,
            sol: lamports_to_sol(lamports),
        })
    }

    pub async fn latest_blockhash(&self) -> Result<Hash> {
        let endpoint = select_endpoint(self.rpc.as_ref(), &self.config).await?;
        self.rpc.get_latest_blockhash(&endpoint).await
    }
}

fn balance_error(owner: &Pubkey, err: Error) -> Error {
    match err {
        Error::Transport(msg) => {
            Error::Transport(format!("balance read for {} failed: {}", owner, msg))
        }
        other => other,
    }
}
