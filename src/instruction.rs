//! pump.fun buy/sell instruction encoding
//!
//! Pure functions, no I/O. Each instruction carries a 16-byte payload
//! (8-byte discriminator + little-endian `u64` amount) and three accounts:
//! the payer (signer, writable), the mint (writable) and the system program.

use crate::{Error, Result};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_program,
};

pub const PUMP_FUN_PROGRAM_ID: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");

/// Anchor instruction discriminators (`sha256("global:<name>")[..8]`)
pub mod discriminators {
    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
}

pub const PAYLOAD_LEN: usize = 16;

/// A buy or sell against the bonding curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeInstruction {
    /// Spend `lamports` of SOL on `mint`
    Buy {
        payer: Pubkey,
        mint: Pubkey,
        lamports: u64,
    },
    /// Sell `token_amount` raw units of `mint`
    Sell {
        payer: Pubkey,
        mint: Pubkey,
        token_amount: u64,
    },
}

pub fn encode_buy(buyer: Pubkey, mint: Pubkey, lamports: u64) -> Result<TradeInstruction> {
    if lamports == 0 {
        return Err(Error::InvalidArgument(
            "Lamports must be positive".to_string(),
        ));
    }
    Ok(TradeInstruction::Buy {
        payer: buyer,
        mint,
        lamports,
    })
}

pub fn encode_sell(seller: Pubkey, mint: Pubkey, token_amount: u64) -> Result<TradeInstruction> {
    if token_amount == 0 {
        return Err(Error::InvalidArgument(
            "Token amount must be positive".to_string(),
        ));
    }
    Ok(TradeInstruction::Sell {
        payer: seller,
        mint,
        token_amount,
    })
}

impl TradeInstruction {
    pub fn payer(&self) -> Pubkey {
        match self {
            TradeInstruction::Buy { payer, .. } | TradeInstruction::Sell { payer, .. } => *payer,
        }
    }

    pub fn mint(&self) -> Pubkey {
        match self {
            TradeInstruction::Buy { mint, .. } | TradeInstruction::Sell { mint, .. } => *mint,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TradeInstruction::Buy { lamports, .. } => *lamports,
            TradeInstruction::Sell { token_amount, .. } => *token_amount,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TradeInstruction::Buy { .. } => "buy",
            TradeInstruction::Sell { .. } => "sell",
        }
    }

    pub fn discriminator(&self) -> [u8; 8] {
        match self {
            TradeInstruction::Buy { .. } => discriminators::BUY,
            TradeInstruction::Sell { .. } => discriminators::SELL,
        }
    }

    /// The fixed-layout instruction payload
    pub fn data(&self) -> [u8; PAYLOAD_LEN] {
        let mut data = [0u8; PAYLOAD_LEN];
        data[..8].copy_from_slice(&self.discriminator());
        data[8..].copy_from_slice(&self.amount().to_le_bytes());
        data
    }

    pub fn accounts(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.payer(), true),
            AccountMeta::new(self.mint(), false),
            AccountMeta::new_readonly(system_program::ID, false),
        ]
    }

    pub fn to_instruction(&self) -> Instruction {
        Instruction {
            program_id: PUMP_FUN_PROGRAM_ID,
            accounts: self.accounts(),
            data: self.data().to_vec(),
        }
    }
}
