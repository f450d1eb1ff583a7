//! Signing wallet decoded from a registry record
//!
//! SECURITY:
//! - The keypair is never serialized or logged
//! - `Debug` prints the address only

use crate::wallet::WalletRecord;
use crate::{Error, Result};
use secrecy::ExposeSecret;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

/// A keypair ready to sign trades for one target
pub struct TradingWallet {
    keypair: Keypair,
}

impl TradingWallet {
    /// Decode the base58 secret of a registry record
    ///
    /// Fails if the stored secret does not decode to a keypair or if it
    /// does not match the recorded address.
    pub fn from_record(record: &WalletRecord) -> Result<Self> {
        let wallet = Self::from_base58(record.secret.expose_secret())?;

        if wallet.address_string() != record.address {
            return Err(Error::Wallet(format!(
                "Secret for wallet {} does not match its address",
                record.address
            )));
        }
        Ok(wallet)
    }

    /// Create a wallet from a base58-encoded 64-byte keypair
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| Error::Wallet(format!("Invalid base58 secret: {}", e)))?;

        let keypair = Keypair::try_from(bytes.as_slice())
            .map_err(|e| Error::Wallet(format!("Invalid keypair bytes: {}", e)))?;

        Ok(Self { keypair })
    }

    /// Get the public key (safe to share)
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn address_string(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    /// Signer for transaction assembly
    pub fn signer(&self) -> &Keypair {
        &self.keypair
    }
}

// Implement Debug manually to avoid exposing the keypair
impl std::fmt::Debug for TradingWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingWallet")
            .field("address", &self.pubkey())
            .field("keypair", &"[REDACTED]")
            .finish()
    }
}
