//! Flat-file wallet registry
//!
//! One JSON array of records, read and rewritten whole on every change. Lookup
//! is a linear scan over each record's `used_for` list, which is fine for the
//! handful of targets a single operator trades.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// A stored wallet and the targets it trades
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Base58 public key
    pub address: String,
    /// Base58 of the 64-byte keypair
    #[serde(serialize_with = "serialize_secret")]
    pub secret: SecretString,
    /// Target identifiers this wallet has been used for
    pub used_for: Vec<String>,
    pub created_at: DateTime<Utc>,
}

fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl WalletRecord {
    fn generate(target_id: &str) -> Self {
        let keypair = Keypair::new();
        Self {
            address: keypair.pubkey().to_string(),
            secret: SecretString::from(keypair.to_base58_string()),
            used_for: vec![target_id.to_string()],
            created_at: Utc::now(),
        }
    }

    pub fn is_used_for(&self, target_id: &str) -> bool {
        self.used_for.iter().any(|t| t == target_id)
    }
}

impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .field("used_for", &self.used_for)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Maps target identifiers to dedicated wallets
pub struct WalletRegistry {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl WalletRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, creating an empty registry file if none exists
    pub async fn load(&self) -> Result<Vec<WalletRecord>> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    /// Read-only lookup
    pub async fn find(&self, target_id: &str) -> Result<Option<WalletRecord>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.is_used_for(target_id)))
    }

    /// Return the wallet for `target_id`, generating and persisting one if needed
    pub async fn get_or_create(&self, target_id: &str) -> Result<WalletRecord> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        if let Some(existing) = records.iter().find(|r| r.is_used_for(target_id)) {
            tracing::debug!(target_id, address = %existing.address, "Reusing wallet");
            return Ok(existing.clone());
        }

        let record = WalletRecord::generate(target_id);
        records.push(record.clone());
        self.write_all(&records).await?;

        tracing::info!(
            target_id,
            address = %record.address,
            wallets = records.len(),
            "Created wallet for new target"
        );
        Ok(record)
    }

    async fn read_all(&self) -> Result<Vec<WalletRecord>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.storage_error("stat", e))?
        {
            tracing::info!(path = %self.path.display(), "Initializing empty wallet registry");
            self.write_all(&[]).await?;
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.storage_error("read", e))?;

        serde_json::from_str(&content).map_err(|e| self.storage_error("parse", e))
    }

    async fn write_all(&self, records: &[WalletRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.storage_error("write", e))
    }

    fn storage_error(&self, action: &str, err: impl std::fmt::Display) -> Error {
        Error::Storage(format!(
            "Failed to {} {}: {}",
            action,
            self.path.display(),
            err
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::TradingWallet;
    use tempfile::TempDir;

    fn registry_in(dir: &TempDir) -> WalletRegistry {
        WalletRegistry::new(dir.path().join("wallets.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_initialized() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let records = registry.load().await.unwrap();

        assert!(records.is_empty());
        let content = std::fs::read_to_string(registry.path()).unwrap();
        assert_eq!(content.trim(), "[]");
    }

    #[tokio::test]
    async fn test_distinct_targets_get_distinct_wallets() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let a = registry.get_or_create("MintA").await.unwrap();
        let b = registry.get_or_create("MintB").await.unwrap();

        assert_ne!(a.address, b.address);
        assert_eq!(registry.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_target_reuses_wallet() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let first = registry.get_or_create("MintA").await.unwrap();
        let second = registry.get_or_create("MintA").await.unwrap();

        assert_eq!(first.address, second.address);
        assert_eq!(registry.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let created = registry_in(&dir).get_or_create("MintA").await.unwrap();

        let reopened = registry_in(&dir);
        let found = reopened.find("MintA").await.unwrap().expect("persisted");

        assert_eq!(found.address, created.address);
        assert_eq!(found.used_for, vec!["MintA".to_string()]);
        // secret decodes back into the same keypair
        let wallet = TradingWallet::from_record(&found).unwrap();
        assert_eq!(wallet.address_string(), created.address);

        assert!(reopened.find("MintB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        std::fs::write(registry.path(), "{ not json").unwrap();

        let err = registry.get_or_create("MintA").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        // file left untouched
        assert_eq!(
            std::fs::read_to_string(registry.path()).unwrap(),
            "{ not json"
        );
    }

    #[tokio::test]
    async fn test_unwritable_path_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let registry = WalletRegistry::new(dir.path().join("missing").join("wallets.json"));

        let err = registry.get_or_create("MintA").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = WalletRecord::generate("MintA");
        let debug_str = format!("{:?}", record);

        assert!(!debug_str.contains(record.secret.expose_secret()));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
