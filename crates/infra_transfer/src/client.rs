//! Secure transfer client
//!
//! Implements the domain `TransferPort` over two file stores: the payer
//! exchange point and the backup bucket. Every upload and download goes
//! through the retry policy; key and decryption failures are returned
//! straight away.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument};

use core_kernel::DomainPort;
use domain_accumulation::{PayerCode, TransferError, TransferPort};

use crate::crypto::{self, Passphrase, PayerPrivateKey, PayerPublicKey};
use crate::error::CryptoError;
use crate::retry::{RetryFailure, RetryPolicy};
use crate::store::FileStore;

/// Keys and exchange directories for one payer
#[derive(Debug, Clone)]
pub struct PayerTransferSettings {
    pub public_key: PayerPublicKey,
    pub private_key: PayerPrivateKey,
    pub passphrase: Passphrase,
    /// Directory below the exchange root that outbound files are written to
    pub outbound_dir: String,
    /// Directory below the exchange root that response files appear in
    pub inbound_dir: String,
}

impl PayerTransferSettings {
    fn outbound_path(&self, filename: &str) -> String {
        join(&self.outbound_dir, filename)
    }

    fn inbound_path(&self, filename: &str) -> String {
        join(&self.inbound_dir, filename)
    }
}

/// Transfer client scoped to one job run
pub struct SecureTransferClient {
    exchange: Arc<dyn FileStore>,
    backup: Option<Arc<dyn FileStore>>,
    policy: RetryPolicy,
    payers: HashMap<PayerCode, PayerTransferSettings>,
}

impl SecureTransferClient {
    pub fn new(exchange: Arc<dyn FileStore>, policy: RetryPolicy) -> Self {
        Self {
            exchange,
            backup: None,
            policy,
            payers: HashMap::new(),
        }
    }

    pub fn with_backup(mut self, backup: Arc<dyn FileStore>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_payer(mut self, code: PayerCode, settings: PayerTransferSettings) -> Self {
        self.payers.insert(code, settings);
        self
    }

    fn settings(&self, payer: &PayerCode) -> Result<&PayerTransferSettings, TransferError> {
        self.payers
            .get(payer)
            .ok_or_else(|| TransferError::KeyImport(format!("no transfer keys configured for payer {payer}")))
    }

    async fn upload(&self, store: &dyn FileStore, path: &str, content: &[u8]) -> Result<(), TransferError> {
        let target = join(&store.describe(), path);
        self.policy
            .run("upload", &target, || store.put(path, content))
            .await
            .map_err(exhausted)
    }
}

impl DomainPort for SecureTransferClient {}

#[async_trait]
impl TransferPort for SecureTransferClient {
    #[instrument(skip(self, body), fields(payer = %payer, filename = %filename))]
    async fn submit(&self, payer: &PayerCode, filename: &str, body: &str) -> Result<(), TransferError> {
        let settings = self.settings(payer)?;
        let sealed = crypto::encrypt(body.as_bytes(), &settings.public_key).map_err(|e| {
            error!(payer = %payer, filename, error = %e, "Encrypting outbound file failed");
            TransferError::from(e)
        })?;

        // The backup copy lands first; once the exchange upload succeeds the
        // file has reached the payer and the batch counts as submitted.
        if let Some(backup) = &self.backup {
            let path = join(payer.as_str(), filename);
            self.upload(backup.as_ref(), &path, sealed.as_bytes()).await?;
        }

        self.upload(self.exchange.as_ref(), &settings.outbound_path(filename), sealed.as_bytes())
            .await?;

        info!(
            payer = %payer,
            filename,
            key = %settings.public_key.fingerprint(),
            "Outbound file transferred"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(payer = %payer, filename = %filename))]
    async fn retrieve(&self, payer: &PayerCode, filename: &str) -> Result<String, TransferError> {
        let settings = self.settings(payer)?;
        let path = settings.inbound_path(filename);
        let target = join(&self.exchange.describe(), &path);

        let bytes = self
            .policy
            .run("download", &target, || self.exchange.get(&path))
            .await
            .map_err(exhausted)?;

        let plaintext = std::str::from_utf8(&bytes)
            .map_err(|_| CryptoError::Decryption("response file is not armored text".to_string()))
            .and_then(|armored| crypto::decrypt(armored, &settings.private_key, &settings.passphrase))
            .and_then(|opened| {
                String::from_utf8(opened)
                    .map_err(|_| CryptoError::Decryption("decrypted response is not UTF-8".to_string()))
            })
            .map_err(|e| {
                error!(payer = %payer, filename, error = %e, "Decrypting response file failed");
                TransferError::from(e)
            })?;

        info!(payer = %payer, filename, bytes = plaintext.len(), "Response file retrieved");
        Ok(plaintext)
    }
}

fn exhausted(failure: RetryFailure) -> TransferError {
    failure.last_error.into_transfer_error(failure.attempts)
}

fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("", "ANTHEM_20250101"), "ANTHEM_20250101");
        assert_eq!(join("outbound/", "ANTHEM_20250101"), "outbound/ANTHEM_20250101");
    }
}
