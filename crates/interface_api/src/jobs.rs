//! Batch job wiring
//!
//! Each `accumulation-jobs` invocation builds its own store, claim source
//! and transfer client from [`JobsConfig`], runs one payer, logs a summary
//! line and exits. Nothing here is shared between runs.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};

use domain_accumulation::{
    AccumulationError, AccumulationStore, ClaimSource, DataSourcer, PayerCode, PayerRegistry,
    ReconciliationSummary, ResponseProcessor, SourcingSummary, TransferPort,
};
use infra_db::{create_pool, DatabaseError, PostgresAccumulationStore, PostgresClaimSource};
use infra_transfer::{
    generate_keypair, CryptoError, FileStore, HttpBucketStore, LocalDirectoryStore, Passphrase,
    PayerPrivateKey, PayerPublicKey, PayerTransferSettings, SecureTransferClient, StoreError,
};

use crate::config::{JobsConfig, PayerConfig};

/// Errors that stop a job before or during a run
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Key error for payer {payer}: {source}")]
    Key {
        payer: String,
        #[source]
        source: CryptoError,
    },

    #[error("Cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Accumulation(#[from] AccumulationError),
}

impl JobError {
    /// Key import and decryption failures need an operator, not a rerun
    pub fn is_security(&self) -> bool {
        match self {
            JobError::Key { .. } => true,
            JobError::Accumulation(e) => e.is_security(),
            _ => false,
        }
    }
}

/// Clients for one job run
pub struct JobRunner {
    store: Arc<dyn AccumulationStore>,
    claims: Arc<dyn ClaimSource>,
    transfer: Arc<dyn TransferPort>,
    registry: Arc<PayerRegistry>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn AccumulationStore>,
        claims: Arc<dyn ClaimSource>,
        transfer: Arc<dyn TransferPort>,
        registry: Arc<PayerRegistry>,
    ) -> Self {
        Self {
            store,
            claims,
            transfer,
            registry,
        }
    }

    /// Connects to Postgres and loads the exchange keys for `payer`
    pub async fn connect(config: &JobsConfig, payer: &PayerCode) -> Result<Self, JobError> {
        let payer_config = config
            .payer(payer.as_str())
            .ok_or_else(|| JobError::Config(format!("no exchange settings for payer {payer}")))?;

        let registry = build_registry(config)?;
        let transfer = build_transfer_client(config, payer, payer_config).await?;

        let pool = create_pool(config.database_config()).await?;
        let store = PostgresAccumulationStore::new(pool.clone());
        let claims = PostgresClaimSource::new(pool);

        Ok(Self::new(
            Arc::new(store),
            Arc::new(claims),
            Arc::new(transfer),
            Arc::new(registry),
        ))
    }

    /// Generates, ships and records one outbound batch
    pub async fn source(&self, payer: &PayerCode, report_date: NaiveDate) -> Result<SourcingSummary, JobError> {
        let sourcer = DataSourcer::new(
            self.store.clone(),
            self.claims.clone(),
            self.transfer.clone(),
            self.registry.clone(),
        );
        let summary = sourcer.run(payer, report_date).await.map_err(|e| {
            error!(payer = %payer, %report_date, error = %e, security = e.is_security(), "Sourcing job failed");
            JobError::from(e)
        })?;

        if summary.is_failure() {
            warn!(
                payer = %payer,
                %report_date,
                filename = summary.filename.as_deref().unwrap_or_default(),
                error = summary.transfer_error.as_deref().unwrap_or_default(),
                "Report marked FAILURE; the next run will retry it"
            );
        }
        Ok(summary)
    }

    /// Reconciles one response file
    pub async fn reconcile(&self, payer: &PayerCode, filename: &str) -> Result<ReconciliationSummary, JobError> {
        let processor = ResponseProcessor::new(self.store.clone(), self.transfer.clone(), self.registry.clone());
        processor.run(payer, filename).await.map_err(|e| {
            error!(payer = %payer, filename, error = %e, security = e.is_security(), "Reconciliation job failed");
            JobError::from(e)
        })
    }
}

/// Built-in payer profiles with configured response-code overrides layered on
pub fn build_registry(config: &JobsConfig) -> Result<PayerRegistry, JobError> {
    let mut registry = PayerRegistry::with_defaults()?;
    for (code, payer) in &config.payers {
        if payer.response_codes.is_empty() {
            continue;
        }
        let code = PayerCode::new(code)?;
        registry.override_response_codes(&code, &payer.response_code_overrides())?;
    }
    Ok(registry)
}

/// Exchange directory store, optional backup bucket and the payer's keys
pub async fn build_transfer_client(
    config: &JobsConfig,
    payer: &PayerCode,
    payer_config: &PayerConfig,
) -> Result<SecureTransferClient, JobError> {
    let settings = load_payer_keys(payer, payer_config).await?;

    let exchange: Arc<dyn FileStore> = Arc::new(LocalDirectoryStore::new(config.transfer.exchange_root.clone()));
    let mut client = SecureTransferClient::new(exchange, config.transfer.retry_policy()).with_payer(payer.clone(), settings);

    if let Some(url) = &config.transfer.backup_url {
        let token = match &config.transfer.backup_token_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                JobError::Config(format!("backup token variable {var} is not set"))
            })?),
            None => None,
        };
        let backup = HttpBucketStore::new(url.clone(), token, config.transfer.attempt_timeout())?;
        client = client.with_backup(Arc::new(backup));
    }
    Ok(client)
}

/// Imports the armored key pair and the passphrase for one payer
pub async fn load_payer_keys(payer: &PayerCode, config: &PayerConfig) -> Result<PayerTransferSettings, JobError> {
    let key_error = |source: CryptoError| JobError::Key {
        payer: payer.to_string(),
        source,
    };

    let public_key = PayerPublicKey::from_armored(&read_key_file(&config.public_key_path).await?).map_err(key_error)?;
    let private_key =
        PayerPrivateKey::from_armored(&read_key_file(&config.private_key_path).await?).map_err(key_error)?;
    let passphrase = Passphrase::from_env(&config.passphrase_env).map_err(key_error)?;

    info!(payer = %payer, key = %public_key.fingerprint(), "Loaded exchange keys");
    Ok(PayerTransferSettings {
        public_key,
        private_key,
        passphrase,
        outbound_dir: config.outbound_dir.clone(),
        inbound_dir: config.inbound_dir.clone(),
    })
}

/// Writes a fresh key pair for onboarding a payer exchange
///
/// The private half is locked under the passphrase currently held in
/// `config.passphrase_env`. Existing files are never overwritten.
pub async fn generate_payer_keys(payer: &PayerCode, config: &PayerConfig) -> Result<String, JobError> {
    let key_error = |source: CryptoError| JobError::Key {
        payer: payer.to_string(),
        source,
    };
    for path in [&config.public_key_path, &config.private_key_path] {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(JobError::Config(format!("refusing to overwrite {}", path.display())));
        }
    }
    let passphrase = Passphrase::from_env(&config.passphrase_env).map_err(key_error)?;
    let pair = generate_keypair(&passphrase).map_err(key_error)?;

    write_key_file(&config.public_key_path, &pair.public.to_armored()).await?;
    write_key_file(&config.private_key_path, &pair.private.to_armored()).await?;

    let fingerprint = pair.public.fingerprint();
    info!(payer = %payer, key = %fingerprint, "Generated exchange key pair");
    Ok(fingerprint)
}

async fn read_key_file(path: &Path) -> Result<String, JobError> {
    tokio::fs::read_to_string(path).await.map_err(|source| JobError::Io {
        path: path.display().to_string(),
        source,
    })
}

async fn write_key_file(path: &Path, content: &str) -> Result<(), JobError> {
    let io_error = |source: std::io::Error| JobError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, content).await.map_err(io_error)
}
