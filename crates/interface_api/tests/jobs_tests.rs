//! Job wiring tests: key files, registry overrides and full runs over in-memory adapters

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use core_kernel::Cents;
use domain_accumulation::memory::{InMemoryAccumulationStore, InMemoryTransfer, StaticClaimSource};
use domain_accumulation::{
    PayerCode, PayerRegistry, ReportStatus, ResponseOutcome, TransferError, TransferPort, TreatmentAccumulationStatus,
};
use infra_transfer::{decrypt, generate_keypair_with_iterations, FileStore, LocalDirectoryStore, Passphrase};
use interface_api::config::{JobsConfig, PayerConfig, TransferConfig};
use interface_api::jobs::{build_registry, build_transfer_client, generate_payer_keys, load_payer_keys, JobError, JobRunner};
use test_utils::{
    assert_all_mappings_in, ClaimRecordBuilder, DateFixtures, PayerFixtures, ResponseFileBuilder,
};

fn payer_config(dir: &Path, passphrase_env: &str) -> PayerConfig {
    PayerConfig {
        public_key_path: dir.join("keys/anthem.pub"),
        private_key_path: dir.join("keys/anthem.key"),
        passphrase_env: passphrase_env.to_string(),
        outbound_dir: "anthem/out".to_string(),
        inbound_dir: "anthem/in".to_string(),
        response_codes: HashMap::new(),
    }
}

/// Writes a quickly derived key pair where `config` expects it
fn write_keys(config: &PayerConfig, passphrase: &str) {
    let pair = generate_keypair_with_iterations(&Passphrase::new(passphrase), 1_000).unwrap();
    std::fs::create_dir_all(config.public_key_path.parent().unwrap()).unwrap();
    std::fs::write(&config.public_key_path, pair.public.to_armored()).unwrap();
    std::fs::write(&config.private_key_path, pair.private.to_armored()).unwrap();
}

fn anthem() -> PayerCode {
    PayerFixtures::code("ANTHEM")
}

#[tokio::test]
async fn test_load_payer_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = payer_config(dir.path(), "JOBS_TEST_LOAD_PASSPHRASE");
    write_keys(&config, "load passphrase");
    std::env::set_var("JOBS_TEST_LOAD_PASSPHRASE", "load passphrase");

    let settings = load_payer_keys(&anthem(), &config).await.unwrap();
    assert_eq!(settings.outbound_dir, "anthem/out");
    assert_eq!(settings.inbound_dir, "anthem/in");
}

#[tokio::test]
async fn test_missing_passphrase_is_security_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = payer_config(dir.path(), "JOBS_TEST_UNSET_PASSPHRASE");
    write_keys(&config, "unused");
    std::env::remove_var("JOBS_TEST_UNSET_PASSPHRASE");

    let err = load_payer_keys(&anthem(), &config).await.unwrap_err();
    assert!(matches!(err, JobError::Key { .. }));
    assert!(err.is_security());
}

#[tokio::test]
async fn test_missing_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = payer_config(dir.path(), "JOBS_TEST_NOFILE_PASSPHRASE");

    let err = load_payer_keys(&anthem(), &config).await.unwrap_err();
    assert!(matches!(err, JobError::Io { .. }));
}

#[tokio::test]
async fn test_generate_payer_keys_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let config = payer_config(dir.path(), "JOBS_TEST_KEYGEN_PASSPHRASE");
    std::env::set_var("JOBS_TEST_KEYGEN_PASSPHRASE", "keygen passphrase");

    let fingerprint = generate_payer_keys(&anthem(), &config).await.unwrap();
    assert_eq!(fingerprint.len(), 16);
    let settings = load_payer_keys(&anthem(), &config).await.unwrap();
    assert_eq!(settings.public_key.fingerprint(), fingerprint);

    let err = generate_payer_keys(&anthem(), &config).await.unwrap_err();
    assert!(matches!(err, JobError::Config(_)));
}

#[tokio::test]
async fn test_build_registry_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let mut payer = payer_config(dir.path(), "UNUSED");
    payer.response_codes.insert("zz".to_string(), ResponseOutcome::Refunded);
    let config = JobsConfig {
        payers: HashMap::from([("anthem".to_string(), payer)]),
        ..JobsConfig::default()
    };

    let registry = build_registry(&config).unwrap();
    let codes = &registry.profile(&anthem()).unwrap().response_codes;
    assert_eq!(codes.resolve("ZZ"), Some(ResponseOutcome::Refunded));
    assert_eq!(codes.resolve("PR"), Some(ResponseOutcome::Processed));
}

#[tokio::test]
async fn test_transfer_client_writes_encrypted_outbound_file() {
    let dir = tempfile::tempdir().unwrap();
    let payer = payer_config(dir.path(), "JOBS_TEST_CLIENT_PASSPHRASE");
    write_keys(&payer, "client passphrase");
    std::env::set_var("JOBS_TEST_CLIENT_PASSPHRASE", "client passphrase");

    let exchange_root = dir.path().join("exchange");
    let config = JobsConfig {
        transfer: TransferConfig {
            exchange_root: exchange_root.clone(),
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..TransferConfig::default()
        },
        ..JobsConfig::default()
    };

    let client = build_transfer_client(&config, &anthem(), &payer).await.unwrap();
    client.submit(&anthem(), "ANTHEM_20250101", "HDR*1~").await.unwrap();

    let written = LocalDirectoryStore::new(&exchange_root)
        .get("anthem/out/ANTHEM_20250101")
        .await
        .unwrap();
    let armored = String::from_utf8(written).unwrap();
    assert!(!armored.contains("HDR*1~"));

    let settings = load_payer_keys(&anthem(), &payer).await.unwrap();
    let plain = decrypt(&armored, &settings.private_key, &settings.passphrase).unwrap();
    assert_eq!(plain, b"HDR*1~");
}

struct InMemoryJob {
    store: InMemoryAccumulationStore,
    transfer: InMemoryTransfer,
    runner: JobRunner,
    registry: Arc<PayerRegistry>,
}

async fn in_memory_job(claims: usize) -> InMemoryJob {
    let payer = PayerFixtures::anthem();
    let store = InMemoryAccumulationStore::with_payers(vec![payer.clone()]).await;
    let records = (1..=claims as u128)
        .map(|n| ClaimRecordBuilder::new(payer.id, n).build())
        .collect();
    let transfer = InMemoryTransfer::new();
    let registry = Arc::new(PayerRegistry::with_defaults().unwrap());
    let runner = JobRunner::new(
        Arc::new(store.clone()),
        Arc::new(StaticClaimSource::new(records)),
        Arc::new(transfer.clone()),
        registry.clone(),
    );
    InMemoryJob {
        store,
        transfer,
        runner,
        registry,
    }
}

#[tokio::test]
async fn test_source_then_reconcile() {
    let job = in_memory_job(2).await;

    let summary = job.runner.source(&anthem(), DateFixtures::report_date()).await.unwrap();
    assert!(!summary.is_failure());
    assert_eq!(summary.submitted, 2);
    let filename = summary.filename.unwrap();
    assert_eq!(job.transfer.submitted().await.len(), 1);

    let mappings = job.store.all_mappings().await;
    assert_all_mappings_in(&mappings, TreatmentAccumulationStatus::Submitted);

    let response = ResponseFileBuilder::new(job.registry.profile(&anthem()).unwrap().clone())
        .line(&mappings[0].accumulation_transaction_id, "PR", Some(Cents::new(2500)), Some(Cents::new(1000)), "")
        .line(&mappings[1].accumulation_transaction_id, "AC", None, None, "")
        .build();
    job.transfer.put_response(filename.clone(), response).await;

    let reconciliation = job.runner.reconcile(&anthem(), &filename).await.unwrap();
    assert_eq!(reconciliation.processed, 1);
    assert_eq!(reconciliation.accepted, 1);
    assert_eq!(reconciliation.unmatched, 0);
}

#[tokio::test]
async fn test_failed_upload_is_reported_not_raised() {
    let job = in_memory_job(1).await;
    job.transfer
        .fail_next_submit(TransferError::TransferFailure {
            attempts: 3,
            message: "exchange unreachable".to_string(),
        })
        .await;

    let summary = job.runner.source(&anthem(), DateFixtures::report_date()).await.unwrap();
    assert!(summary.is_failure());
    assert_eq!(job.store.all_reports().await[0].status, ReportStatus::Failure);
    assert_all_mappings_in(&job.store.all_mappings().await, TreatmentAccumulationStatus::Waiting);
}

#[tokio::test]
async fn test_decryption_failure_aborts_reconcile() {
    let job = in_memory_job(0).await;
    job.transfer
        .fail_next_retrieve(TransferError::Decryption("bad passphrase".to_string()))
        .await;

    let err = job.runner.reconcile(&anthem(), "ANTHEM_20250101").await.unwrap_err();
    assert!(err.is_security());
}
