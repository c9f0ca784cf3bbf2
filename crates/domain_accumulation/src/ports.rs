//! Accumulation Domain Ports
//!
//! Port interfaces the data sourcer and response processor depend on. The
//! services receive them as `Arc<dyn ...>` for the lifetime of one batch run.
//!
//! - [`AccumulationStore`]: the reconciliation store, the single source of
//!   truth for which claims are already claimed (infra_db, or
//!   [`crate::memory`] for tests)
//! - [`ClaimSource`]: eligible claim records from the billing subsystem
//! - [`TransferPort`]: encryption and remote transfer (infra_transfer)
//!
//! ```rust,ignore
//! let sourcer = DataSourcer::new(store, claims, transfer, registry);
//! let summary = sourcer.run(&code, report_date).await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use core_kernel::{DomainPort, HealthCheckable, MappingId, PayerId, PortError, ReportId};

use crate::mapping::AccumulationTreatmentMapping;
use crate::payer::{Payer, PayerCode};
use crate::record::AccumulationClaimRecord;
use crate::report::PayerAccumulationReport;
use crate::status::{ReportStatus, TreatmentAccumulationStatus};

/// Result of trying to claim a record for a new batch
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// A new WAITING mapping was inserted
    Claimed(AccumulationTreatmentMapping),
    /// An existing WAITING mapping was reused with its transaction id
    Resumed(AccumulationTreatmentMapping),
    /// A SUBMITTED mapping exists; the claim is in flight
    AlreadyActive {
        mapping_id: MappingId,
        status: TreatmentAccumulationStatus,
    },
    /// A terminal mapping exists and the record is not flagged for resend
    AlreadyFinished {
        mapping_id: MappingId,
        status: TreatmentAccumulationStatus,
    },
}

impl ClaimOutcome {
    /// The mapping to batch, if the record was claimed
    pub fn into_mapping(self) -> Option<AccumulationTreatmentMapping> {
        match self {
            ClaimOutcome::Claimed(mapping) | ClaimOutcome::Resumed(mapping) => Some(mapping),
            _ => None,
        }
    }
}

/// Persistence port for payers, mappings and reports
#[async_trait]
pub trait AccumulationStore: DomainPort + HealthCheckable {
    /// Looks up a payer by code
    async fn find_payer(&self, code: &PayerCode) -> Result<Option<Payer>, PortError>;

    /// Claims a record for batching in a single transaction
    ///
    /// Inserts a WAITING mapping when the claim has no non-terminal mapping
    /// with this payer (and either no terminal one or `record.resend`), and
    /// reuses an existing WAITING mapping. Never creates a second
    /// non-terminal mapping for the same (claim, payer).
    async fn claim_mapping(&self, record: &AccumulationClaimRecord) -> Result<ClaimOutcome, PortError>;

    /// Reports on the payer for one date, oldest first
    async fn find_reports(&self, payer_id: PayerId, report_date: NaiveDate) -> Result<Vec<PayerAccumulationReport>, PortError>;

    /// Upserts the report and attaches exactly `mapping_ids` among its WAITING mappings
    async fn save_report(&self, report: &PayerAccumulationReport, mapping_ids: &[MappingId]) -> Result<(), PortError>;

    /// Sets the final report status
    ///
    /// SUBMITTED flips the report's WAITING mappings to SUBMITTED in the same
    /// transaction and returns how many moved. FAILURE leaves them WAITING.
    async fn complete_report(&self, report_id: ReportId, status: ReportStatus) -> Result<u64, PortError>;

    async fn find_mapping_by_transaction(&self, payer_id: PayerId, transaction_id: &str) -> Result<Option<AccumulationTreatmentMapping>, PortError>;

    /// Writes `mapping` only if the stored status still equals `expected`
    ///
    /// Returns `PortError::Conflict` when another writer got there first.
    async fn update_mapping(&self, mapping: &AccumulationTreatmentMapping, expected: TreatmentAccumulationStatus) -> Result<(), PortError>;

    async fn get_mapping(&self, id: MappingId) -> Result<AccumulationTreatmentMapping, PortError>;

    async fn get_report(&self, id: ReportId) -> Result<PayerAccumulationReport, PortError>;

    /// Mappings for an upstream claim or request UUID, across payers
    async fn mappings_for_claim(&self, claim_id: Uuid) -> Result<Vec<AccumulationTreatmentMapping>, PortError>;

    async fn mappings_for_report(&self, report_id: ReportId) -> Result<Vec<AccumulationTreatmentMapping>, PortError>;

    /// Marks a claimed mapping REJECTED after the builder refused its record
    async fn record_build_rejection(&self, id: MappingId, reason: &str) -> Result<AccumulationTreatmentMapping, PortError> {
        let mut mapping = self.get_mapping(id).await?;
        let expected = mapping.status();
        mapping
            .reject(reason)
            .map_err(|e| PortError::conflict(e.to_string()))?;
        self.update_mapping(&mapping, expected).await?;
        Ok(mapping)
    }
}

/// Eligible claims supplied by the billing subsystem
#[async_trait]
pub trait ClaimSource: DomainPort {
    /// Claims eligible for accumulation with `payer` as of `report_date`
    async fn eligible_claims(&self, payer: &Payer, report_date: NaiveDate) -> Result<Vec<AccumulationClaimRecord>, PortError>;
}

/// Secure transfer failures
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum TransferError {
    /// Key material could not be imported
    #[error("Key import failed: {0}")]
    KeyImport(String),

    /// Bad passphrase, corrupted payload or failed authentication
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Retries exhausted or a non-retryable store failure
    #[error("Transfer failed after {attempts} attempt(s): {message}")]
    TransferFailure { attempts: u32, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },
}

impl TransferError {
    /// Security failures are fatal for the file and never retried
    pub fn is_security(&self) -> bool {
        matches!(self, TransferError::KeyImport(_) | TransferError::Decryption(_))
    }
}

/// Encryption plus remote push/pull of payer files
#[async_trait]
pub trait TransferPort: DomainPort {
    /// Encrypts `body` and ships it to the payer exchange and the backup store
    async fn submit(&self, payer: &PayerCode, filename: &str, body: &str) -> Result<(), TransferError>;

    /// Downloads a response file and decrypts it
    async fn retrieve(&self, payer: &PayerCode, filename: &str) -> Result<String, TransferError>;
}
