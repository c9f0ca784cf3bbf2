//! PostgreSQL Accumulation Adapters
//!
//! [`PostgresAccumulationStore`] implements the domain `AccumulationStore`
//! port and [`PostgresClaimSource`] the `ClaimSource` port, both on top of
//! [`AccumulationRepository`].
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresAccumulationStore;
//! use domain_accumulation::AccumulationStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn AccumulationStore> = Arc::new(PostgresAccumulationStore::new(pool));
//! let outcome = store.claim_mapping(&record).await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    Cents, ClaimReference, DomainPort, HealthCheckResult, HealthCheckable, MappingId, PayerId, PortError,
    ReportId,
};
use domain_accumulation::{
    AccumulationClaimRecord, AccumulationStore, AccumulationTreatmentMapping, ClaimOutcome, ClaimSource,
    MemberDemographics, Payer, PayerAccumulationReport, PayerCode, ReportStatus, TreatmentAccumulationStatus,
};

use crate::repositories::accumulation::{
    AccumulationRepository, ClaimFeedRow, ClaimedRow, MappingRow, MappingStatus, PayerRow, ReportRow,
    ReportStatusDb,
};

/// PostgreSQL-backed reconciliation store
///
/// Database errors are translated to `PortError`; a unique violation on the
/// active-mapping index or a lost compare-and-set becomes
/// `PortError::Conflict`.
#[derive(Debug, Clone)]
pub struct PostgresAccumulationStore {
    repository: AccumulationRepository,
}

impl PostgresAccumulationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AccumulationRepository::new(pool),
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &AccumulationRepository {
        &self.repository
    }

    /// Registers a payer, keyed by code
    pub async fn upsert_payer(&self, payer: &Payer) -> Result<Payer, PortError> {
        let row = self.repository.upsert_payer(&payer_to_row(payer)).await?;
        row_to_payer(row)
    }
}

impl DomainPort for PostgresAccumulationStore {}

#[async_trait]
impl HealthCheckable for PostgresAccumulationStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(self.repository.pool(), "postgres-accumulation-store").await
    }
}

#[async_trait]
impl AccumulationStore for PostgresAccumulationStore {
    #[instrument(skip_all, fields(payer = %code))]
    async fn find_payer(&self, code: &PayerCode) -> Result<Option<Payer>, PortError> {
        self.repository
            .find_payer_by_code(code.as_str())
            .await?
            .map(row_to_payer)
            .transpose()
    }

    #[instrument(skip_all, fields(claim = %record.claim, payer_id = %record.payer_id))]
    async fn claim_mapping(&self, record: &AccumulationClaimRecord) -> Result<ClaimOutcome, PortError> {
        let candidate = mapping_to_row(&AccumulationTreatmentMapping::new(record.claim, record.payer_id));
        let claimed = self
            .repository
            .claim_mapping(&candidate, record.resend.then_some(record.published_at))
            .await?;

        let outcome = match claimed {
            ClaimedRow::Inserted(row) => ClaimOutcome::Claimed(row_to_mapping(row)?),
            ClaimedRow::Existing(row) => {
                let mapping = row_to_mapping(row)?;
                match mapping.status() {
                    TreatmentAccumulationStatus::Waiting => ClaimOutcome::Resumed(mapping),
                    status if !status.is_terminal() => ClaimOutcome::AlreadyActive {
                        mapping_id: mapping.id,
                        status,
                    },
                    status => ClaimOutcome::AlreadyFinished {
                        mapping_id: mapping.id,
                        status,
                    },
                }
            }
        };
        debug!(?outcome, "Claimed record");
        Ok(outcome)
    }

    #[instrument(skip_all, fields(payer_id = %payer_id, report_date = %report_date))]
    async fn find_reports(&self, payer_id: PayerId, report_date: NaiveDate) -> Result<Vec<PayerAccumulationReport>, PortError> {
        let rows = self.repository.find_reports(payer_id.into(), report_date).await?;
        Ok(rows.into_iter().map(row_to_report).collect())
    }

    #[instrument(skip_all, fields(report_id = %report.id, filename = %report.filename, mappings = mapping_ids.len()))]
    async fn save_report(&self, report: &PayerAccumulationReport, mapping_ids: &[MappingId]) -> Result<(), PortError> {
        let ids: Vec<Uuid> = mapping_ids.iter().map(|id| Uuid::from(*id)).collect();
        self.repository.save_report(&report_to_row(report), &ids).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(report_id = %report_id, status = %status))]
    async fn complete_report(&self, report_id: ReportId, status: ReportStatus) -> Result<u64, PortError> {
        let flipped = self
            .repository
            .complete_report(report_id.into(), report_status_to_db(status))
            .await?;
        Ok(flipped)
    }

    #[instrument(skip_all, fields(payer_id = %payer_id, transaction_id = %transaction_id))]
    async fn find_mapping_by_transaction(&self, payer_id: PayerId, transaction_id: &str) -> Result<Option<AccumulationTreatmentMapping>, PortError> {
        self.repository
            .find_mapping_by_transaction(payer_id.into(), transaction_id)
            .await?
            .map(row_to_mapping)
            .transpose()
    }

    #[instrument(skip_all, fields(mapping_id = %mapping.id, expected = %expected, status = %mapping.status()))]
    async fn update_mapping(&self, mapping: &AccumulationTreatmentMapping, expected: TreatmentAccumulationStatus) -> Result<(), PortError> {
        self.repository
            .update_mapping_if_status(&mapping_to_row(mapping), status_to_db(expected))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(mapping_id = %id))]
    async fn get_mapping(&self, id: MappingId) -> Result<AccumulationTreatmentMapping, PortError> {
        let row = self.repository.get_mapping(id.into()).await?;
        row_to_mapping(row)
    }

    #[instrument(skip_all, fields(report_id = %id))]
    async fn get_report(&self, id: ReportId) -> Result<PayerAccumulationReport, PortError> {
        let row = self.repository.get_report(id.into()).await?;
        Ok(row_to_report(row))
    }

    #[instrument(skip_all, fields(claim_id = %claim_id))]
    async fn mappings_for_claim(&self, claim_id: Uuid) -> Result<Vec<AccumulationTreatmentMapping>, PortError> {
        let rows = self.repository.mappings_for_claim(claim_id).await?;
        rows.into_iter().map(row_to_mapping).collect()
    }

    #[instrument(skip_all, fields(report_id = %report_id))]
    async fn mappings_for_report(&self, report_id: ReportId) -> Result<Vec<AccumulationTreatmentMapping>, PortError> {
        let rows = self.repository.mappings_for_report(report_id.into()).await?;
        rows.into_iter().map(row_to_mapping).collect()
    }
}

/// Claim source reading the `accumulation_claim_feed` table
#[derive(Debug, Clone)]
pub struct PostgresClaimSource {
    repository: AccumulationRepository,
}

impl PostgresClaimSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AccumulationRepository::new(pool),
        }
    }

    /// Publishes a record to the feed, eligible from `eligible_on`
    pub async fn publish(&self, record: &AccumulationClaimRecord, eligible_on: NaiveDate) -> Result<(), PortError> {
        self.repository
            .insert_feed_row(&record_to_feed_row(record), eligible_on)
            .await?;
        Ok(())
    }
}

impl DomainPort for PostgresClaimSource {}

#[async_trait]
impl ClaimSource for PostgresClaimSource {
    #[instrument(skip_all, fields(payer = %payer.code, report_date = %report_date))]
    async fn eligible_claims(&self, payer: &Payer, report_date: NaiveDate) -> Result<Vec<AccumulationClaimRecord>, PortError> {
        let rows = self.repository.eligible_claims(payer.id.into(), report_date).await?;
        debug!(count = rows.len(), "Loaded eligible claims");
        rows.into_iter().map(feed_row_to_record).collect()
    }
}

async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {e}")),
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn status_to_db(status: TreatmentAccumulationStatus) -> MappingStatus {
    match status {
        TreatmentAccumulationStatus::Waiting => MappingStatus::Waiting,
        TreatmentAccumulationStatus::Submitted => MappingStatus::Submitted,
        TreatmentAccumulationStatus::Processed => MappingStatus::Processed,
        TreatmentAccumulationStatus::Accepted => MappingStatus::Accepted,
        TreatmentAccumulationStatus::Rejected => MappingStatus::Rejected,
        TreatmentAccumulationStatus::RowError => MappingStatus::RowError,
        TreatmentAccumulationStatus::Refunded => MappingStatus::Refunded,
        TreatmentAccumulationStatus::Skip => MappingStatus::Skip,
    }
}

fn status_from_db(status: MappingStatus) -> TreatmentAccumulationStatus {
    match status {
        MappingStatus::Waiting => TreatmentAccumulationStatus::Waiting,
        MappingStatus::Submitted => TreatmentAccumulationStatus::Submitted,
        MappingStatus::Processed => TreatmentAccumulationStatus::Processed,
        MappingStatus::Accepted => TreatmentAccumulationStatus::Accepted,
        MappingStatus::Rejected => TreatmentAccumulationStatus::Rejected,
        MappingStatus::RowError => TreatmentAccumulationStatus::RowError,
        MappingStatus::Refunded => TreatmentAccumulationStatus::Refunded,
        MappingStatus::Skip => TreatmentAccumulationStatus::Skip,
    }
}

fn report_status_to_db(status: ReportStatus) -> ReportStatusDb {
    match status {
        ReportStatus::New => ReportStatusDb::New,
        ReportStatus::Submitted => ReportStatusDb::Submitted,
        ReportStatus::Failure => ReportStatusDb::Failure,
    }
}

fn report_status_from_db(status: ReportStatusDb) -> ReportStatus {
    match status {
        ReportStatusDb::New => ReportStatus::New,
        ReportStatusDb::Submitted => ReportStatus::Submitted,
        ReportStatusDb::Failure => ReportStatus::Failure,
    }
}

fn payer_to_row(payer: &Payer) -> PayerRow {
    PayerRow {
        payer_id: payer.id.into(),
        name: payer.name.clone(),
        code: payer.code.as_str().to_string(),
    }
}

fn row_to_payer(row: PayerRow) -> Result<Payer, PortError> {
    let code = PayerCode::new(&row.code).map_err(|e| PortError::transformation(e.to_string()))?;
    Ok(Payer {
        id: PayerId::from(row.payer_id),
        name: row.name,
        code,
    })
}

fn mapping_to_row(mapping: &AccumulationTreatmentMapping) -> MappingRow {
    let (claim, request) = mapping.claim.into_parts();
    MappingRow {
        mapping_id: mapping.id.into(),
        reimbursement_claim_id: claim,
        reimbursement_request_id: request,
        payer_id: mapping.payer_id.into(),
        accumulation_transaction_id: mapping.accumulation_transaction_id.clone(),
        report_id: mapping.report_id.map(Uuid::from),
        status: status_to_db(mapping.status()),
        deductible_cents: mapping.deductible.map(i64::from),
        oop_applied_cents: mapping.oop_applied.map(i64::from),
        response_code: mapping.response_code.clone(),
        completed_at: mapping.completed_at,
        created_at: mapping.created_at,
        modified_at: mapping.modified_at,
    }
}

fn row_to_mapping(row: MappingRow) -> Result<AccumulationTreatmentMapping, PortError> {
    let claim = ClaimReference::from_parts(row.reimbursement_claim_id, row.reimbursement_request_id)
        .map_err(|e| PortError::transformation(format!("mapping {}: {e}", row.mapping_id)))?;

    Ok(AccumulationTreatmentMapping {
        id: MappingId::from(row.mapping_id),
        claim,
        payer_id: PayerId::from(row.payer_id),
        accumulation_transaction_id: row.accumulation_transaction_id,
        report_id: row.report_id.map(ReportId::from),
        treatment_accumulation_status: status_from_db(row.status),
        deductible: row.deductible_cents.map(Cents::new),
        oop_applied: row.oop_applied_cents.map(Cents::new),
        response_code: row.response_code,
        completed_at: row.completed_at,
        created_at: row.created_at,
        modified_at: row.modified_at,
    })
}

fn report_to_row(report: &PayerAccumulationReport) -> ReportRow {
    ReportRow {
        report_id: report.id.into(),
        payer_id: report.payer_id.into(),
        filename: report.filename.clone(),
        report_date: report.report_date,
        status: report_status_to_db(report.status),
        created_at: report.created_at,
        modified_at: report.modified_at,
    }
}

fn row_to_report(row: ReportRow) -> PayerAccumulationReport {
    PayerAccumulationReport {
        id: ReportId::from(row.report_id),
        payer_id: PayerId::from(row.payer_id),
        filename: row.filename,
        report_date: row.report_date,
        status: report_status_from_db(row.status),
        created_at: row.created_at,
        modified_at: row.modified_at,
    }
}

fn record_to_feed_row(record: &AccumulationClaimRecord) -> ClaimFeedRow {
    let (claim, request) = record.claim.into_parts();
    ClaimFeedRow {
        reimbursement_claim_id: claim,
        reimbursement_request_id: request,
        payer_id: record.payer_id.into(),
        member_plan_id: record.member_plan_id.clone(),
        date_of_service: record.date_of_service,
        deductible_applied_cents: record.deductible_applied.map(i64::from),
        oop_applied_cents: record.oop_applied.map(i64::from),
        member_first_name: record.member.as_ref().map(|m| m.first_name.clone()),
        member_last_name: record.member.as_ref().map(|m| m.last_name.clone()),
        member_date_of_birth: record.member.as_ref().map(|m| m.date_of_birth),
        resend: record.resend,
        published_at: record.published_at,
    }
}

fn feed_row_to_record(row: ClaimFeedRow) -> Result<AccumulationClaimRecord, PortError> {
    let claim = ClaimReference::from_parts(row.reimbursement_claim_id, row.reimbursement_request_id)
        .map_err(|e| PortError::transformation(format!("claim feed row: {e}")))?;

    // Demographics are all-or-nothing; a partial set is treated as absent.
    let member = match (row.member_first_name, row.member_last_name, row.member_date_of_birth) {
        (Some(first_name), Some(last_name), Some(date_of_birth)) => Some(MemberDemographics {
            first_name,
            last_name,
            date_of_birth,
        }),
        _ => None,
    };

    Ok(AccumulationClaimRecord {
        claim,
        payer_id: PayerId::from(row.payer_id),
        member_plan_id: row.member_plan_id,
        date_of_service: row.date_of_service,
        deductible_applied: row.deductible_applied_cents.map(Cents::new),
        oop_applied: row.oop_applied_cents.map(Cents::new),
        member,
        resend: row.resend,
        published_at: row.published_at,
    })
}
