//! In-memory adapters
//!
//! Store, claim source and transfer implementations backed by process
//! memory. Used by the test suites across the workspace and by dry runs of
//! the job CLI.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, MappingId, PayerId, PortError, ReportId,
};

use crate::mapping::AccumulationTreatmentMapping;
use crate::payer::{Payer, PayerCode};
use crate::ports::{AccumulationStore, ClaimOutcome, ClaimSource, TransferError, TransferPort};
use crate::record::AccumulationClaimRecord;
use crate::report::PayerAccumulationReport;
use crate::status::{ReportStatus, TreatmentAccumulationStatus};

#[derive(Debug, Default)]
struct StoreState {
    payers: HashMap<PayerCode, Payer>,
    mappings: HashMap<MappingId, AccumulationTreatmentMapping>,
    reports: HashMap<ReportId, PayerAccumulationReport>,
}

/// In-memory reconciliation store
///
/// Every operation takes the single write lock, which gives the same
/// per-claim atomicity the database adapter gets from a transaction.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccumulationStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryAccumulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates with payers
    pub async fn with_payers(payers: Vec<Payer>) -> Self {
        let store = Self::new();
        for payer in payers {
            store.add_payer(payer).await;
        }
        store
    }

    pub async fn add_payer(&self, payer: Payer) {
        self.state.write().await.payers.insert(payer.code.clone(), payer);
    }

    /// Inserts a mapping as-is, bypassing the claim protocol
    pub async fn insert_mapping(&self, mapping: AccumulationTreatmentMapping) {
        self.state.write().await.mappings.insert(mapping.id, mapping);
    }

    pub async fn all_mappings(&self) -> Vec<AccumulationTreatmentMapping> {
        let mut mappings: Vec<_> = self.state.read().await.mappings.values().cloned().collect();
        mappings.sort_by_key(|m| (m.created_at, m.id));
        mappings
    }

    pub async fn all_reports(&self) -> Vec<PayerAccumulationReport> {
        let mut reports: Vec<_> = self.state.read().await.reports.values().cloned().collect();
        reports.sort_by_key(|r| (r.created_at, r.id));
        reports
    }
}

impl DomainPort for InMemoryAccumulationStore {}

#[async_trait]
impl HealthCheckable for InMemoryAccumulationStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-accumulation-store", 0)
    }
}

#[async_trait]
impl AccumulationStore for InMemoryAccumulationStore {
    async fn find_payer(&self, code: &PayerCode) -> Result<Option<Payer>, PortError> {
        Ok(self.state.read().await.payers.get(code).cloned())
    }

    async fn claim_mapping(&self, record: &AccumulationClaimRecord) -> Result<ClaimOutcome, PortError> {
        let mut state = self.state.write().await;
        let mut existing: Vec<&AccumulationTreatmentMapping> = state
            .mappings
            .values()
            .filter(|m| m.claim == record.claim && m.payer_id == record.payer_id)
            .collect();
        existing.sort_by_key(|m| std::cmp::Reverse((m.created_at, m.id)));

        if let Some(active) = existing.iter().find(|m| !m.is_terminal()) {
            return Ok(match active.status() {
                TreatmentAccumulationStatus::Waiting => ClaimOutcome::Resumed((*active).clone()),
                status => ClaimOutcome::AlreadyActive { mapping_id: active.id, status },
            });
        }
        if let Some(latest) = existing.first() {
            if !record.resend_pending(latest.created_at) {
                return Ok(ClaimOutcome::AlreadyFinished {
                    mapping_id: latest.id,
                    status: latest.status(),
                });
            }
        }

        let mapping = AccumulationTreatmentMapping::new(record.claim, record.payer_id);
        state.mappings.insert(mapping.id, mapping.clone());
        Ok(ClaimOutcome::Claimed(mapping))
    }

    async fn find_reports(&self, payer_id: PayerId, report_date: NaiveDate) -> Result<Vec<PayerAccumulationReport>, PortError> {
        let state = self.state.read().await;
        let mut reports: Vec<_> = state
            .reports
            .values()
            .filter(|r| r.payer_id == payer_id && r.report_date == report_date)
            .cloned()
            .collect();
        reports.sort_by_key(|r| (r.created_at, r.id));
        Ok(reports)
    }

    async fn save_report(&self, report: &PayerAccumulationReport, mapping_ids: &[MappingId]) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        if !state.payers.values().any(|p| p.id == report.payer_id) {
            return Err(PortError::not_found("Payer", report.payer_id));
        }
        state.reports.insert(report.id, report.clone());
        for mapping in state.mappings.values_mut() {
            if mapping.status() != TreatmentAccumulationStatus::Waiting {
                continue;
            }
            if mapping_ids.contains(&mapping.id) {
                mapping.report_id = Some(report.id);
                mapping.modified_at = Utc::now();
            } else if mapping.report_id == Some(report.id) {
                mapping.report_id = None;
                mapping.modified_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn complete_report(&self, report_id: ReportId, status: ReportStatus) -> Result<u64, PortError> {
        let mut state = self.state.write().await;
        let report = state
            .reports
            .get_mut(&report_id)
            .ok_or_else(|| PortError::not_found("PayerAccumulationReport", report_id))?;
        report.set_status(status);
        if status != ReportStatus::Submitted {
            return Ok(0);
        }

        let mut flipped = 0;
        for mapping in state.mappings.values_mut() {
            if mapping.report_id == Some(report_id)
                && mapping.status() == TreatmentAccumulationStatus::Waiting
            {
                mapping
                    .mark_submitted(report_id)
                    .map_err(|e| PortError::internal(e.to_string()))?;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn find_mapping_by_transaction(&self, payer_id: PayerId, transaction_id: &str) -> Result<Option<AccumulationTreatmentMapping>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .mappings
            .values()
            .find(|m| {
                m.payer_id == payer_id && m.accumulation_transaction_id.eq_ignore_ascii_case(transaction_id)
            })
            .cloned())
    }

    async fn update_mapping(&self, mapping: &AccumulationTreatmentMapping, expected: TreatmentAccumulationStatus) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        let stored = state
            .mappings
            .get_mut(&mapping.id)
            .ok_or_else(|| PortError::not_found("AccumulationTreatmentMapping", mapping.id))?;
        if stored.status() != expected {
            return Err(PortError::conflict(format!(
                "mapping {} is {} not {}",
                mapping.id,
                stored.status(),
                expected
            )));
        }
        *stored = mapping.clone();
        Ok(())
    }

    async fn get_mapping(&self, id: MappingId) -> Result<AccumulationTreatmentMapping, PortError> {
        self.state
            .read()
            .await
            .mappings
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("AccumulationTreatmentMapping", id))
    }

    async fn get_report(&self, id: ReportId) -> Result<PayerAccumulationReport, PortError> {
        self.state
            .read()
            .await
            .reports
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("PayerAccumulationReport", id))
    }

    async fn mappings_for_claim(&self, claim_id: Uuid) -> Result<Vec<AccumulationTreatmentMapping>, PortError> {
        let mut mappings: Vec<_> = self
            .state
            .read()
            .await
            .mappings
            .values()
            .filter(|m| *m.claim.as_uuid() == claim_id)
            .cloned()
            .collect();
        mappings.sort_by_key(|m| (m.created_at, m.id));
        Ok(mappings)
    }

    async fn mappings_for_report(&self, report_id: ReportId) -> Result<Vec<AccumulationTreatmentMapping>, PortError> {
        let mut mappings: Vec<_> = self
            .state
            .read()
            .await
            .mappings
            .values()
            .filter(|m| m.report_id == Some(report_id))
            .cloned()
            .collect();
        mappings.sort_by(|a, b| a.claim.cmp(&b.claim));
        Ok(mappings)
    }
}

/// Claim source serving a fixed list of records
#[derive(Debug, Default, Clone)]
pub struct StaticClaimSource {
    records: Arc<RwLock<Vec<AccumulationClaimRecord>>>,
}

impl StaticClaimSource {
    pub fn new(records: Vec<AccumulationClaimRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub async fn set_records(&self, records: Vec<AccumulationClaimRecord>) {
        *self.records.write().await = records;
    }
}

impl DomainPort for StaticClaimSource {}

#[async_trait]
impl ClaimSource for StaticClaimSource {
    async fn eligible_claims(&self, payer: &Payer, _report_date: NaiveDate) -> Result<Vec<AccumulationClaimRecord>, PortError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.payer_id == payer.id)
            .cloned()
            .collect())
    }
}

/// A file handed to [`InMemoryTransfer::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFile {
    pub payer: PayerCode,
    pub filename: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct TransferState {
    submitted: Vec<SubmittedFile>,
    responses: HashMap<String, String>,
    submit_failures: VecDeque<TransferError>,
    retrieve_failures: VecDeque<TransferError>,
}

/// Transfer port that records submissions and serves canned responses
///
/// Failures queued with [`fail_next_submit`](Self::fail_next_submit) are
/// returned in order before submissions succeed again.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransfer {
    state: Arc<Mutex<TransferState>>,
}

impl InMemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_response(&self, filename: impl Into<String>, content: impl Into<String>) {
        self.state.lock().await.responses.insert(filename.into(), content.into());
    }

    pub async fn fail_next_submit(&self, error: TransferError) {
        self.state.lock().await.submit_failures.push_back(error);
    }

    pub async fn fail_next_retrieve(&self, error: TransferError) {
        self.state.lock().await.retrieve_failures.push_back(error);
    }

    pub async fn submitted(&self) -> Vec<SubmittedFile> {
        self.state.lock().await.submitted.clone()
    }
}

impl DomainPort for InMemoryTransfer {}

#[async_trait]
impl TransferPort for InMemoryTransfer {
    async fn submit(&self, payer: &PayerCode, filename: &str, body: &str) -> Result<(), TransferError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }
        state.submitted.push(SubmittedFile {
            payer: payer.clone(),
            filename: filename.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn retrieve(&self, _payer: &PayerCode, filename: &str) -> Result<String, TransferError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.retrieve_failures.pop_front() {
            return Err(error);
        }
        state
            .responses
            .get(filename)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(filename.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::ReimbursementClaimId;

    fn record(payer: &Payer) -> AccumulationClaimRecord {
        AccumulationClaimRecord {
            claim: ReimbursementClaimId::new().into(),
            payer_id: payer.id,
            member_plan_id: "M1".to_string(),
            date_of_service: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
            deductible_applied: None,
            oop_applied: None,
            member: None,
            resend: false,
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let payer = Payer::new("Anthem", PayerCode::new("ANTHEM").unwrap());
        let store = InMemoryAccumulationStore::with_payers(vec![payer.clone()]).await;
        let record = record(&payer);

        let first = store.claim_mapping(&record).await.unwrap();
        let ClaimOutcome::Claimed(mapping) = first else { panic!("expected Claimed") };
        let second = store.claim_mapping(&record).await.unwrap();
        assert_eq!(second, ClaimOutcome::Resumed(mapping.clone()));
        assert_eq!(store.all_mappings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_mapping_compare_and_set() {
        let payer = Payer::new("Anthem", PayerCode::new("ANTHEM").unwrap());
        let store = InMemoryAccumulationStore::with_payers(vec![payer.clone()]).await;
        let mapping = store.claim_mapping(&record(&payer)).await.unwrap().into_mapping().unwrap();

        let mut skipped = mapping.clone();
        skipped.skip("ineligible").unwrap();
        store.update_mapping(&skipped, TreatmentAccumulationStatus::Waiting).await.unwrap();

        let mut late = mapping.clone();
        late.reject("late").unwrap();
        let err = store.update_mapping(&late, TreatmentAccumulationStatus::Waiting).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_mapping(mapping.id).await.unwrap().status(), TreatmentAccumulationStatus::Skip);
    }

    #[tokio::test]
    async fn test_transfer_scripted_failure() {
        let transfer = InMemoryTransfer::new();
        let code = PayerCode::new("ESI").unwrap();
        transfer.fail_next_submit(TransferError::Unauthorized("denied".into())).await;
        assert!(transfer.submit(&code, "ESI_20250101", "body").await.is_err());
        assert!(transfer.submit(&code, "ESI_20250101", "body").await.is_ok());
        assert_eq!(transfer.submitted().await.len(), 1);
    }
}
