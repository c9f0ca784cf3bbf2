//! Accumulation status DTOs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_accumulation::{
    AccumulationTreatmentMapping, PayerAccumulationReport, ReportStatus, TreatmentAccumulationStatus,
};

/// `(payer, report_date) -> status`
#[derive(Debug, Serialize, Deserialize)]
pub struct PayerReportsResponse {
    pub payer_code: String,
    pub report_date: NaiveDate,
    pub reports: Vec<ReportView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportView {
    pub report_id: Uuid,
    pub filename: String,
    pub status: ReportStatus,
    /// Attached mappings counted by status
    pub mappings: BTreeMap<String, usize>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ReportView {
    pub fn new(report: &PayerAccumulationReport, mappings: &[AccumulationTreatmentMapping]) -> Self {
        let mut counts = BTreeMap::new();
        for mapping in mappings {
            *counts
                .entry(mapping.treatment_accumulation_status.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self {
            report_id: *report.id.as_uuid(),
            filename: report.filename.clone(),
            status: report.status,
            mappings: counts,
            created_at: report.created_at,
            modified_at: report.modified_at,
        }
    }
}

/// `(claim_id) -> treatment_accumulation_status`, one entry per mapping
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimAccumulationResponse {
    pub claim_id: Uuid,
    pub mappings: Vec<MappingView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MappingView {
    pub mapping_id: Uuid,
    /// `claim` or `request`
    pub claim_kind: String,
    pub payer_id: Uuid,
    pub accumulation_transaction_id: String,
    pub report_id: Option<Uuid>,
    pub treatment_accumulation_status: TreatmentAccumulationStatus,
    pub deductible_cents: Option<i64>,
    pub oop_applied_cents: Option<i64>,
    pub response_code: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
}

impl From<&AccumulationTreatmentMapping> for MappingView {
    fn from(mapping: &AccumulationTreatmentMapping) -> Self {
        Self {
            mapping_id: *mapping.id.as_uuid(),
            claim_kind: mapping.claim.kind().to_string(),
            payer_id: *mapping.payer_id.as_uuid(),
            accumulation_transaction_id: mapping.accumulation_transaction_id.clone(),
            report_id: mapping.report_id.map(|id| *id.as_uuid()),
            treatment_accumulation_status: mapping.treatment_accumulation_status,
            deductible_cents: mapping.deductible.map(i64::from),
            oop_applied_cents: mapping.oop_applied.map(i64::from),
            response_code: mapping.response_code.clone(),
            completed_at: mapping.completed_at,
            modified_at: mapping.modified_at,
        }
    }
}
