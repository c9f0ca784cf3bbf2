//! Data sourcer
//!
//! Orchestrates one outbound batch for one payer and is the unit of
//! idempotency: a rerun only ever touches claims without an active
//! non-terminal mapping, because the store decides what is claimable.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::builder::{BatchHeader, OutboundLine};
use crate::error::AccumulationError;
use crate::payer::PayerCode;
use crate::ports::{AccumulationStore, ClaimOutcome, ClaimSource, TransferPort};
use crate::registry::PayerRegistry;
use crate::report::{report_filename, PayerAccumulationReport};
use crate::status::ReportStatus;

/// Counts from one sourcing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcingSummary {
    pub payer_code: String,
    pub report_date: Option<NaiveDate>,
    /// Records offered by the claim source
    pub eligible: usize,
    /// Records claimed for this batch (new or resumed)
    pub claimed: usize,
    /// Records already in flight or finished
    pub skipped: usize,
    /// Records refused by the builder and marked REJECTED
    pub rejected: usize,
    /// Mappings flipped to SUBMITTED
    pub submitted: u64,
    pub filename: Option<String>,
    pub report_status: Option<ReportStatus>,
    /// Transfer failure that marked the report FAILURE
    pub transfer_error: Option<String>,
}

impl SourcingSummary {
    /// True when a report was produced but did not ship
    pub fn is_failure(&self) -> bool {
        self.report_status == Some(ReportStatus::Failure)
    }
}

/// Outbound batch generation for one payer
///
/// Constructed per job invocation with the clients that run uses.
pub struct DataSourcer {
    store: Arc<dyn AccumulationStore>,
    claims: Arc<dyn ClaimSource>,
    transfer: Arc<dyn TransferPort>,
    registry: Arc<PayerRegistry>,
}

impl DataSourcer {
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

    /// Sources, builds, records and ships one batch
    ///
    /// A transient transfer failure is not an `Err`: the report is marked
    /// FAILURE, its mappings stay WAITING, and the summary says so. Key and
    /// encryption failures also leave the report FAILURE but are returned as
    /// errors, as are store and registry failures.
    #[instrument(skip(self), fields(payer = %payer_code, report_date = %report_date))]
    pub async fn run(&self, payer_code: &PayerCode, report_date: NaiveDate) -> Result<SourcingSummary, AccumulationError> {
        let builder = self.registry.builder(payer_code)?;
        let payer = self
            .store
            .find_payer(payer_code)
            .await?
            .ok_or_else(|| AccumulationError::UnknownPayer(payer_code.to_string()))?;

        let mut summary = SourcingSummary {
            payer_code: payer_code.to_string(),
            report_date: Some(report_date),
            ..Default::default()
        };

        let mut records = self.claims.eligible_claims(&payer, report_date).await?;
        records.retain(|record| {
            let own = record.payer_id == payer.id;
            if !own {
                warn!(claim = %record.claim, "Claim source returned a record for another payer");
            }
            own
        });
        records.sort_by(|a, b| a.claim.cmp(&b.claim));
        summary.eligible = records.len();

        if records.is_empty() {
            info!("No eligible claims; nothing to source");
            return Ok(summary);
        }

        let mut claimed = Vec::with_capacity(records.len());
        for record in &records {
            match self.store.claim_mapping(record).await? {
                ClaimOutcome::AlreadyActive { mapping_id, status }
                | ClaimOutcome::AlreadyFinished { mapping_id, status } => {
                    info!(claim = %record.claim, %mapping_id, %status, "Claim already accumulated; skipping");
                    summary.skipped += 1;
                }
                outcome => {
                    if let Some(mapping) = outcome.into_mapping() {
                        claimed.push((mapping, record));
                    }
                }
            }
        }
        summary.claimed = claimed.len();

        if claimed.is_empty() {
            info!(skipped = summary.skipped, "All eligible claims already accumulated");
            return Ok(summary);
        }

        let existing = self.store.find_reports(payer.id, report_date).await?;
        let mut report = match existing.iter().rev().find(|r| r.is_reusable()) {
            Some(reusable) => {
                let mut report = reusable.clone();
                report.reopen();
                info!(filename = %report.filename, "Reusing unsent report");
                report
            }
            None => {
                let sequence = existing.len() as u32 + 1;
                PayerAccumulationReport::new(payer.id, report_filename(payer_code, report_date, sequence), report_date)
            }
        };

        let header = BatchHeader {
            payer_code: payer_code.clone(),
            report_date,
            filename: report.filename.clone(),
        };
        let lines: Vec<OutboundLine<'_>> = claimed
            .iter()
            .map(|(mapping, record)| OutboundLine {
                mapping_id: mapping.id,
                transaction_id: &mapping.accumulation_transaction_id,
                record: *record,
            })
            .collect();
        let built = builder.build(&header, &lines);

        for (mapping_id, build_error) in &built.rejected {
            warn!(%mapping_id, error = %build_error, "Record rejected by file builder");
            self.store
                .record_build_rejection(*mapping_id, &build_error.to_string())
                .await?;
            summary.rejected += 1;
        }

        if built.is_empty() {
            warn!(rejected = summary.rejected, "Every claimed record was rejected; no file produced");
            return Ok(summary);
        }

        report.status = ReportStatus::New;
        self.store.save_report(&report, &built.rendered).await?;
        summary.filename = Some(report.filename.clone());

        match self.transfer.submit(payer_code, &built.filename, &built.body).await {
            Ok(()) => {
                summary.submitted = self.store.complete_report(report.id, ReportStatus::Submitted).await?;
                summary.report_status = Some(ReportStatus::Submitted);
            }
            Err(transfer_error) if transfer_error.is_security() => {
                error!(
                    payer = %payer_code,
                    filename = %report.filename,
                    error = %transfer_error,
                    "Security failure sealing report; mappings left WAITING"
                );
                self.store.complete_report(report.id, ReportStatus::Failure).await?;
                return Err(transfer_error.into());
            }
            Err(transfer_error) => {
                error!(filename = %report.filename, error = %transfer_error, "Report transfer failed; mappings left WAITING");
                self.store.complete_report(report.id, ReportStatus::Failure).await?;
                summary.report_status = Some(ReportStatus::Failure);
                summary.transfer_error = Some(transfer_error.to_string());
            }
        }

        info!(
            payer = %summary.payer_code,
            filename = ?summary.filename,
            eligible = summary.eligible,
            submitted = summary.submitted,
            rejected = summary.rejected,
            skipped = summary.skipped,
            report_status = ?summary.report_status,
            "Sourcing run complete"
        );
        Ok(summary)
    }
}
