//! Response processor
//!
//! Downloads a payer response file, parses it and drives each matched
//! mapping through the state machine. Failures are isolated per line and
//! aggregated into the run summary; only retrieval or decryption of the
//! file itself fails the run.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::PortError;

use crate::error::AccumulationError;
use crate::mapping::AccumulationTreatmentMapping;
use crate::payer::{Payer, PayerCode};
use crate::ports::{AccumulationStore, TransferPort};
use crate::registry::PayerRegistry;
use crate::response::{ResponseCodeTable, ResponseLine, ResponseParseError};
use crate::status::TreatmentAccumulationStatus;

/// Why a response line did not reconcile cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// No mapping carries the transaction id
    Unmatched,
    /// The line was malformed or its code unknown; mapping marked ROW_ERROR
    RowError,
    /// The mapping was terminal or not yet submitted
    InvalidTransition,
    /// Another writer changed the mapping first
    Conflict,
    /// The store failed for this line
    StoreFailure,
    /// File-level irregularity reported by the parser
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAnomaly {
    pub line_number: Option<usize>,
    pub transaction_id: Option<String>,
    pub kind: AnomalyKind,
    pub message: String,
}

/// Counts and anomalies from one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub payer_code: String,
    pub filename: String,
    pub lines: usize,
    pub processed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub refunded: usize,
    pub row_errors: usize,
    pub unmatched: usize,
    pub ignored: usize,
    pub anomalies: Vec<LineAnomaly>,
}

impl ReconciliationSummary {
    /// Lines that moved a mapping to a new state
    pub fn reconciled(&self) -> usize {
        self.processed + self.accepted + self.rejected + self.refunded + self.row_errors
    }

    fn count(&mut self, status: TreatmentAccumulationStatus) {
        match status {
            TreatmentAccumulationStatus::Processed => self.processed += 1,
            TreatmentAccumulationStatus::Accepted => self.accepted += 1,
            TreatmentAccumulationStatus::Rejected => self.rejected += 1,
            TreatmentAccumulationStatus::Refunded => self.refunded += 1,
            TreatmentAccumulationStatus::RowError => self.row_errors += 1,
            _ => {}
        }
    }

    fn anomaly(
        &mut self,
        line_number: Option<usize>,
        transaction_id: Option<&str>,
        kind: AnomalyKind,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(?line_number, transaction_id, ?kind, %message, "Response line anomaly");
        match kind {
            AnomalyKind::Unmatched => self.unmatched += 1,
            AnomalyKind::InvalidTransition | AnomalyKind::Conflict | AnomalyKind::StoreFailure => self.ignored += 1,
            AnomalyKind::RowError | AnomalyKind::File => {}
        }
        self.anomalies.push(LineAnomaly {
            line_number,
            transaction_id: transaction_id.map(str::to_string),
            kind,
            message,
        });
    }
}

/// Inbound reconciliation for one payer
pub struct ResponseProcessor {
    store: Arc<dyn AccumulationStore>,
    transfer: Arc<dyn TransferPort>,
    registry: Arc<PayerRegistry>,
}

impl ResponseProcessor {
    pub fn new(
        store: Arc<dyn AccumulationStore>,
        transfer: Arc<dyn TransferPort>,
        registry: Arc<PayerRegistry>,
    ) -> Self {
        Self {
            store,
            transfer,
            registry,
        }
    }

    /// Retrieves, decrypts and reconciles `filename`
    #[instrument(skip(self), fields(payer = %payer_code))]
    pub async fn run(&self, payer_code: &PayerCode, filename: &str) -> Result<ReconciliationSummary, AccumulationError> {
        let parser = self.registry.parser(payer_code)?;
        let table = self.registry.profile(payer_code)?.response_codes.clone();
        let payer = self
            .store
            .find_payer(payer_code)
            .await?
            .ok_or_else(|| AccumulationError::UnknownPayer(payer_code.to_string()))?;

        let content = self.transfer.retrieve(payer_code, filename).await?;
        let parsed = parser.parse(&content);

        let mut summary = ReconciliationSummary {
            payer_code: payer_code.to_string(),
            filename: filename.to_string(),
            lines: parsed.lines.len(),
            ..Default::default()
        };

        for line in parsed.lines {
            match line {
                Ok(line) => self.apply_line(&payer, &table, line, &mut summary).await,
                Err(parse_error) => self.apply_parse_error(&payer, parse_error, &mut summary).await,
            }
        }
        for anomaly in parsed.anomalies {
            summary.anomaly(None, None, AnomalyKind::File, anomaly);
        }

        info!(
            payer = %summary.payer_code,
            filename = %summary.filename,
            lines = summary.lines,
            processed = summary.processed,
            accepted = summary.accepted,
            rejected = summary.rejected,
            refunded = summary.refunded,
            row_errors = summary.row_errors,
            unmatched = summary.unmatched,
            ignored = summary.ignored,
            "Reconciliation run complete"
        );
        Ok(summary)
    }

    async fn apply_line(
        &self,
        payer: &Payer,
        table: &ResponseCodeTable,
        line: ResponseLine,
        summary: &mut ReconciliationSummary,
    ) {
        let txn = line.transaction_id.as_str();
        let Some(mut mapping) = self.lookup(payer, line.line_number, txn, summary).await else {
            return;
        };
        let expected = mapping.status();

        let (transition, row_error) = match table.resolve(&line.code) {
            Some(outcome) => (
                mapping.apply_response(outcome, line.deductible, line.oop_applied, line.code.clone()),
                None,
            ),
            None => {
                let diagnostic = format!("{}: unknown response code", line.code);
                (mapping.mark_row_error(diagnostic.clone()), Some(diagnostic))
            }
        };
        if let Err(e) = transition {
            summary.anomaly(Some(line.line_number), Some(txn), AnomalyKind::InvalidTransition, e.to_string());
            return;
        }
        if self.persist(&mapping, expected, line.line_number, summary).await {
            if let Some(diagnostic) = row_error {
                summary.anomaly(Some(line.line_number), Some(txn), AnomalyKind::RowError, diagnostic);
            }
        }
    }

    async fn apply_parse_error(
        &self,
        payer: &Payer,
        parse_error: ResponseParseError,
        summary: &mut ReconciliationSummary,
    ) {
        let line_number = parse_error.line_number;
        let Some(txn) = parse_error.transaction_id.as_deref() else {
            summary.anomaly(Some(line_number), None, AnomalyKind::Unmatched, parse_error.reason);
            return;
        };
        let Some(mut mapping) = self.lookup(payer, line_number, txn, summary).await else {
            return;
        };
        let expected = mapping.status();
        if let Err(e) = mapping.mark_row_error(parse_error.reason.clone()) {
            summary.anomaly(Some(line_number), Some(txn), AnomalyKind::InvalidTransition, e.to_string());
            return;
        }
        if self.persist(&mapping, expected, line_number, summary).await {
            summary.anomaly(Some(line_number), Some(txn), AnomalyKind::RowError, parse_error.reason);
        }
    }

    async fn lookup(
        &self,
        payer: &Payer,
        line_number: usize,
        txn: &str,
        summary: &mut ReconciliationSummary,
    ) -> Option<AccumulationTreatmentMapping> {
        match self.store.find_mapping_by_transaction(payer.id, txn).await {
            Ok(Some(mapping)) => Some(mapping),
            Ok(None) => {
                summary.anomaly(Some(line_number), Some(txn), AnomalyKind::Unmatched, "no mapping for transaction id");
                None
            }
            Err(e) => {
                summary.anomaly(Some(line_number), Some(txn), AnomalyKind::StoreFailure, e.to_string());
                None
            }
        }
    }

    /// Writes the transition; true when it was stored and counted
    async fn persist(
        &self,
        mapping: &AccumulationTreatmentMapping,
        expected: TreatmentAccumulationStatus,
        line_number: usize,
        summary: &mut ReconciliationSummary,
    ) -> bool {
        let txn = Some(mapping.accumulation_transaction_id.as_str());
        match self.store.update_mapping(mapping, expected).await {
            Ok(()) => {
                summary.count(mapping.status());
                true
            }
            Err(e @ PortError::Conflict { .. }) => {
                summary.anomaly(Some(line_number), txn, AnomalyKind::Conflict, e.to_string());
                false
            }
            Err(e) => {
                summary.anomaly(Some(line_number), txn, AnomalyKind::StoreFailure, e.to_string());
                false
            }
        }
    }
}
