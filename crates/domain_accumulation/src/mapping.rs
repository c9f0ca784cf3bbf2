//! Claim-to-payer reconciliation mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Cents, ClaimReference, MappingId, PayerId, ReportId};
use crate::error::AccumulationError;
use crate::response::ResponseOutcome;
use crate::status::TreatmentAccumulationStatus;

/// One row per (claim, payer) reconciliation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulationTreatmentMapping {
    /// Unique identifier
    pub id: MappingId,
    /// Originating claim or reimbursement request
    pub claim: ClaimReference,
    /// Payer the claim is accumulated with
    pub payer_id: PayerId,
    /// Correlates this row with a line in outbound and response files
    pub accumulation_transaction_id: String,
    /// Owning report, set once the row is batched
    pub report_id: Option<ReportId>,
    /// Reconciliation state
    pub treatment_accumulation_status: TreatmentAccumulationStatus,
    /// Deductible the payer applied, in cents
    pub deductible: Option<Cents>,
    /// Out-of-pocket amount the payer applied, in cents
    pub oop_applied: Option<Cents>,
    /// Diagnostic from the payer response or the deciding rule
    pub response_code: Option<String>,
    /// Set when the row reaches a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Modified timestamp
    pub modified_at: DateTime<Utc>,
}

impl AccumulationTreatmentMapping {
    /// Creates a WAITING mapping for a claim selected by the data sourcer
    pub fn new(claim: ClaimReference, payer_id: PayerId) -> Self {
        let now = Utc::now();
        let id = MappingId::new_v7();

        Self {
            id,
            claim,
            payer_id,
            accumulation_transaction_id: transaction_id_for(id),
            report_id: None,
            treatment_accumulation_status: TreatmentAccumulationStatus::Waiting,
            deductible: None,
            oop_applied: None,
            response_code: None,
            completed_at: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Returns the claim this mapping accumulates
    pub fn claim_reference(&self) -> ClaimReference {
        self.claim
    }

    /// Current state
    pub fn status(&self) -> TreatmentAccumulationStatus {
        self.treatment_accumulation_status
    }

    pub fn is_terminal(&self) -> bool {
        self.treatment_accumulation_status.is_terminal()
    }

    /// Moves to `target` if the transition table allows it
    pub fn transition_to(&mut self, target: TreatmentAccumulationStatus) -> Result<(), AccumulationError> {
        let current = self.treatment_accumulation_status;
        if current.is_terminal() {
            return Err(AccumulationError::TerminalMapping {
                mapping_id: self.id.to_string(),
                status: current.to_string(),
            });
        }
        if !current.can_transition_to(target) {
            return Err(AccumulationError::InvalidStatusTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        let now = Utc::now();
        self.treatment_accumulation_status = target;
        self.modified_at = now;
        if target.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Marks the row as shipped in `report_id`
    pub fn mark_submitted(&mut self, report_id: ReportId) -> Result<(), AccumulationError> {
        self.transition_to(TreatmentAccumulationStatus::Submitted)?;
        self.report_id = Some(report_id);
        Ok(())
    }

    /// Applies a payer response line
    pub fn apply_response(
        &mut self,
        outcome: ResponseOutcome,
        deductible: Option<Cents>,
        oop_applied: Option<Cents>,
        response_code: impl Into<String>,
    ) -> Result<(), AccumulationError> {
        self.transition_to(outcome.status())?;
        if deductible.is_some() {
            self.deductible = deductible;
        }
        if oop_applied.is_some() {
            self.oop_applied = oop_applied;
        }
        self.response_code = Some(response_code.into());
        Ok(())
    }

    /// Marks the row as a response row error
    pub fn mark_row_error(&mut self, diagnostic: impl Into<String>) -> Result<(), AccumulationError> {
        self.transition_to(TreatmentAccumulationStatus::RowError)?;
        self.response_code = Some(diagnostic.into());
        Ok(())
    }

    /// Excludes the claim by business rule
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), AccumulationError> {
        self.transition_to(TreatmentAccumulationStatus::Skip)?;
        self.response_code = Some(reason.into());
        Ok(())
    }

    /// Rejects the claim by explicit decision, e.g. a record the builder refused
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), AccumulationError> {
        self.transition_to(TreatmentAccumulationStatus::Rejected)?;
        self.response_code = Some(reason.into());
        Ok(())
    }
}

/// Upper-case simple hex form of the mapping id (32 characters)
pub fn transaction_id_for(id: MappingId) -> String {
    id.as_uuid().simple().to_string().to_ascii_uppercase()
}
