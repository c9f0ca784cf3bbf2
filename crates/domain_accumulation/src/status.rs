//! Mapping and report status enumerations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reconciliation state of one claim with one payer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreatmentAccumulationStatus {
    /// Claimed for a batch, not yet shipped
    Waiting,
    /// Shipped to the payer in a submitted report
    Submitted,
    /// Payer applied the amounts
    Processed,
    /// Payer acknowledged the line without applying amounts
    Accepted,
    /// Payer or a business rule rejected the line
    Rejected,
    /// The response line could not be interpreted
    RowError,
    /// Payer reversed a previously accepted claim
    Refunded,
    /// Excluded by business rule
    Skip,
}

impl TreatmentAccumulationStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [TreatmentAccumulationStatus; 8] = [
        Self::Waiting,
        Self::Submitted,
        Self::Processed,
        Self::Accepted,
        Self::Rejected,
        Self::RowError,
        Self::Refunded,
        Self::Skip,
    ];

    /// Only WAITING and SUBMITTED rows may still move
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting | Self::Submitted)
    }

    /// Checks the transition table
    pub fn can_transition_to(&self, target: TreatmentAccumulationStatus) -> bool {
        use TreatmentAccumulationStatus::*;
        matches!(
            (*self, target),
            (Waiting, Submitted) |
            (Submitted, Processed) |
            (Submitted, Accepted) |
            (Submitted, Rejected) |
            (Submitted, RowError) |
            (Submitted, Refunded) |
            (Waiting, Rejected) |
            (Waiting, Skip) |
            (Submitted, Skip)
        )
    }

    /// Storage and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Submitted => "SUBMITTED",
            Self::Processed => "PROCESSED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::RowError => "ROW_ERROR",
            Self::Refunded => "REFUNDED",
            Self::Skip => "SKIP",
        }
    }
}

impl fmt::Display for TreatmentAccumulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreatmentAccumulationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown accumulation status: {s}"))
    }
}

/// Submission state of a generated report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Generated, transfer not yet confirmed
    New,
    /// Transferred to the payer exchange
    Submitted,
    /// Transfer failed; reprocessable
    Failure,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Submitted => "SUBMITTED",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "SUBMITTED" => Ok(Self::Submitted),
            "FAILURE" => Ok(Self::Failure),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}
