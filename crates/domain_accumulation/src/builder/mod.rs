//! Payer file builders
//!
//! Every payer renders accumulation records through the same capability,
//! [`PayerFileBuilder::build`]. Records that fail validation are returned
//! as rejections instead of being written, so the caller can mark them
//! REJECTED rather than lose them.

mod segment;
mod delimited;

pub use segment::SegmentFileBuilder;
pub use delimited::DelimitedFileBuilder;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use core_kernel::{Cents, MappingId};
use crate::codec::Delimiters;
use crate::payer::PayerCode;
use crate::record::{AccumulationClaimRecord, MemberDemographics};

/// Per-record build failures
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum BuildError {
    #[error("record {transaction_id} is missing required field {field}")]
    MissingField {
        transaction_id: String,
        field: &'static str,
    },

    #[error("record {transaction_id} field {field} contains a reserved delimiter")]
    ReservedDelimiter {
        transaction_id: String,
        field: &'static str,
    },
}

/// Batch-level values shared by every line of a file
#[derive(Debug, Clone)]
pub struct BatchHeader {
    pub payer_code: PayerCode,
    pub report_date: NaiveDate,
    pub filename: String,
}

/// A record paired with the mapping that claimed it
#[derive(Debug, Clone, Copy)]
pub struct OutboundLine<'a> {
    pub mapping_id: MappingId,
    pub transaction_id: &'a str,
    pub record: &'a AccumulationClaimRecord,
}

/// Output of a build
#[derive(Debug, Clone, Default)]
pub struct BuiltFile {
    pub filename: String,
    pub body: String,
    /// Mappings whose records were written, in file order
    pub rendered: Vec<MappingId>,
    /// Mappings whose records were refused
    pub rejected: Vec<(MappingId, BuildError)>,
}

impl BuiltFile {
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

/// Renders outbound accumulation files for one payer
pub trait PayerFileBuilder: Send + Sync {
    /// Renders `lines` in the given order
    fn build(&self, header: &BatchHeader, lines: &[OutboundLine<'_>]) -> BuiltFile;
}

/// Validated, rendered field values of one record
pub(crate) struct LineFields {
    pub member_plan_id: String,
    pub claim_id: String,
    pub date_of_service: String,
    pub deductible: Cents,
    pub oop: Cents,
    pub member: Option<MemberDemographics>,
}

/// Checks required fields and delimiter safety for one line
pub(crate) fn validate_line(
    line: &OutboundLine<'_>,
    delimiters: &Delimiters,
    require_member: bool,
) -> Result<LineFields, BuildError> {
    let txn = line.transaction_id;
    let record = line.record;
    let missing = |field| BuildError::MissingField {
        transaction_id: txn.to_string(),
        field,
    };
    let reserved = |field| BuildError::ReservedDelimiter {
        transaction_id: txn.to_string(),
        field,
    };

    let member_plan_id = record.member_plan_id.trim();
    if member_plan_id.is_empty() {
        return Err(missing("member_plan_id"));
    }
    if delimiters.is_reserved_in(member_plan_id) {
        return Err(reserved("member_plan_id"));
    }
    let deductible = record.deductible_applied.ok_or_else(|| missing("deductible_applied"))?;
    let oop = record.oop_applied.ok_or_else(|| missing("oop_applied"))?;

    let member = match (&record.member, require_member) {
        (None, true) => return Err(missing("member")),
        (Some(member), true) => {
            if member.first_name.trim().is_empty() {
                return Err(missing("member.first_name"));
            }
            if member.last_name.trim().is_empty() {
                return Err(missing("member.last_name"));
            }
            if delimiters.is_reserved_in(&member.first_name) {
                return Err(reserved("member.first_name"));
            }
            if delimiters.is_reserved_in(&member.last_name) {
                return Err(reserved("member.last_name"));
            }
            Some(member.clone())
        }
        (_, false) => None,
    };

    Ok(LineFields {
        member_plan_id: member_plan_id.to_string(),
        claim_id: record.claim.as_uuid().to_string(),
        date_of_service: record.date_of_service.format("%Y%m%d").to_string(),
        deductible,
        oop,
        member,
    })
}
