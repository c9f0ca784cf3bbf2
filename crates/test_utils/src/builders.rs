//! Test Data Builders
//!
//! Builders for claim records, mappings and payer response files. Tests set
//! only the fields they care about; everything else gets a sensible default,
//! with member names drawn from `fake`.

use chrono::{NaiveDate, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

use core_kernel::{Cents, ClaimReference, PayerId, ReportId};
use domain_accumulation::{
    AccumulationClaimRecord, AccumulationTreatmentMapping, MemberDemographics, PayerFormat, PayerProfile, Segment,
    SegmentCodec, TreatmentAccumulationStatus,
};

use crate::fixtures::{ClaimFixtures, DateFixtures};

/// Builder for claim records offered by a claim source
pub struct ClaimRecordBuilder {
    record: AccumulationClaimRecord,
}

impl ClaimRecordBuilder {
    /// Record for claim UUID `n` with a generated member
    pub fn new(payer_id: PayerId, n: u128) -> Self {
        Self {
            record: AccumulationClaimRecord {
                claim: ClaimFixtures::claim(n),
                payer_id,
                member_plan_id: format!("MBR{n:04}"),
                date_of_service: DateFixtures::date_of_service(),
                deductible_applied: Some(Cents::new(2500)),
                oop_applied: Some(Cents::new(1000)),
                member: Some(MemberDemographics {
                    first_name: FirstName().fake(),
                    last_name: LastName().fake(),
                    date_of_birth: DateFixtures::date_of_birth(),
                }),
                resend: false,
                published_at: Utc::now(),
            },
        }
    }

    pub fn with_claim(mut self, claim: ClaimReference) -> Self {
        self.record.claim = claim;
        self
    }

    pub fn with_member_plan_id(mut self, id: impl Into<String>) -> Self {
        self.record.member_plan_id = id.into();
        self
    }

    pub fn with_date_of_service(mut self, date: NaiveDate) -> Self {
        self.record.date_of_service = date;
        self
    }

    pub fn with_amounts(mut self, deductible: Option<Cents>, oop: Option<Cents>) -> Self {
        self.record.deductible_applied = deductible;
        self.record.oop_applied = oop;
        self
    }

    pub fn with_member(mut self, member: Option<MemberDemographics>) -> Self {
        self.record.member = member;
        self
    }

    /// Flags the record for resend, republished now
    pub fn resend(mut self) -> Self {
        self.record.resend = true;
        self.record.published_at = Utc::now();
        self
    }

    pub fn build(self) -> AccumulationClaimRecord {
        self.record
    }
}

/// Builder for mappings in an arbitrary lifecycle state
///
/// Sets fields directly, bypassing the state machine, so tests can seed
/// stores with rows in any state.
pub struct MappingBuilder {
    mapping: AccumulationTreatmentMapping,
}

impl MappingBuilder {
    pub fn new(claim: ClaimReference, payer_id: PayerId) -> Self {
        Self {
            mapping: AccumulationTreatmentMapping::new(claim, payer_id),
        }
    }

    pub fn with_status(mut self, status: TreatmentAccumulationStatus) -> Self {
        self.mapping.treatment_accumulation_status = status;
        if status.is_terminal() {
            self.mapping.completed_at = Some(self.mapping.modified_at);
        }
        self
    }

    pub fn in_report(mut self, report_id: ReportId) -> Self {
        self.mapping.report_id = Some(report_id);
        self
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.mapping.accumulation_transaction_id = id.into();
        self
    }

    pub fn build(self) -> AccumulationTreatmentMapping {
        self.mapping
    }
}

/// Builder for payer response files in a profile's layout
pub struct ResponseFileBuilder {
    profile: PayerProfile,
    lines: Vec<[String; 5]>,
    trailer_count: Option<usize>,
}

impl ResponseFileBuilder {
    pub fn new(profile: PayerProfile) -> Self {
        Self {
            profile,
            lines: Vec::new(),
            trailer_count: None,
        }
    }

    /// Adds a response line; `None` amounts are left empty
    pub fn line(
        mut self,
        transaction_id: &str,
        code: &str,
        deductible: Option<Cents>,
        oop: Option<Cents>,
        message: &str,
    ) -> Self {
        let amount = |value: Option<Cents>| value.map(|c| c.to_dollars_string()).unwrap_or_default();
        self.lines.push([
            transaction_id.to_string(),
            code.to_string(),
            amount(deductible),
            amount(oop),
            message.to_string(),
        ]);
        self
    }

    /// Overrides the trailer count written in segment layouts
    pub fn trailer_count(mut self, count: usize) -> Self {
        self.trailer_count = Some(count);
        self
    }

    pub fn build(self) -> String {
        let codec = SegmentCodec::new(self.profile.delimiters.clone()).expect("profile delimiters are valid");
        let mut segments = Vec::with_capacity(self.lines.len() + 2);

        match self.profile.format {
            PayerFormat::Segment => {
                segments.push(
                    Segment::new("HDR")
                        .element(self.profile.code.as_str())
                        .element(self.profile.sender_id.as_str()),
                );
                for line in &self.lines {
                    segments.push(Segment::from_fields(
                        std::iter::once("RSP").chain(line.iter().map(String::as_str)),
                    ));
                }
                let count = self.trailer_count.unwrap_or(self.lines.len());
                segments.push(Segment::new("TRL").element(count.to_string()));
            }
            PayerFormat::Delimited => {
                segments.push(Segment::from_fields(["transaction_id", "status", "deductible", "oop", "message"]));
                for line in &self.lines {
                    segments.push(Segment::from_fields(line.iter().map(String::as_str)));
                }
            }
        }
        codec.render(&segments)
    }
}
