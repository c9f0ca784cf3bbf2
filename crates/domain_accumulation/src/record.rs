//! Inbound claim records supplied by the billing subsystem

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Cents, ClaimReference, PayerId};

/// Member identity carried by payers whose layout requires it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDemographics {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
}

/// A claim eligible for accumulation with one payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulationClaimRecord {
    pub claim: ClaimReference,
    pub payer_id: PayerId,
    pub member_plan_id: String,
    pub date_of_service: NaiveDate,
    pub deductible_applied: Option<Cents>,
    pub oop_applied: Option<Cents>,
    #[serde(default)]
    pub member: Option<MemberDemographics>,
    /// Send again even though a terminal mapping exists
    #[serde(default)]
    pub resend: bool,
    /// When the billing subsystem published (or republished) this record
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

impl AccumulationClaimRecord {
    /// True when a resend was requested after the latest accumulation attempt
    ///
    /// A resend is answered by the mapping it creates, so the same
    /// publication never triggers a second submission.
    pub fn resend_pending(&self, latest_attempt: DateTime<Utc>) -> bool {
        self.resend && latest_attempt < self.published_at
    }
}
