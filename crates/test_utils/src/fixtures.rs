//! Pre-built Test Fixtures
//!
//! Consistent, predictable values for payers, dates and claims.

use chrono::NaiveDate;
use uuid::Uuid;

use core_kernel::{ClaimReference, ReimbursementClaimId, ReimbursementRequestId};
use domain_accumulation::{MemberDemographics, Payer, PayerCode};

/// Fixture for calendar dates used across the suite
pub struct DateFixtures;

impl DateFixtures {
    /// Standard report date (Jan 1, 2025)
    pub fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
    }

    /// Standard date of service (Dec 15, 2024)
    pub fn date_of_service() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 15).expect("valid date")
    }

    /// Member date of birth
    pub fn date_of_birth() -> NaiveDate {
        NaiveDate::from_ymd_opt(1980, 5, 17).expect("valid date")
    }
}

/// Fixture for payers matching the built-in profiles
pub struct PayerFixtures;

impl PayerFixtures {
    pub fn code(code: &str) -> PayerCode {
        PayerCode::new(code).expect("valid payer code")
    }

    pub fn anthem() -> Payer {
        Payer::new("Anthem Blue Cross", Self::code("ANTHEM"))
    }

    pub fn esi() -> Payer {
        Payer::new("Express Scripts", Self::code("ESI"))
    }

    pub fn cigna() -> Payer {
        Payer::new("Cigna", Self::code("CIGNA"))
    }
}

/// Fixture for claim references with deterministic UUIDs
pub struct ClaimFixtures;

impl ClaimFixtures {
    /// Reimbursement claim whose UUID is `n`
    pub fn claim(n: u128) -> ClaimReference {
        ReimbursementClaimId::from_uuid(Uuid::from_u128(n)).into()
    }

    /// Reimbursement request whose UUID is `n`
    pub fn request(n: u128) -> ClaimReference {
        ReimbursementRequestId::from_uuid(Uuid::from_u128(n)).into()
    }

    pub fn member() -> MemberDemographics {
        MemberDemographics {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: DateFixtures::date_of_birth(),
        }
    }
}
