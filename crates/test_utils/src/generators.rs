//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, statuses, payer codes, claim references
//! and codec payloads.

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use core_kernel::{Cents, ClaimReference, ReimbursementClaimId, ReimbursementRequestId};
use domain_accumulation::{Delimiters, Segment, TreatmentAccumulationStatus};

/// Cent amounts up to ten million dollars either side of zero
pub fn cents_strategy() -> impl Strategy<Value = Cents> {
    (-1_000_000_000i64..1_000_000_000i64).prop_map(Cents::new)
}

/// Non-negative cent amounts
pub fn positive_cents_strategy() -> impl Strategy<Value = Cents> {
    (0i64..1_000_000_000i64).prop_map(Cents::new)
}

pub fn status_strategy() -> impl Strategy<Value = TreatmentAccumulationStatus> {
    proptest::sample::select(TreatmentAccumulationStatus::ALL.to_vec())
}

/// Upper-case payer codes
pub fn payer_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{1,11}"
}

pub fn claim_reference_strategy() -> impl Strategy<Value = ClaimReference> {
    (any::<u128>(), any::<bool>()).prop_map(|(n, is_request)| {
        let uuid = Uuid::from_u128(n);
        if is_request {
            ReimbursementRequestId::from_uuid(uuid).into()
        } else {
            ReimbursementClaimId::from_uuid(uuid).into()
        }
    })
}

pub fn date_2024_strategy() -> impl Strategy<Value = NaiveDate> {
    (1u32..=366).prop_map(|day| NaiveDate::from_yo_opt(2024, day).expect("2024 is a leap year"))
}

/// Element text free of every delimiter in the x12 and pipe sets
pub fn element_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 .,_-]{0,12}"
}

/// Segments whose elements avoid `delimiters`
pub fn segment_strategy(delimiters: Delimiters) -> impl Strategy<Value = Segment> {
    ("[A-Z]{2,3}", prop::collection::vec(element_strategy(), 0..6)).prop_filter_map(
        "element collides with a delimiter",
        move |(id, elements)| {
            if elements.iter().any(|e| delimiters.is_reserved_in(e)) {
                return None;
            }
            Some(Segment { id, elements })
        },
    )
}
