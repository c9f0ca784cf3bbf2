//! Assertion helpers for mappings and reports

use domain_accumulation::{
    AccumulationTreatmentMapping, PayerAccumulationReport, ReportStatus, TreatmentAccumulationStatus,
};

/// Asserts a mapping's status, naming the mapping on failure
pub fn assert_mapping_status(mapping: &AccumulationTreatmentMapping, expected: TreatmentAccumulationStatus) {
    assert_eq!(
        mapping.status(),
        expected,
        "mapping {} ({}) expected {} but was {}",
        mapping.id,
        mapping.accumulation_transaction_id,
        expected,
        mapping.status()
    );
}

/// Asserts every mapping is in `expected`
pub fn assert_all_mappings_in(mappings: &[AccumulationTreatmentMapping], expected: TreatmentAccumulationStatus) {
    for mapping in mappings {
        assert_mapping_status(mapping, expected);
    }
}

/// Asserts terminal mappings carry a completion timestamp and others do not
pub fn assert_completion_consistent(mapping: &AccumulationTreatmentMapping) {
    assert_eq!(
        mapping.completed_at.is_some(),
        mapping.is_terminal(),
        "mapping {} is {} with completed_at {:?}",
        mapping.id,
        mapping.status(),
        mapping.completed_at
    );
}

/// Asserts a report's status
pub fn assert_report_status(report: &PayerAccumulationReport, expected: ReportStatus) {
    assert_eq!(
        report.status, expected,
        "report {} expected {} but was {}",
        report.filename, expected, report.status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ClaimFixtures;
    use core_kernel::PayerId;

    #[test]
    fn test_new_mapping_passes_checks() {
        let mapping = AccumulationTreatmentMapping::new(ClaimFixtures::claim(1), PayerId::new());
        assert_mapping_status(&mapping, TreatmentAccumulationStatus::Waiting);
        assert_completion_consistent(&mapping);
    }

    #[test]
    #[should_panic(expected = "expected SUBMITTED")]
    fn test_status_mismatch_panics() {
        let mapping = AccumulationTreatmentMapping::new(ClaimFixtures::claim(1), PayerId::new());
        assert_mapping_status(&mapping, TreatmentAccumulationStatus::Submitted);
    }
}
