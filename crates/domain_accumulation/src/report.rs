//! Generated outbound batch reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{PayerId, ReportId};
use crate::payer::PayerCode;
use crate::status::ReportStatus;

/// One row per generated outbound batch file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerAccumulationReport {
    pub id: ReportId,
    pub payer_id: PayerId,
    pub filename: String,
    pub report_date: NaiveDate,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl PayerAccumulationReport {
    /// Creates a NEW report
    pub fn new(payer_id: PayerId, filename: impl Into<String>, report_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: ReportId::new_v7(),
            payer_id,
            filename: filename.into(),
            report_date,
            status: ReportStatus::New,
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether a rerun may regenerate this report in place
    pub fn is_reusable(&self) -> bool {
        matches!(self.status, ReportStatus::New | ReportStatus::Failure)
    }

    /// Resets a reusable report to NEW for another attempt
    pub fn reopen(&mut self) {
        self.status = ReportStatus::New;
        self.modified_at = Utc::now();
    }

    pub fn set_status(&mut self, status: ReportStatus) {
        self.status = status;
        self.modified_at = Utc::now();
    }
}

/// Builds `{payer_code}_{YYYYMMDD}`, suffixed `_2`, `_3`... for later batches
pub fn report_filename(code: &PayerCode, report_date: NaiveDate, sequence: u32) -> String {
    let base = format!("{}_{}", code, report_date.format("%Y%m%d"));
    if sequence <= 1 {
        base
    } else {
        format!("{base}_{sequence}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename() {
        let code = PayerCode::new("ANTHEM").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(report_filename(&code, date, 1), "ANTHEM_20250101");
        assert_eq!(report_filename(&code, date, 3), "ANTHEM_20250101_3");
    }

    #[test]
    fn test_reopen_failure() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut report = PayerAccumulationReport::new(PayerId::new(), "ESI_20250101", date);
        report.set_status(ReportStatus::Failure);
        assert!(report.is_reusable());
        report.reopen();
        assert_eq!(report.status, ReportStatus::New);
        report.set_status(ReportStatus::Submitted);
        assert!(!report.is_reusable());
    }
}
