//! Data sourcer runs over in-memory adapters

mod common;

use chrono::Utc;
use common::{code, date, record, Harness};
use domain_accumulation::{
    AccumulationStore, ReportStatus, TransferError, TreatmentAccumulationStatus,
};

#[tokio::test]
async fn test_no_eligible_claims_is_noop() {
    let h = Harness::new("ANTHEM").await;
    let summary = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(summary.eligible, 0);
    assert!(summary.report_status.is_none());
    assert!(h.store.all_reports().await.is_empty());
    assert!(h.transfer.submitted().await.is_empty());
}

#[tokio::test]
async fn test_unknown_payer_fails() {
    let h = Harness::new("ANTHEM").await;
    let result = h.sourcer().run(&code("ESI"), date(2025, 1, 1)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sourcing_is_idempotent() {
    let h = Harness::new("ANTHEM").await;
    h.claims
        .set_records(vec![record(&h.payer, 3), record(&h.payer, 1), record(&h.payer, 2)])
        .await;

    let first = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(first.submitted, 3);
    let second = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(second.claimed, 0);
    assert_eq!(second.skipped, 3);
    assert!(second.report_status.is_none());

    assert_eq!(h.store.all_reports().await.len(), 1);
    assert_eq!(h.store.all_mappings().await.len(), 3);
    assert_eq!(h.transfer.submitted().await.len(), 1);
}

#[tokio::test]
async fn test_records_rendered_in_claim_order() {
    let h = Harness::new("ANTHEM").await;
    h.claims
        .set_records(vec![record(&h.payer, 3), record(&h.payer, 1), record(&h.payer, 2)])
        .await;
    h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();

    let body = &h.transfer.submitted().await[0].body;
    let members: Vec<&str> = body
        .lines()
        .filter(|line| line.starts_with("DTL"))
        .map(|line| line.split('*').nth(2).unwrap())
        .collect();
    assert_eq!(members, vec!["MBR0001", "MBR0002", "MBR0003"]);
}

#[tokio::test]
async fn test_transfer_failure_marks_report_failure_and_leaves_waiting() {
    let h = Harness::new("ANTHEM").await;
    h.claims.set_records(vec![record(&h.payer, 1), record(&h.payer, 2)]).await;
    h.transfer
        .fail_next_submit(TransferError::TransferFailure { attempts: 3, message: "connection reset".into() })
        .await;

    let failed = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert!(failed.is_failure());
    assert_eq!(failed.submitted, 0);
    let reports = h.store.all_reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ReportStatus::Failure);
    let mappings = h.store.all_mappings().await;
    assert!(mappings.iter().all(|m| m.status() == TreatmentAccumulationStatus::Waiting));
    let txns: Vec<String> = mappings.iter().map(|m| m.accumulation_transaction_id.clone()).collect();

    // Rerun reuses the failed report and the WAITING mappings
    let retried = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(retried.report_status, Some(ReportStatus::Submitted));
    assert_eq!(retried.filename.as_deref(), Some("ANTHEM_20250101"));
    assert_eq!(retried.submitted, 2);
    let reports = h.store.all_reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ReportStatus::Submitted);
    let mappings = h.store.all_mappings().await;
    assert_eq!(mappings.len(), 2);
    assert!(mappings.iter().all(|m| txns.contains(&m.accumulation_transaction_id)));
}

#[tokio::test]
async fn test_security_failure_is_an_error_and_marks_report_failure() {
    let h = Harness::new("ANTHEM").await;
    h.claims.set_records(vec![record(&h.payer, 1)]).await;
    h.transfer.fail_next_submit(TransferError::KeyImport("bad armor".into())).await;

    let err = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap_err();
    assert!(err.is_security());
    assert!(err.to_string().contains("Key import"));

    let reports = h.store.all_reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ReportStatus::Failure);
    assert_eq!(h.store.all_mappings().await[0].status(), TreatmentAccumulationStatus::Waiting);
    assert!(h.transfer.submitted().await.is_empty());

    // Once keys are fixed the rerun ships the same report
    let retried = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(retried.report_status, Some(ReportStatus::Submitted));
    assert_eq!(h.store.all_reports().await.len(), 1);
}

#[tokio::test]
async fn test_builder_rejection_marks_rejected() {
    let h = Harness::new("ANTHEM").await;
    let mut bad = record(&h.payer, 2);
    bad.oop_applied = None;
    h.claims.set_records(vec![record(&h.payer, 1), bad.clone()]).await;

    let summary = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.submitted, 1);

    let rejected = h.store.mappings_for_claim(*bad.claim.as_uuid()).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].status(), TreatmentAccumulationStatus::Rejected);
    assert!(rejected[0].report_id.is_none());
    assert!(rejected[0].response_code.as_deref().unwrap().contains("oop_applied"));
}

#[tokio::test]
async fn test_all_rejected_produces_no_report() {
    let h = Harness::new("ANTHEM").await;
    let mut bad = record(&h.payer, 1);
    bad.member_plan_id = String::new();
    h.claims.set_records(vec![bad]).await;

    let summary = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(summary.rejected, 1);
    assert!(summary.filename.is_none());
    assert!(h.store.all_reports().await.is_empty());
    assert!(h.transfer.submitted().await.is_empty());
}

#[tokio::test]
async fn test_second_batch_same_day_gets_suffix() {
    let h = Harness::new("ANTHEM").await;
    h.claims.set_records(vec![record(&h.payer, 1)]).await;
    h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();

    h.claims.set_records(vec![record(&h.payer, 1), record(&h.payer, 2)]).await;
    let later = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();
    assert_eq!(later.filename.as_deref(), Some("ANTHEM_20250101_2"));
    assert_eq!(later.claimed, 1);
    assert_eq!(later.skipped, 1);
}

#[tokio::test]
async fn test_resend_creates_new_mapping_after_terminal() {
    let h = Harness::new("ANTHEM").await;
    let original = record(&h.payer, 1);
    h.claims.set_records(vec![original.clone()]).await;
    h.sourcer().run(&code("ANTHEM"), date(2025, 1, 1)).await.unwrap();

    let mut mapping = h.store.mappings_for_claim(*original.claim.as_uuid()).await.unwrap().remove(0);
    mapping.reject("payer rejected").unwrap();
    h.store.update_mapping(&mapping, TreatmentAccumulationStatus::Submitted).await.unwrap();

    let blocked = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 2)).await.unwrap();
    assert_eq!(blocked.claimed, 0);

    let mut resend = original.clone();
    resend.resend = true;
    resend.published_at = Utc::now();
    h.claims.set_records(vec![resend]).await;
    let resent = h.sourcer().run(&code("ANTHEM"), date(2025, 1, 2)).await.unwrap();
    assert_eq!(resent.submitted, 1);
    let history = h.store.mappings_for_claim(*original.claim.as_uuid()).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status(), TreatmentAccumulationStatus::Rejected);
    assert_eq!(history[1].status(), TreatmentAccumulationStatus::Submitted);
}

/// Sources ANTHEM for `day` and answers every mapping in the file with PR
async fn source_and_process(h: &Harness, day: u32) -> u64 {
    let summary = h.sourcer().run(&code("ANTHEM"), date(2025, 1, day)).await.unwrap();
    if let Some(filename) = &summary.filename {
        let report = h
            .store
            .all_reports()
            .await
            .into_iter()
            .find(|r| &r.filename == filename)
            .unwrap();
        let lines: String = h
            .store
            .mappings_for_report(report.id)
            .await
            .unwrap()
            .iter()
            .map(|m| format!("RSP*{}*PR*25.00*10.00*~\n", m.accumulation_transaction_id))
            .collect();
        let response_name = format!("{filename}_RESP");
        h.transfer
            .put_response(response_name.clone(), format!("HDR*ANTHEM*2025010{day}~\n{lines}TRL*1~\n"))
            .await;
        h.processor().run(&code("ANTHEM"), &response_name).await.unwrap();
    }
    summary.submitted
}

#[tokio::test]
async fn test_resend_is_answered_once() {
    let h = Harness::new("ANTHEM").await;
    let mut resend = record(&h.payer, 1);
    resend.resend = true;
    h.claims.set_records(vec![resend.clone()]).await;

    assert_eq!(source_and_process(&h, 1).await, 1);
    assert_eq!(source_and_process(&h, 2).await, 0);
    assert_eq!(source_and_process(&h, 3).await, 0);
    assert_eq!(h.transfer.submitted().await.len(), 1);

    let history = h.store.mappings_for_claim(*resend.claim.as_uuid()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status(), TreatmentAccumulationStatus::Processed);

    // A fresh publication asks again, and is answered once more
    resend.published_at = Utc::now();
    h.claims.set_records(vec![resend.clone()]).await;
    assert_eq!(source_and_process(&h, 4).await, 1);
    assert_eq!(source_and_process(&h, 5).await, 0);
    assert_eq!(h.transfer.submitted().await.len(), 2);
    assert_eq!(h.store.mappings_for_claim(*resend.claim.as_uuid()).await.unwrap().len(), 2);
}
