//! Status API tests over the in-memory store

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;

use core_kernel::{HealthCheckResult, HealthCheckable};
use domain_accumulation::memory::{InMemoryAccumulationStore, InMemoryTransfer, StaticClaimSource};
use domain_accumulation::{DataSourcer, Payer, PayerRegistry, ReportStatus, TreatmentAccumulationStatus};
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::create_router;
use interface_api::dto::accumulation::{ClaimAccumulationResponse, PayerReportsResponse};
use interface_api::handlers::health::HealthResponse;
use test_utils::{ClaimRecordBuilder, DateFixtures, PayerFixtures};

const SECRET: &str = "status-api-secret";

struct DownAdapter;

#[async_trait]
impl HealthCheckable for DownAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::unhealthy("postgres", 5, "connection refused")
    }
}

fn config() -> ApiConfig {
    ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    }
}

fn reader_token() -> String {
    create_token("recon-tool", vec![permissions::ACCUMULATION_READ.to_string()], SECRET, 300).unwrap()
}

/// Store with one submitted ANTHEM report holding two claims
async fn seeded_store() -> (InMemoryAccumulationStore, Payer) {
    let payer = PayerFixtures::anthem();
    let store = InMemoryAccumulationStore::with_payers(vec![payer.clone()]).await;
    let claims = StaticClaimSource::new(vec![
        ClaimRecordBuilder::new(payer.id, 1).build(),
        ClaimRecordBuilder::new(payer.id, 2).build(),
    ]);

    let summary = DataSourcer::new(
        Arc::new(store.clone()),
        Arc::new(claims),
        Arc::new(InMemoryTransfer::new()),
        Arc::new(PayerRegistry::with_defaults().unwrap()),
    )
    .run(&payer.code, DateFixtures::report_date())
    .await
    .unwrap();
    assert_eq!(summary.submitted, 2);

    (store, payer)
}

fn server(store: InMemoryAccumulationStore) -> TestServer {
    let store = Arc::new(store);
    TestServer::new(create_router(store.clone(), store, config())).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = server(InMemoryAccumulationStore::new());
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<HealthResponse>().status, "healthy");

    server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_readiness_reports_unhealthy_store() {
    let app = create_router(Arc::new(InMemoryAccumulationStore::new()), Arc::new(DownAdapter), config());
    let server = TestServer::new(app).unwrap();

    server.get("/health/ready").await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_requires_token() {
    let (store, _) = seeded_store().await;
    let server = server(store);

    server
        .get("/api/v1/payers/ANTHEM/reports/2025-01-01")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/payers/ANTHEM/reports/2025-01-01")
        .authorization_bearer("not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_requires_read_role() {
    let (store, _) = seeded_store().await;
    let server = server(store);
    let token = create_token("billing", vec!["billing:write".to_string()], SECRET, 300).unwrap();

    server
        .get("/api/v1/payers/ANTHEM/reports/2025-01-01")
        .authorization_bearer(token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payer_report_status() {
    let (store, _) = seeded_store().await;
    let server = server(store);

    let response = server
        .get("/api/v1/payers/anthem/reports/2025-01-01")
        .authorization_bearer(reader_token())
        .await;
    response.assert_status_ok();

    let body = response.json::<PayerReportsResponse>();
    assert_eq!(body.payer_code, "ANTHEM");
    assert_eq!(body.report_date, DateFixtures::report_date());
    assert_eq!(body.reports.len(), 1);

    let report = &body.reports[0];
    assert_eq!(report.filename, "ANTHEM_20250101");
    assert_eq!(report.status, ReportStatus::Submitted);
    assert_eq!(report.mappings.get("SUBMITTED"), Some(&2));
}

#[tokio::test]
async fn test_payer_report_errors() {
    let (store, _) = seeded_store().await;
    let server = server(store);

    server
        .get("/api/v1/payers/ANTHEM/reports/01-01-2025")
        .authorization_bearer(reader_token())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/v1/payers/ESI/reports/2025-01-01")
        .authorization_bearer(reader_token())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/v1/payers/ANTHEM/reports/2025-01-02")
        .authorization_bearer(reader_token())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_claim_accumulation_status() {
    let (store, payer) = seeded_store().await;
    let claim = ClaimRecordBuilder::new(payer.id, 1).build().claim;
    let server = server(store);

    let response = server
        .get(&format!("/api/v1/claims/{}/accumulation", claim.as_uuid()))
        .authorization_bearer(reader_token())
        .await;
    response.assert_status_ok();

    let body = response.json::<ClaimAccumulationResponse>();
    assert_eq!(body.claim_id, *claim.as_uuid());
    assert_eq!(body.mappings.len(), 1);
    assert_eq!(body.mappings[0].claim_kind, "claim");
    assert_eq!(
        body.mappings[0].treatment_accumulation_status,
        TreatmentAccumulationStatus::Submitted
    );
    assert!(body.mappings[0].report_id.is_some());
}

#[tokio::test]
async fn test_unknown_claim() {
    let server = server(InMemoryAccumulationStore::new());
    server
        .get(&format!("/api/v1/claims/{}/accumulation", uuid::Uuid::now_v7()))
        .authorization_bearer(reader_token())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
