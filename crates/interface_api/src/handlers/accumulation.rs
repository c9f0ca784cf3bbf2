//! Read-only accumulation status handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use tracing::instrument;
use uuid::Uuid;

use domain_accumulation::PayerCode;

use crate::auth::{permissions, require_role, AuthClaims};
use crate::dto::accumulation::{ClaimAccumulationResponse, MappingView, PayerReportsResponse, ReportView};
use crate::error::ApiError;
use crate::AppState;

fn authorize(claims: &AuthClaims) -> Result<(), ApiError> {
    require_role(claims, permissions::ACCUMULATION_READ).map_err(|e| ApiError::Forbidden(e.to_string()))
}

/// Reports generated for a payer on a report date
#[instrument(skip_all, fields(subject = %claims.sub))]
pub async fn payer_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path((code, date)): Path<(String, String)>,
) -> Result<Json<PayerReportsResponse>, ApiError> {
    authorize(&claims)?;
    let code = PayerCode::new(&code)?;
    let report_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid report date {date}, expected YYYY-MM-DD")))?;

    let payer = state
        .store
        .find_payer(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("unknown payer {code}")))?;

    let reports = state.store.find_reports(payer.id, report_date).await?;
    if reports.is_empty() {
        return Err(ApiError::NotFound(format!("no report for {code} on {report_date}")));
    }

    let mut views = Vec::with_capacity(reports.len());
    for report in &reports {
        let mappings = state.store.mappings_for_report(report.id).await?;
        views.push(ReportView::new(report, &mappings));
    }

    Ok(Json(PayerReportsResponse {
        payer_code: code.to_string(),
        report_date,
        reports: views,
    }))
}

/// Every mapping recorded for a claim or reimbursement request
#[instrument(skip_all, fields(subject = %claims.sub))]
pub async fn claim_accumulation(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(claim_id): Path<Uuid>,
) -> Result<Json<ClaimAccumulationResponse>, ApiError> {
    authorize(&claims)?;

    let mappings = state.store.mappings_for_claim(claim_id).await?;
    if mappings.is_empty() {
        return Err(ApiError::NotFound(format!("no accumulation mapping for claim {claim_id}")));
    }

    Ok(Json(ClaimAccumulationResponse {
        claim_id,
        mappings: mappings.iter().map(MappingView::from).collect(),
    }))
}
