//! Accumulation repository implementation
//!
//! Database access for payers, reports, claim mappings and the eligible
//! claim feed. Multi-statement operations (claiming a record, attaching a
//! report's mappings, completing a report) each run in one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const MAPPING_COLUMNS: &str = "mapping_id, reimbursement_claim_id, reimbursement_request_id, payer_id, \
     accumulation_transaction_id, report_id, status, deductible_cents, oop_applied_cents, \
     response_code, completed_at, created_at, modified_at";

const REPORT_COLUMNS: &str = "report_id, payer_id, filename, report_date, status, created_at, modified_at";

/// Repository for the accumulation tables
#[derive(Debug, Clone)]
pub struct AccumulationRepository {
    pool: PgPool,
}

impl AccumulationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Payers
    // ------------------------------------------------------------------

    pub async fn find_payer_by_code(&self, code: &str) -> Result<Option<PayerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, PayerRow>(
            "SELECT payer_id, name, code FROM accumulation_payers WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Inserts a payer, or updates the name of an existing code
    pub async fn upsert_payer(&self, payer: &PayerRow) -> Result<PayerRow, DatabaseError> {
        let row = sqlx::query_as::<_, PayerRow>(
            r#"
            INSERT INTO accumulation_payers (payer_id, name, code)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
            RETURNING payer_id, name, code
            "#,
        )
        .bind(payer.payer_id)
        .bind(&payer.name)
        .bind(&payer.code)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ------------------------------------------------------------------
    // Mappings
    // ------------------------------------------------------------------

    /// Claims a (claim, payer) pair in one transaction
    ///
    /// Existing mappings for the pair are locked and inspected newest first:
    /// a non-terminal one is returned as is, a terminal one is returned
    /// unless a resend was requested after it was created. Otherwise `new`
    /// is inserted. The partial unique index on active mappings rejects a
    /// concurrent duplicate insert.
    pub async fn claim_mapping(
        &self,
        new: &MappingRow,
        resend_requested_at: Option<DateTime<Utc>>,
    ) -> Result<ClaimedRow, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM accumulation_treatment_mappings \
             WHERE payer_id = $1 AND (reimbursement_claim_id = $2 OR reimbursement_request_id = $3) \
             ORDER BY created_at DESC, mapping_id DESC \
             FOR UPDATE"
        );
        let existing = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(new.payer_id)
            .bind(new.reimbursement_claim_id)
            .bind(new.reimbursement_request_id)
            .fetch_all(&mut *tx)
            .await?;

        if let Some(active) = existing.iter().find(|row| !row.status.is_terminal()) {
            tx.commit().await?;
            return Ok(ClaimedRow::Existing(active.clone()));
        }
        if let Some(latest) = existing.first() {
            let resend_pending = resend_requested_at.is_some_and(|at| latest.created_at < at);
            if !resend_pending {
                tx.commit().await?;
                return Ok(ClaimedRow::Existing(latest.clone()));
            }
        }

        let inserted = insert_mapping(&mut tx, new).await?;
        tx.commit().await?;
        Ok(ClaimedRow::Inserted(inserted))
    }

    pub async fn get_mapping(&self, mapping_id: Uuid) -> Result<MappingRow, DatabaseError> {
        let sql = format!("SELECT {MAPPING_COLUMNS} FROM accumulation_treatment_mappings WHERE mapping_id = $1");
        sqlx::query_as::<_, MappingRow>(&sql)
            .bind(mapping_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("AccumulationTreatmentMapping", mapping_id))
    }

    pub async fn find_mapping_by_transaction(
        &self,
        payer_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<MappingRow>, DatabaseError> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM accumulation_treatment_mappings \
             WHERE payer_id = $1 AND upper(accumulation_transaction_id) = upper($2)"
        );
        let row = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(payer_id)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Mappings for a claim or request UUID, oldest first
    pub async fn mappings_for_claim(&self, claim_id: Uuid) -> Result<Vec<MappingRow>, DatabaseError> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM accumulation_treatment_mappings \
             WHERE reimbursement_claim_id = $1 OR reimbursement_request_id = $1 \
             ORDER BY created_at, mapping_id"
        );
        let rows = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(claim_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Mappings attached to a report, claims before requests, by id
    pub async fn mappings_for_report(&self, report_id: Uuid) -> Result<Vec<MappingRow>, DatabaseError> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM accumulation_treatment_mappings \
             WHERE report_id = $1 \
             ORDER BY reimbursement_claim_id IS NULL, \
                      COALESCE(reimbursement_claim_id, reimbursement_request_id)"
        );
        let rows = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(report_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Writes `row` if the stored status is still `expected`
    ///
    /// # Errors
    ///
    /// `DatabaseError::ConcurrentModification` if the status moved on,
    /// `DatabaseError::NotFound` if the mapping does not exist.
    pub async fn update_mapping_if_status(
        &self,
        row: &MappingRow,
        expected: MappingStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE accumulation_treatment_mappings
            SET report_id = $3,
                status = $4,
                deductible_cents = $5,
                oop_applied_cents = $6,
                response_code = $7,
                completed_at = $8,
                modified_at = $9
            WHERE mapping_id = $1 AND status = $2
            "#,
        )
        .bind(row.mapping_id)
        .bind(expected)
        .bind(row.report_id)
        .bind(row.status)
        .bind(row.deductible_cents)
        .bind(row.oop_applied_cents)
        .bind(&row.response_code)
        .bind(row.completed_at)
        .bind(row.modified_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        let current = self.get_mapping(row.mapping_id).await?;
        Err(DatabaseError::ConcurrentModification(format!(
            "mapping {} is {:?}, expected {:?}",
            row.mapping_id, current.status, expected
        )))
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub async fn get_report(&self, report_id: Uuid) -> Result<ReportRow, DatabaseError> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM payer_accumulation_reports WHERE report_id = $1");
        sqlx::query_as::<_, ReportRow>(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PayerAccumulationReport", report_id))
    }

    /// Reports for a payer and date, oldest first
    pub async fn find_reports(&self, payer_id: Uuid, report_date: NaiveDate) -> Result<Vec<ReportRow>, DatabaseError> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM payer_accumulation_reports \
             WHERE payer_id = $1 AND report_date = $2 \
             ORDER BY created_at, report_id"
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(payer_id)
            .bind(report_date)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Upserts a report and makes `mapping_ids` its exact set of WAITING mappings
    pub async fn save_report(&self, report: &ReportRow, mapping_ids: &[Uuid]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO payer_accumulation_reports
                (report_id, payer_id, filename, report_date, status, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (report_id) DO UPDATE
            SET filename = EXCLUDED.filename,
                status = EXCLUDED.status,
                modified_at = EXCLUDED.modified_at
            "#,
        )
        .bind(report.report_id)
        .bind(report.payer_id)
        .bind(&report.filename)
        .bind(report.report_date)
        .bind(report.status)
        .bind(report.created_at)
        .bind(report.modified_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE accumulation_treatment_mappings
            SET report_id = NULL, modified_at = now()
            WHERE report_id = $1 AND status = 'waiting' AND NOT (mapping_id = ANY($2))
            "#,
        )
        .bind(report.report_id)
        .bind(mapping_ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE accumulation_treatment_mappings
            SET report_id = $1, modified_at = now()
            WHERE mapping_id = ANY($2) AND status = 'waiting'
            "#,
        )
        .bind(report.report_id)
        .bind(mapping_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Sets the report status; SUBMITTED also flips its WAITING mappings
    ///
    /// Returns the number of mappings moved to SUBMITTED.
    pub async fn complete_report(&self, report_id: Uuid, status: ReportStatusDb) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE payer_accumulation_reports SET status = $2, modified_at = now() WHERE report_id = $1",
        )
        .bind(report_id)
        .bind(status)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PayerAccumulationReport", report_id));
        }

        let flipped = if status == ReportStatusDb::Submitted {
            sqlx::query(
                r#"
                UPDATE accumulation_treatment_mappings
                SET status = 'submitted', modified_at = now()
                WHERE report_id = $1 AND status = 'waiting'
                "#,
            )
            .bind(report_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            0
        };

        tx.commit().await?;
        Ok(flipped)
    }

    // ------------------------------------------------------------------
    // Claim feed
    // ------------------------------------------------------------------

    /// Feed rows for a payer that became eligible on or before `as_of`
    ///
    /// Rows already answered by a submitted or finished mapping are left
    /// out. A resend row stays in only until a mapping created after its
    /// publication exists. WAITING mappings never retire a row, so a batch
    /// that failed to ship is picked up again.
    pub async fn eligible_claims(&self, payer_id: Uuid, as_of: NaiveDate) -> Result<Vec<ClaimFeedRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimFeedRow>(
            r#"
            SELECT f.reimbursement_claim_id, f.reimbursement_request_id, f.payer_id, f.member_plan_id,
                   f.date_of_service, f.deductible_applied_cents, f.oop_applied_cents,
                   f.member_first_name, f.member_last_name, f.member_date_of_birth,
                   f.resend, f.published_at
            FROM accumulation_claim_feed f
            WHERE f.payer_id = $1 AND f.eligible_on <= $2
              AND NOT EXISTS (
                  SELECT 1 FROM accumulation_treatment_mappings m
                  WHERE m.payer_id = f.payer_id
                    AND (m.reimbursement_claim_id = f.reimbursement_claim_id
                         OR m.reimbursement_request_id = f.reimbursement_request_id)
                    AND m.status <> 'waiting'
                    AND (NOT f.resend OR m.created_at >= f.published_at)
              )
            ORDER BY f.feed_id
            "#,
        )
        .bind(payer_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Publishes a claim to the feed
    pub async fn insert_feed_row(&self, row: &ClaimFeedRow, eligible_on: NaiveDate) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO accumulation_claim_feed
                (reimbursement_claim_id, reimbursement_request_id, payer_id, member_plan_id,
                 date_of_service, deductible_applied_cents, oop_applied_cents,
                 member_first_name, member_last_name, member_date_of_birth, resend, published_at,
                 eligible_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(row.reimbursement_claim_id)
        .bind(row.reimbursement_request_id)
        .bind(row.payer_id)
        .bind(&row.member_plan_id)
        .bind(row.date_of_service)
        .bind(row.deductible_applied_cents)
        .bind(row.oop_applied_cents)
        .bind(&row.member_first_name)
        .bind(&row.member_last_name)
        .bind(row.member_date_of_birth)
        .bind(row.resend)
        .bind(row.published_at)
        .bind(eligible_on)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn insert_mapping(tx: &mut Transaction<'_, Postgres>, row: &MappingRow) -> Result<MappingRow, DatabaseError> {
    let sql = format!(
        "INSERT INTO accumulation_treatment_mappings ({MAPPING_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {MAPPING_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, MappingRow>(&sql)
        .bind(row.mapping_id)
        .bind(row.reimbursement_claim_id)
        .bind(row.reimbursement_request_id)
        .bind(row.payer_id)
        .bind(&row.accumulation_transaction_id)
        .bind(row.report_id)
        .bind(row.status)
        .bind(row.deductible_cents)
        .bind(row.oop_applied_cents)
        .bind(&row.response_code)
        .bind(row.completed_at)
        .bind(row.created_at)
        .bind(row.modified_at)
        .fetch_one(&mut **tx)
        .await?;
    Ok(inserted)
}

// ============================================================================
// Type definitions
// ============================================================================

/// Mapping status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "treatment_accumulation_status", rename_all = "snake_case")]
pub enum MappingStatus {
    Waiting,
    Submitted,
    Processed,
    Accepted,
    Rejected,
    RowError,
    Refunded,
    Skip,
}

impl MappingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MappingStatus::Waiting | MappingStatus::Submitted)
    }
}

/// Report status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
pub enum ReportStatusDb {
    New,
    Submitted,
    Failure,
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PayerRow {
    pub payer_id: Uuid,
    pub name: String,
    pub code: String,
}

/// Database row for a claim mapping
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MappingRow {
    pub mapping_id: Uuid,
    pub reimbursement_claim_id: Option<Uuid>,
    pub reimbursement_request_id: Option<Uuid>,
    pub payer_id: Uuid,
    pub accumulation_transaction_id: String,
    pub report_id: Option<Uuid>,
    pub status: MappingStatus,
    pub deductible_cents: Option<i64>,
    pub oop_applied_cents: Option<i64>,
    pub response_code: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ReportRow {
    pub report_id: Uuid,
    pub payer_id: Uuid,
    pub filename: String,
    pub report_date: NaiveDate,
    pub status: ReportStatusDb,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Database row from the eligible claim feed
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClaimFeedRow {
    pub reimbursement_claim_id: Option<Uuid>,
    pub reimbursement_request_id: Option<Uuid>,
    pub payer_id: Uuid,
    pub member_plan_id: String,
    pub date_of_service: NaiveDate,
    pub deductible_applied_cents: Option<i64>,
    pub oop_applied_cents: Option<i64>,
    pub member_first_name: Option<String>,
    pub member_last_name: Option<String>,
    pub member_date_of_birth: Option<NaiveDate>,
    pub resend: bool,
    pub published_at: DateTime<Utc>,
}

/// Outcome of [`AccumulationRepository::claim_mapping`]
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimedRow {
    Inserted(MappingRow),
    Existing(MappingRow),
}
