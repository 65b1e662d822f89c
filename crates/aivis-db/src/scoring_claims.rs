//! Scoring work-queue operations on `collector_results`.
//!
//! Workers coordinate only through the `scoring_*` columns. A claim is a
//! single compare-and-set `UPDATE ... RETURNING`, so at most one worker wins
//! a given row. Finalizing writes are conditional on the claiming worker id,
//! which makes a late write from a worker whose claim was swept as stale a
//! no-op instead of clobbering the new owner.

use aivis_core::ScoringStatus;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// The subset of a `collector_results` row the scoring stages need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoringCandidateRow {
    pub id: i64,
    pub query_id: Uuid,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub collector_type: String,
    pub query_text: String,
    pub topic: Option<String>,
    pub raw_answer: String,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
    pub scoring_status: Option<String>,
    pub scoring_worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

const CANDIDATE_COLUMNS: &str = "id, query_id, brand_id, customer_id, collector_type, query_text, \
     topic, raw_answer, citations, urls, scoring_status, scoring_worker_id, created_at";

fn claimable() -> Vec<String> {
    ScoringStatus::CLAIMABLE
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// List unscored rows for one brand and customer, newest first.
///
/// A row is a candidate when it has a non-null answer and its scoring status
/// is `NULL`, `pending`, or `error`. Listing does not claim anything.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scoring_candidates(
    pool: &PgPool,
    brand_id: Uuid,
    customer_id: Uuid,
    limit: i64,
) -> Result<Vec<ScoringCandidateRow>, DbError> {
    let rows = sqlx::query_as::<_, ScoringCandidateRow>(&format!(
        "SELECT {CANDIDATE_COLUMNS} FROM collector_results \
         WHERE brand_id = $1 AND customer_id = $2 \
           AND raw_answer IS NOT NULL \
           AND (scoring_status IS NULL OR scoring_status = ANY($4)) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3"
    ))
    .bind(brand_id)
    .bind(customer_id)
    .bind(limit)
    .bind(claimable())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Atomically claim one row for `worker_id`.
///
/// Returns `None` when the row is already claimed, completed, missing, or
/// has no answer. Exactly one of any number of concurrent callers for the
/// same claimable row receives `Some`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_for_scoring(
    pool: &PgPool,
    id: i64,
    worker_id: &str,
) -> Result<Option<ScoringCandidateRow>, DbError> {
    let row = sqlx::query_as::<_, ScoringCandidateRow>(&format!(
        "UPDATE collector_results \
         SET scoring_status = $3, scoring_started_at = NOW(), \
             scoring_worker_id = $2, scoring_error = NULL, updated_at = NOW() \
         WHERE id = $1 \
           AND raw_answer IS NOT NULL \
           AND (scoring_status IS NULL OR scoring_status = ANY($4)) \
         RETURNING {CANDIDATE_COLUMNS}"
    ))
    .bind(id)
    .bind(worker_id)
    .bind(ScoringStatus::Processing.as_str())
    .bind(claimable())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return every `processing` claim older than `stale_after_secs` to `pending`.
///
/// Returns the number of rows reset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reset_stale_claims(pool: &PgPool, stale_after_secs: i64) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE collector_results \
         SET scoring_status = $2, scoring_worker_id = NULL, \
             scoring_started_at = NULL, updated_at = NOW() \
         WHERE scoring_status = $3 \
           AND scoring_started_at < NOW() - ($1 * INTERVAL '1 second')",
    )
    .bind(stale_after_secs)
    .bind(ScoringStatus::Pending.as_str())
    .bind(ScoringStatus::Processing.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Mark a claimed row `completed` and release the claim.
///
/// # Errors
///
/// Returns [`DbError::ClaimLost`] if `worker_id` no longer holds the claim,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scoring(pool: &PgPool, id: i64, worker_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collector_results \
         SET scoring_status = $3, scoring_completed_at = NOW(), \
             scoring_error = NULL, scoring_worker_id = NULL, updated_at = NOW() \
         WHERE id = $1 AND scoring_status = $4 AND scoring_worker_id = $2",
    )
    .bind(id)
    .bind(worker_id)
    .bind(ScoringStatus::Completed.as_str())
    .bind(ScoringStatus::Processing.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ClaimLost {
            id,
            worker_id: worker_id.to_string(),
        });
    }

    Ok(())
}

/// Mark a claimed row `error` with a message and release the claim. The row
/// becomes claimable again.
///
/// # Errors
///
/// Returns [`DbError::ClaimLost`] if `worker_id` no longer holds the claim,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scoring(
    pool: &PgPool,
    id: i64,
    worker_id: &str,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collector_results \
         SET scoring_status = $4, scoring_error = $3, scoring_worker_id = NULL, \
             updated_at = NOW() \
         WHERE id = $1 AND scoring_status = $5 AND scoring_worker_id = $2",
    )
    .bind(id)
    .bind(worker_id)
    .bind(error_message)
    .bind(ScoringStatus::Error.as_str())
    .bind(ScoringStatus::Processing.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ClaimLost {
            id,
            worker_id: worker_id.to_string(),
        });
    }

    Ok(())
}
