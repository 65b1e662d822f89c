//! Collection-side operations on `collector_results`.
//!
//! Every status change is a single conditional `UPDATE` guarded by the set of
//! legal predecessor statuses, and appends an entry to the row's `status_log`
//! JSON array. A transition that matches no row returns
//! [`DbError::InvalidStatusTransition`].

use aivis_core::CollectionStatus;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A full row from the `collector_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectorResultRow {
    pub id: i64,
    pub execution_id: Option<i64>,
    pub query_id: Uuid,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub collector_type: String,
    pub query_text: String,
    pub topic: Option<String>,
    pub intent: String,
    pub locale: String,
    pub country: String,
    pub raw_answer: Option<String>,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
    pub provider: Option<String>,
    pub provider_metadata: Value,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub status: String,
    pub status_log: Value,
    pub scoring_status: Option<String>,
    pub scoring_started_at: Option<DateTime<Utc>>,
    pub scoring_completed_at: Option<DateTime<Utc>>,
    pub scoring_error: Option<String>,
    pub scoring_worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity and query context captured when a result row is first created.
#[derive(Debug, Clone)]
pub struct NewCollectorResult<'a> {
    pub execution_id: Option<i64>,
    pub query_id: Uuid,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub collector_type: &'a str,
    pub query_text: &'a str,
    pub topic: Option<&'a str>,
    pub intent: &'a str,
    pub locale: &'a str,
    pub country: &'a str,
}

const SELECT_COLUMNS: &str = "id, execution_id, query_id, brand_id, customer_id, collector_type, \
     query_text, topic, intent, locale, country, raw_answer, citations, urls, provider, \
     provider_metadata, error_message, execution_time_ms, status, status_log, scoring_status, \
     scoring_started_at, scoring_completed_at, scoring_error, scoring_worker_id, \
     created_at, updated_at";

fn predecessors(next: CollectionStatus) -> Vec<String> {
    CollectionStatus::allowed_predecessors(next)
        .into_iter()
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Insert a new result row in `pending` status and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_collector_result(
    pool: &PgPool,
    new: &NewCollectorResult<'_>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO collector_results \
             (execution_id, query_id, brand_id, customer_id, collector_type, query_text, \
              topic, intent, locale, country, status, status_log) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', \
                 jsonb_build_array(jsonb_build_object('status', 'pending', 'at', NOW()))) \
         RETURNING id",
    )
    .bind(new.execution_id)
    .bind(new.query_id)
    .bind(new.brand_id)
    .bind(new.customer_id)
    .bind(new.collector_type)
    .bind(new.query_text)
    .bind(new.topic)
    .bind(new.intent)
    .bind(new.locale)
    .bind(new.country)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Move a result from `pending` to `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the row is not `pending`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn mark_collector_result_running(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let to = CollectionStatus::Running;
    let result = sqlx::query(
        "UPDATE collector_results \
         SET status = $2, \
             status_log = status_log || jsonb_build_array(jsonb_build_object('status', $2::text, 'at', NOW())), \
             updated_at = NOW() \
         WHERE id = $1 AND status = ANY($3)",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(predecessors(to))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            id,
            to: to.as_str(),
        });
    }

    Ok(())
}

/// Record a successful answer and mark the row `completed`.
///
/// The row becomes eligible for scoring: `scoring_status` is set to
/// `pending` alongside the non-null `raw_answer`.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the row is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
#[allow(clippy::too_many_arguments)]
pub async fn complete_collector_result(
    pool: &PgPool,
    id: i64,
    raw_answer: &str,
    citations: &[String],
    urls: &[String],
    provider: &str,
    provider_metadata: &Value,
    execution_time_ms: i64,
) -> Result<(), DbError> {
    let to = CollectionStatus::Completed;
    let result = sqlx::query(
        "UPDATE collector_results \
         SET status = $2, \
             raw_answer = $3, citations = $4, urls = $5, provider = $6, \
             provider_metadata = $7, execution_time_ms = $8, error_message = NULL, \
             scoring_status = 'pending', \
             status_log = status_log || jsonb_build_array(jsonb_build_object('status', $2::text, 'at', NOW(), 'provider', $6::text)), \
             updated_at = NOW() \
         WHERE id = $1 AND status = ANY($9)",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(raw_answer)
    .bind(citations)
    .bind(urls)
    .bind(provider)
    .bind(provider_metadata)
    .bind(execution_time_ms)
    .bind(predecessors(to))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            id,
            to: to.as_str(),
        });
    }

    Ok(())
}

/// Record a failed collection. `retryable` selects `failed_retry` over `failed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the row is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_collector_result(
    pool: &PgPool,
    id: i64,
    retryable: bool,
    error_message: &str,
    provider_metadata: &Value,
    execution_time_ms: i64,
) -> Result<(), DbError> {
    let to = if retryable {
        CollectionStatus::FailedRetry
    } else {
        CollectionStatus::Failed
    };
    let result = sqlx::query(
        "UPDATE collector_results \
         SET status = $2, error_message = $3, provider_metadata = $4, execution_time_ms = $5, \
             status_log = status_log || jsonb_build_array(jsonb_build_object('status', $2::text, 'at', NOW(), 'error', $3::text)), \
             updated_at = NOW() \
         WHERE id = $1 AND status = ANY($6)",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(error_message)
    .bind(provider_metadata)
    .bind(execution_time_ms)
    .bind(predecessors(to))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            id,
            to: to.as_str(),
        });
    }

    Ok(())
}

/// Fetch a single result row by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_collector_result(
    pool: &PgPool,
    id: i64,
) -> Result<Option<CollectorResultRow>, DbError> {
    let row = sqlx::query_as::<_, CollectorResultRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collector_results WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List every result row belonging to one query execution, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collector_results_for_execution(
    pool: &PgPool,
    execution_id: i64,
) -> Result<Vec<CollectorResultRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectorResultRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collector_results \
         WHERE execution_id = $1 ORDER BY id"
    ))
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
