//! Database operations for `query_executions`, the per-request tracking row.

use aivis_core::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `query_executions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueryExecutionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub query_id: Uuid,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub collectors: Vec<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Present only when at least one collector retried or fell back.
    pub retry_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, public_id, query_id, brand_id, customer_id, collectors, status, \
     started_at, completed_at, error_message, retry_metadata, created_at";

/// Create a new execution in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_query_execution(
    pool: &PgPool,
    query_id: Uuid,
    brand_id: Uuid,
    customer_id: Uuid,
    collectors: &[String],
) -> Result<QueryExecutionRow, DbError> {
    let row = sqlx::query_as::<_, QueryExecutionRow>(&format!(
        "INSERT INTO query_executions (public_id, query_id, brand_id, customer_id, collectors, status) \
         VALUES ($1, $2, $3, $4, $5, 'queued') \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(query_id)
    .bind(brand_id)
    .bind(customer_id)
    .bind(collectors)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks an execution as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidExecutionTransition`] if the execution is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_query_execution(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE query_executions \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidExecutionTransition { id, to: "running" });
    }

    Ok(())
}

/// Close a `running` execution with its final status.
///
/// # Errors
///
/// Returns [`DbError::InvalidExecutionTransition`] if `status` is not a
/// final status or the execution is not `running`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn finish_query_execution(
    pool: &PgPool,
    id: i64,
    status: ExecutionStatus,
    error_message: Option<&str>,
    retry_metadata: Option<&Value>,
) -> Result<(), DbError> {
    if matches!(status, ExecutionStatus::Queued | ExecutionStatus::Running) {
        return Err(DbError::InvalidExecutionTransition {
            id,
            to: status.as_str(),
        });
    }

    let result = sqlx::query(
        "UPDATE query_executions \
         SET status = $2, completed_at = NOW(), error_message = $3, retry_metadata = $4 \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(error_message)
    .bind(retry_metadata)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidExecutionTransition {
            id,
            to: status.as_str(),
        });
    }

    Ok(())
}

/// Fetch an execution by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_query_execution(
    pool: &PgPool,
    id: i64,
) -> Result<Option<QueryExecutionRow>, DbError> {
    let row = sqlx::query_as::<_, QueryExecutionRow>(&format!(
        "SELECT {COLUMNS} FROM query_executions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
