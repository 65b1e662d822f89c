//! Stage-1 output: one consolidated analysis per collector result.
//!
//! `products` and `sentiments` are opaque JSON documents owned by the scoring
//! crate; this module only stores and returns them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConsolidatedAnalysisRow {
    pub id: i64,
    pub collector_result_id: i64,
    pub engine: String,
    pub products: Value,
    pub sentiments: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fetch the stored analysis for a result, if stage 1 has already run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_consolidated_analysis(
    pool: &PgPool,
    collector_result_id: i64,
) -> Result<Option<ConsolidatedAnalysisRow>, DbError> {
    let row = sqlx::query_as::<_, ConsolidatedAnalysisRow>(
        "SELECT id, collector_result_id, engine, products, sentiments, created_at, updated_at \
         FROM consolidated_analyses WHERE collector_result_id = $1",
    )
    .bind(collector_result_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert or replace the analysis for a result and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_consolidated_analysis(
    pool: &PgPool,
    collector_result_id: i64,
    engine: &str,
    products: &Value,
    sentiments: &Value,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO consolidated_analyses (collector_result_id, engine, products, sentiments) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (collector_result_id) DO UPDATE SET \
             engine = EXCLUDED.engine, \
             products = EXCLUDED.products, \
             sentiments = EXCLUDED.sentiments, \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(collector_result_id)
    .bind(engine)
    .bind(products)
    .bind(sentiments)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
