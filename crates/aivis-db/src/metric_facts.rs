//! Stage-2 output: the metric fact for a result and its brand/competitor
//! position metrics.
//!
//! Every write is an upsert keyed on the natural key, so rerunning a stage
//! after a crash converges on the same rows. [`save_position_metrics`] writes
//! a fact and all of its metrics in one transaction: a fact row never exists
//! without its metrics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricFactRow {
    pub id: i64,
    pub collector_result_id: i64,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub query_id: Uuid,
    pub collector_type: String,
    pub topic: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMetricFact<'a> {
    pub collector_result_id: i64,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub query_id: Uuid,
    pub collector_type: &'a str,
    pub topic: Option<&'a str>,
    pub collected_at: DateTime<Utc>,
}

/// Position metrics for one entity within one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMetrics {
    pub visibility_score: Decimal,
    pub share_of_answers: Decimal,
    pub has_presence: bool,
    pub first_mention_offset: Option<i32>,
    pub mention_offsets: Vec<i32>,
    pub mentions: i32,
    pub answer_word_count: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandMetricRow {
    pub id: i64,
    pub fact_id: i64,
    pub visibility_score: Decimal,
    pub share_of_answers: Decimal,
    pub has_brand_presence: bool,
    pub first_mention_offset: Option<i32>,
    pub mention_offsets: Vec<i32>,
    pub brand_mentions: i32,
    pub answer_word_count: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorMetricRow {
    pub id: i64,
    pub fact_id: i64,
    pub competitor_id: Uuid,
    pub competitor_name: String,
    pub visibility_score: Decimal,
    pub share_of_answers: Decimal,
    pub has_competitor_presence: bool,
    pub first_mention_offset: Option<i32>,
    pub mention_offsets: Vec<i32>,
    pub competitor_mentions: i32,
    pub answer_word_count: i32,
}

// ---------------------------------------------------------------------------
// metric_facts
// ---------------------------------------------------------------------------

/// Insert or refresh the metric fact for a collector result and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_metric_fact<'e>(
    executor: impl PgExecutor<'e>,
    fact: &NewMetricFact<'_>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO metric_facts \
             (collector_result_id, brand_id, customer_id, query_id, collector_type, topic, collected_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (collector_result_id) DO UPDATE SET \
             collector_type = EXCLUDED.collector_type, \
             topic = EXCLUDED.topic, \
             collected_at = EXCLUDED.collected_at \
         RETURNING id",
    )
    .bind(fact.collector_result_id)
    .bind(fact.brand_id)
    .bind(fact.customer_id)
    .bind(fact.query_id)
    .bind(fact.collector_type)
    .bind(fact.topic)
    .bind(fact.collected_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Fetch the metric fact for a collector result, if stage 2 has written one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_metric_fact_for_result(
    pool: &PgPool,
    collector_result_id: i64,
) -> Result<Option<MetricFactRow>, DbError> {
    let row = sqlx::query_as::<_, MetricFactRow>(
        "SELECT id, collector_result_id, brand_id, customer_id, query_id, collector_type, \
                topic, collected_at, created_at \
         FROM metric_facts WHERE collector_result_id = $1",
    )
    .bind(collector_result_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// brand_metrics / competitor_metrics
// ---------------------------------------------------------------------------

/// Insert or replace the brand metrics for a fact.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_brand_metric<'e>(
    executor: impl PgExecutor<'e>,
    fact_id: i64,
    metrics: &PositionMetrics,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO brand_metrics \
             (fact_id, visibility_score, share_of_answers, has_brand_presence, \
              first_mention_offset, mention_offsets, brand_mentions, answer_word_count) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (fact_id) DO UPDATE SET \
             visibility_score = EXCLUDED.visibility_score, \
             share_of_answers = EXCLUDED.share_of_answers, \
             has_brand_presence = EXCLUDED.has_brand_presence, \
             first_mention_offset = EXCLUDED.first_mention_offset, \
             mention_offsets = EXCLUDED.mention_offsets, \
             brand_mentions = EXCLUDED.brand_mentions, \
             answer_word_count = EXCLUDED.answer_word_count, \
             updated_at = NOW()",
    )
    .bind(fact_id)
    .bind(metrics.visibility_score)
    .bind(metrics.share_of_answers)
    .bind(metrics.has_presence)
    .bind(metrics.first_mention_offset)
    .bind(&metrics.mention_offsets)
    .bind(metrics.mentions)
    .bind(metrics.answer_word_count)
    .execute(executor)
    .await?;

    Ok(())
}

/// Insert or replace one competitor's metrics for a fact.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_competitor_metric<'e>(
    executor: impl PgExecutor<'e>,
    fact_id: i64,
    competitor_id: Uuid,
    competitor_name: &str,
    metrics: &PositionMetrics,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO competitor_metrics \
             (fact_id, competitor_id, competitor_name, visibility_score, share_of_answers, \
              has_competitor_presence, first_mention_offset, mention_offsets, \
              competitor_mentions, answer_word_count) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (fact_id, competitor_id) DO UPDATE SET \
             competitor_name = EXCLUDED.competitor_name, \
             visibility_score = EXCLUDED.visibility_score, \
             share_of_answers = EXCLUDED.share_of_answers, \
             has_competitor_presence = EXCLUDED.has_competitor_presence, \
             first_mention_offset = EXCLUDED.first_mention_offset, \
             mention_offsets = EXCLUDED.mention_offsets, \
             competitor_mentions = EXCLUDED.competitor_mentions, \
             answer_word_count = EXCLUDED.answer_word_count, \
             updated_at = NOW()",
    )
    .bind(fact_id)
    .bind(competitor_id)
    .bind(competitor_name)
    .bind(metrics.visibility_score)
    .bind(metrics.share_of_answers)
    .bind(metrics.has_presence)
    .bind(metrics.first_mention_offset)
    .bind(&metrics.mention_offsets)
    .bind(metrics.mentions)
    .bind(metrics.answer_word_count)
    .execute(executor)
    .await?;

    Ok(())
}

/// One competitor's share of a stage-2 write.
#[derive(Debug, Clone)]
pub struct CompetitorPosition<'a> {
    pub competitor_id: Uuid,
    pub competitor_name: &'a str,
    pub metrics: &'a PositionMetrics,
}

/// Write the metric fact, the brand metrics and every competitor's metrics
/// in a single transaction, returning the fact id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any write fails; nothing is committed then.
pub async fn save_position_metrics(
    pool: &PgPool,
    fact: &NewMetricFact<'_>,
    brand: &PositionMetrics,
    competitors: &[CompetitorPosition<'_>],
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let fact_id = upsert_metric_fact(&mut *tx, fact).await?;
    upsert_brand_metric(&mut *tx, fact_id, brand).await?;
    for competitor in competitors {
        upsert_competitor_metric(
            &mut *tx,
            fact_id,
            competitor.competitor_id,
            competitor.competitor_name,
            competitor.metrics,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(fact_id)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_metric(
    pool: &PgPool,
    fact_id: i64,
) -> Result<Option<BrandMetricRow>, DbError> {
    let row = sqlx::query_as::<_, BrandMetricRow>(
        "SELECT id, fact_id, visibility_score, share_of_answers, has_brand_presence, \
                first_mention_offset, mention_offsets, brand_mentions, answer_word_count \
         FROM brand_metrics WHERE fact_id = $1",
    )
    .bind(fact_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_competitor_metrics(
    pool: &PgPool,
    fact_id: i64,
) -> Result<Vec<CompetitorMetricRow>, DbError> {
    let rows = sqlx::query_as::<_, CompetitorMetricRow>(
        "SELECT id, fact_id, competitor_id, competitor_name, visibility_score, share_of_answers, \
                has_competitor_presence, first_mention_offset, mention_offsets, \
                competitor_mentions, answer_word_count \
         FROM competitor_metrics WHERE fact_id = $1 ORDER BY competitor_name",
    )
    .bind(fact_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
