//! Stage-3 output: brand and competitor sentiment rows per metric fact.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A sentiment row from either `brand_sentiments` or `competitor_sentiments`.
///
/// `competitor_id` is `None` for brand rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentRow {
    pub id: i64,
    pub fact_id: i64,
    pub competitor_id: Option<Uuid>,
    pub label: String,
    pub score: Decimal,
    pub positive_sentences: Vec<String>,
    pub negative_sentences: Vec<String>,
}

/// Insert or replace the brand sentiment for a fact.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_brand_sentiment(
    pool: &PgPool,
    fact_id: i64,
    label: &str,
    score: Decimal,
    positive_sentences: &[String],
    negative_sentences: &[String],
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO brand_sentiments \
             (fact_id, label, score, positive_sentences, negative_sentences) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (fact_id) DO UPDATE SET \
             label = EXCLUDED.label, \
             score = EXCLUDED.score, \
             positive_sentences = EXCLUDED.positive_sentences, \
             negative_sentences = EXCLUDED.negative_sentences, \
             updated_at = NOW()",
    )
    .bind(fact_id)
    .bind(label)
    .bind(score)
    .bind(positive_sentences)
    .bind(negative_sentences)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or replace one competitor's sentiment for a fact.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_competitor_sentiment(
    pool: &PgPool,
    fact_id: i64,
    competitor_id: Uuid,
    label: &str,
    score: Decimal,
    positive_sentences: &[String],
    negative_sentences: &[String],
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO competitor_sentiments \
             (fact_id, competitor_id, label, score, positive_sentences, negative_sentences) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (fact_id, competitor_id) DO UPDATE SET \
             label = EXCLUDED.label, \
             score = EXCLUDED.score, \
             positive_sentences = EXCLUDED.positive_sentences, \
             negative_sentences = EXCLUDED.negative_sentences, \
             updated_at = NOW()",
    )
    .bind(fact_id)
    .bind(competitor_id)
    .bind(label)
    .bind(score)
    .bind(positive_sentences)
    .bind(negative_sentences)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_sentiment(
    pool: &PgPool,
    fact_id: i64,
) -> Result<Option<SentimentRow>, DbError> {
    let row = sqlx::query_as::<_, SentimentRow>(
        "SELECT id, fact_id, NULL::uuid AS competitor_id, label, score, \
                positive_sentences, negative_sentences \
         FROM brand_sentiments WHERE fact_id = $1",
    )
    .bind(fact_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_competitor_sentiments(
    pool: &PgPool,
    fact_id: i64,
) -> Result<Vec<SentimentRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentRow>(
        "SELECT id, fact_id, competitor_id, label, score, \
                positive_sentences, negative_sentences \
         FROM competitor_sentiments WHERE fact_id = $1 ORDER BY id",
    )
    .bind(fact_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
