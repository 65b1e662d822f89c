//! Per-domain citation category cache.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CitationCategoryRow {
    pub domain: String,
    pub category: String,
    pub classified_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Look up the cached category for a normalized domain.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_citation_category(
    pool: &PgPool,
    domain: &str,
) -> Result<Option<CitationCategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CitationCategoryRow>(
        "SELECT domain, category, classified_by, created_at, updated_at \
         FROM citation_categories WHERE domain = $1",
    )
    .bind(domain)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert or replace the category for a domain.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including when `category`
/// violates the column's check constraint.
pub async fn upsert_citation_category(
    pool: &PgPool,
    domain: &str,
    category: &str,
    classified_by: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO citation_categories (domain, category, classified_by) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (domain) DO UPDATE SET \
             category = EXCLUDED.category, \
             classified_by = EXCLUDED.classified_by, \
             updated_at = NOW()",
    )
    .bind(domain)
    .bind(category)
    .bind(classified_by)
    .execute(pool)
    .await?;

    Ok(())
}
