//! Read-only lookups for `brands` and `competitors`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `competitors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorRow {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fetch a brand scoped to its owning customer.
///
/// Returns `None` when the brand does not exist or belongs to a different
/// customer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(
    pool: &PgPool,
    brand_id: Uuid,
    customer_id: Uuid,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "SELECT id, customer_id, name, created_at, updated_at \
         FROM brands \
         WHERE id = $1 AND customer_id = $2",
    )
    .bind(brand_id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List the active competitors of a brand, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_competitors(
    pool: &PgPool,
    brand_id: Uuid,
) -> Result<Vec<CompetitorRow>, DbError> {
    let rows = sqlx::query_as::<_, CompetitorRow>(
        "SELECT id, brand_id, name, is_active, created_at \
         FROM competitors \
         WHERE brand_id = $1 AND is_active = true \
         ORDER BY name",
    )
    .bind(brand_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
