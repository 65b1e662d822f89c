//! Data-driven fallback chains stored in `collector_provider_settings`.

use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProviderSettingRow {
    pub id: i64,
    pub collector: String,
    pub provider: String,
    pub priority: i32,
    pub timeout_ms: i64,
    pub max_retries: i32,
    pub continue_on_failure: bool,
    pub enabled: bool,
}

/// List the enabled chain entries for a collector, in ascending priority.
///
/// Collector names match case-insensitively.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_chain_settings(
    pool: &PgPool,
    collector: &str,
) -> Result<Vec<ProviderSettingRow>, DbError> {
    let rows = sqlx::query_as::<_, ProviderSettingRow>(
        "SELECT id, collector, provider, priority, timeout_ms, max_retries, \
                continue_on_failure, enabled \
         FROM collector_provider_settings \
         WHERE lower(collector) = lower($1) AND enabled = true \
         ORDER BY priority",
    )
    .bind(collector)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Distinct collector names with at least one enabled entry, lower-cased.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_chain_collectors(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT lower(collector) AS collector \
         FROM collector_provider_settings \
         WHERE enabled = true \
         ORDER BY 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(names)
}

/// Insert or replace one chain entry.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including a priority clash
/// with another provider in the same collector.
pub async fn upsert_chain_setting(
    pool: &PgPool,
    collector: &str,
    provider: &str,
    priority: i32,
    timeout_ms: i64,
    max_retries: i32,
    continue_on_failure: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO collector_provider_settings \
             (collector, provider, priority, timeout_ms, max_retries, continue_on_failure) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (collector, provider) DO UPDATE SET \
             priority = EXCLUDED.priority, \
             timeout_ms = EXCLUDED.timeout_ms, \
             max_retries = EXCLUDED.max_retries, \
             continue_on_failure = EXCLUDED.continue_on_failure, \
             enabled = true, \
             updated_at = NOW()",
    )
    .bind(collector)
    .bind(provider)
    .bind(priority)
    .bind(timeout_ms)
    .bind(max_retries)
    .bind(continue_on_failure)
    .execute(pool)
    .await?;

    Ok(())
}
