use aivis_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/aivis-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    /// A conditional status update matched no row: the row is missing or is
    /// not in a state from which `to` may be entered.
    #[error("collector result {id} cannot transition to '{to}'")]
    InvalidStatusTransition { id: i64, to: &'static str },
    /// A scoring write was attempted by a worker that no longer owns the claim.
    #[error("collector result {id} is not claimed by worker '{worker_id}'")]
    ClaimLost { id: i64, worker_id: String },
    #[error("query execution {id} cannot transition to '{to}'")]
    InvalidExecutionTransition { id: i64, to: &'static str },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}


pub mod brands;
pub mod citation_categories;
pub mod collector_results;
pub mod consolidated_analyses;
pub mod metric_facts;
pub mod provider_settings;
pub mod query_executions;
pub mod scoring_claims;
pub mod sentiments;

pub use brands::{get_brand, list_active_competitors, BrandRow, CompetitorRow};
pub use citation_categories::{get_citation_category, upsert_citation_category, CitationCategoryRow};
pub use collector_results::{
    complete_collector_result, fail_collector_result, get_collector_result,
    insert_collector_result, list_collector_results_for_execution, mark_collector_result_running,
    CollectorResultRow, NewCollectorResult,
};
pub use consolidated_analyses::{
    get_consolidated_analysis, upsert_consolidated_analysis, ConsolidatedAnalysisRow,
};
pub use metric_facts::{
    get_brand_metric, get_metric_fact_for_result, list_competitor_metrics,
    save_position_metrics, upsert_brand_metric, upsert_competitor_metric, upsert_metric_fact,
    BrandMetricRow, CompetitorMetricRow, CompetitorPosition, MetricFactRow, NewMetricFact,
    PositionMetrics,
};
pub use provider_settings::{
    list_chain_collectors, list_chain_settings, upsert_chain_setting, ProviderSettingRow,
};
pub use query_executions::{
    create_query_execution, finish_query_execution, get_query_execution, start_query_execution,
    QueryExecutionRow,
};
pub use scoring_claims::{
    claim_for_scoring, complete_scoring, fail_scoring, list_scoring_candidates,
    reset_stale_claims, ScoringCandidateRow,
};
pub use sentiments::{
    get_brand_sentiment, list_competitor_sentiments, upsert_brand_sentiment,
    upsert_competitor_sentiment, SentimentRow,
};
