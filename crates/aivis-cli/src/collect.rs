//! `collect` command: fan queries out across the configured collectors.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use aivis_collector::{
    build_chains, ChainSource, DbChainSource, FileChainSource, MemoryResultStore, Orchestrator,
    OrchestratorSettings, PgResultStore, ResultStore,
};
use aivis_core::{AppConfig, ChainSourceKind, CollectionStatus, QueryExecutionRequest};
use aivis_providers::{HttpSettings, ProviderRegistry};

/// Runs every request in `input` and prints the per-collector results as JSON.
///
/// With `dry_run`, providers are still called but nothing is written to the
/// database. A database-backed chain source still needs a connection.
///
/// # Errors
///
/// Returns an error if the input or collectors file cannot be read, a
/// provider is misconfigured, or the database is unreachable. Individual
/// collector failures are reported in the output, not returned.
pub(crate) async fn run_collect(
    config: &AppConfig,
    input: &Path,
    batch_size: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let requests: Vec<QueryExecutionRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of requests", input.display()))?;
    if requests.is_empty() {
        println!("no requests in {}", input.display());
        return Ok(());
    }

    let collectors = aivis_core::load_collectors(&config.collectors_path)?;
    let http = HttpSettings {
        request_timeout: Duration::from_secs(config.provider_request_timeout_secs),
        user_agent: config.provider_user_agent.clone(),
    };
    let registry =
        ProviderRegistry::from_env(&collectors, &http, config.provider_retry_backoff_base_ms)?;

    let needs_pool = !dry_run || config.chain_source == ChainSourceKind::Database;
    let pool = if needs_pool {
        let pool_config = aivis_db::PoolConfig::from_app_config(config);
        Some(aivis_db::connect_pool(&config.database_url, pool_config).await?)
    } else {
        None
    };

    let source: Box<dyn ChainSource> = match (config.chain_source, &pool) {
        (ChainSourceKind::Database, Some(pool)) => {
            Box::new(DbChainSource::new(pool.clone(), &registry))
        }
        _ => Box::new(FileChainSource::new(&collectors)),
    };
    let chains = build_chains(source.as_ref(), &registry).await?;

    let store: Arc<dyn ResultStore> = match (&pool, dry_run) {
        (Some(pool), false) => Arc::new(PgResultStore::new(pool.clone())),
        _ => Arc::new(MemoryResultStore::new()),
    };

    let mut settings = OrchestratorSettings::from_app_config(config);
    if let Some(size) = batch_size {
        settings.batch_size = size.max(1);
    }

    let orchestrator = Orchestrator::new(chains, store, settings);
    tracing::info!(
        requests = requests.len(),
        collectors = ?orchestrator.collectors(),
        dry_run,
        "collection started"
    );

    let results = orchestrator.execute_queries(requests).await;
    let completed = results
        .iter()
        .filter(|r| r.status == CollectionStatus::Completed)
        .count();
    tracing::info!(
        results = results.len(),
        completed,
        failed = results.len() - completed,
        "collection finished"
    );

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
