//! `score` commands: one-off sweeps, stale-claim recovery, and a recurring
//! sweep driven by a cron schedule.

use std::sync::Arc;

use clap::Subcommand;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use aivis_core::AppConfig;
use aivis_scoring::{
    engine_from_config, CitationCategorizer, Coordinator, CoordinatorSettings,
    HeuristicClassifier, PgCategoryCache, PgScoringStore,
};

/// Every five minutes, on the minute.
pub(crate) const DEFAULT_WATCH_SCHEDULE: &str = "0 */5 * * * *";

#[derive(Debug, Subcommand)]
pub enum ScoreCommands {
    /// Score unscored answers for one brand
    Run {
        #[arg(long)]
        brand: Uuid,

        #[arg(long)]
        customer: Uuid,

        /// Maximum rows to score (defaults to AIVIS_SCORING_BATCH_SIZE)
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Return abandoned scoring claims to pending
    Recover,
    /// Sweep one brand on a recurring schedule until interrupted
    Watch {
        #[arg(long)]
        brand: Uuid,

        #[arg(long)]
        customer: Uuid,

        /// Six-field cron expression (seconds first)
        #[arg(long, default_value = DEFAULT_WATCH_SCHEDULE)]
        schedule: String,
    },
}

pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    command: ScoreCommands,
) -> anyhow::Result<()> {
    match command {
        ScoreCommands::Run {
            brand,
            customer,
            limit,
        } => {
            let mut settings = CoordinatorSettings::from_app_config(config);
            if let Some(limit) = limit {
                settings.batch_size = limit.max(1);
            }
            let coordinator = build_coordinator(pool, config, settings)?;
            let report = coordinator.run_sweep(brand, customer).await?;
            println!(
                "scored {} of {} candidate(s): {} completed, {} failed, {} skipped, {} stale reset",
                report.claimed,
                report.candidates,
                report.completed,
                report.failed,
                report.skipped,
                report.stale_reset
            );
        }
        ScoreCommands::Recover => {
            let settings = CoordinatorSettings::from_app_config(config);
            let coordinator = build_coordinator(pool, config, settings)?;
            let reset = coordinator.recover_stale().await?;
            println!("reset {reset} stale claim(s)");
        }
        ScoreCommands::Watch {
            brand,
            customer,
            schedule,
        } => run_watch(pool, config, brand, customer, &schedule).await?,
    }
    Ok(())
}

fn build_coordinator(
    pool: &PgPool,
    config: &AppConfig,
    settings: CoordinatorSettings,
) -> anyhow::Result<Coordinator> {
    let engine = engine_from_config(config)?;
    let categorizer =
        CitationCategorizer::new(PgCategoryCache::new(pool.clone()), HeuristicClassifier);
    Ok(Coordinator::new(
        Arc::new(PgScoringStore::new(pool.clone())),
        engine,
        settings,
    )
    .with_categorizer(Arc::new(categorizer)))
}

async fn run_watch(
    pool: &PgPool,
    config: &AppConfig,
    brand_id: Uuid,
    customer_id: Uuid,
    schedule: &str,
) -> anyhow::Result<()> {
    let settings = CoordinatorSettings::from_app_config(config);
    let coordinator = Arc::new(build_coordinator(pool, config, settings)?);
    coordinator.recover_stale().await?;

    // Held for the length of a sweep; a tick that finds it taken is skipped.
    let running = Arc::new(Mutex::new(()));

    let mut scheduler = JobScheduler::new().await?;
    let job_coordinator = Arc::clone(&coordinator);
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let coordinator = Arc::clone(&job_coordinator);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!(%brand_id, "previous sweep still running; skipping tick");
                return;
            };
            match coordinator.run_sweep(brand_id, customer_id).await {
                Ok(report) => tracing::info!(
                    %brand_id,
                    completed = report.completed,
                    failed = report.failed,
                    "scheduled sweep complete"
                ),
                Err(e) => tracing::error!(%brand_id, error = %e, "scheduled sweep failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(
        %brand_id,
        schedule,
        worker_id = coordinator.worker_id(),
        "watching for unscored answers"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
