//! Scoring pipeline coordination.
//!
//! A sweep resets stale claims, lists the unscored answers of one brand, and
//! then scores them one at a time: claim, stage 1 (consolidated analysis),
//! stage 2 (positions), stage 3 (sentiments), finalize. Every stage checks
//! for its own output first and skips if it is already stored, so a row that
//! failed halfway resumes where it stopped on the next claim.
//!
//! Workers share nothing but the database. The claim is the only mutual
//! exclusion point, and finalizing writes are conditional on the claiming
//! worker id.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use aivis_core::{AnalysisEngineKind, AppConfig};
use aivis_db::{DbError, ScoringCandidateRow};

use crate::analysis::{ExtractionEngine, LexiconEngine};
use crate::categorizer::Categorize;
use crate::context::BrandContext;
use crate::error::ScoringError;
use crate::llm::{LlmEngine, LlmEngineConfig};
use crate::positions::compute_positions;
use crate::sentiment::sentiment_records;
use crate::store::ScoringStore;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub worker_id: String,
    /// Maximum candidates per sweep.
    pub batch_size: i64,
    /// Claims older than this are considered abandoned.
    pub stale_after: Duration,
}

impl CoordinatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            worker_id: config.worker_id.clone(),
            batch_size: config.scoring_batch_size,
            stale_after: Duration::from_secs(config.scoring_stale_after_secs),
        }
    }

    fn stale_after_secs(&self) -> i64 {
        i64::try_from(self.stale_after.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Outcome counts of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stale_reset: u64,
    pub candidates: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Candidates another worker claimed first.
    pub skipped: usize,
    /// Rows whose claim was recovered by another worker before finalizing.
    pub lost: usize,
}

pub struct Coordinator {
    store: Arc<dyn ScoringStore>,
    engine: Arc<dyn ExtractionEngine>,
    categorizer: Option<Arc<dyn Categorize>>,
    settings: CoordinatorSettings,
}

enum Finalized {
    Completed,
    Failed,
    Lost,
}

impl Coordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ScoringStore>,
        engine: Arc<dyn ExtractionEngine>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            engine,
            categorizer: None,
            settings,
        }
    }

    /// Categorize each citation of a row once it has been scored.
    #[must_use]
    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorize>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.settings.worker_id
    }

    /// Returns abandoned `processing` claims to `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Db`] if the reset fails.
    pub async fn recover_stale(&self) -> Result<u64, ScoringError> {
        let reset = self
            .store
            .reset_stale(self.settings.stale_after_secs())
            .await?;
        if reset > 0 {
            tracing::warn!(
                reset,
                worker_id = %self.settings.worker_id,
                "returned stale scoring claims to pending"
            );
        }
        Ok(reset)
    }

    /// Scores every unscored answer of one brand, up to the batch size.
    ///
    /// Row failures are recorded on the row and counted in the report; they
    /// do not end the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::MissingBrand`] if the brand does not exist for
    /// the customer, or [`ScoringError::Db`] if listing or claiming fails.
    pub async fn run_sweep(
        &self,
        brand_id: Uuid,
        customer_id: Uuid,
    ) -> Result<SweepReport, ScoringError> {
        let mut report = SweepReport {
            stale_reset: self.recover_stale().await?,
            ..SweepReport::default()
        };

        let context = self
            .store
            .load_context(brand_id, customer_id)
            .await?
            .ok_or(ScoringError::MissingBrand {
                brand_id,
                customer_id,
            })?;

        let candidates = self
            .store
            .candidates(brand_id, customer_id, self.settings.batch_size)
            .await?;
        report.candidates = candidates.len();
        tracing::info!(
            %brand_id,
            candidates = candidates.len(),
            competitors = context.competitors.len(),
            worker_id = %self.settings.worker_id,
            "scoring sweep started"
        );

        for candidate in candidates {
            let Some(row) = self
                .store
                .claim(candidate.id, &self.settings.worker_id)
                .await?
            else {
                tracing::debug!(result_id = candidate.id, "claim lost; skipping");
                report.skipped += 1;
                continue;
            };
            report.claimed += 1;

            match self.score_claimed(&row, &context).await {
                Finalized::Completed => {
                    report.completed += 1;
                    self.categorize_citations(&row, &context).await;
                }
                Finalized::Failed => report.failed += 1,
                Finalized::Lost => report.lost += 1,
            }
        }

        tracing::info!(
            %brand_id,
            claimed = report.claimed,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "scoring sweep finished"
        );
        Ok(report)
    }

    async fn score_claimed(&self, row: &ScoringCandidateRow, context: &BrandContext) -> Finalized {
        let worker_id = &self.settings.worker_id;
        match self.run_stages(row, context).await {
            Ok(()) => match self.store.complete(row.id, worker_id).await {
                Ok(()) => {
                    tracing::info!(result_id = row.id, %worker_id, "result scored");
                    Finalized::Completed
                }
                Err(e) => self.finalize_error(row.id, &e),
            },
            Err(stage_error) => {
                let message = stage_error.to_string();
                tracing::error!(
                    result_id = row.id,
                    %worker_id,
                    error = %message,
                    "scoring failed"
                );
                match self.store.fail(row.id, worker_id, &message).await {
                    Ok(()) => Finalized::Failed,
                    Err(e) => match self.finalize_error(row.id, &e) {
                        Finalized::Lost => Finalized::Lost,
                        _ => Finalized::Failed,
                    },
                }
            }
        }
    }

    fn finalize_error(&self, result_id: i64, error: &ScoringError) -> Finalized {
        if matches!(error, ScoringError::Db(DbError::ClaimLost { .. })) {
            tracing::warn!(
                result_id,
                worker_id = %self.settings.worker_id,
                "claim was recovered by another worker; leaving status to the new owner"
            );
            Finalized::Lost
        } else {
            tracing::error!(result_id, error = %error, "failed to finalize scoring status");
            Finalized::Failed
        }
    }

    async fn run_stages(
        &self,
        row: &ScoringCandidateRow,
        context: &BrandContext,
    ) -> Result<(), ScoringError> {
        // Stage 1: consolidated analysis.
        if self.store.get_analysis(row.id).await?.is_some() {
            tracing::debug!(result_id = row.id, "analysis exists; skipping stage 1");
        } else {
            let analysis = self.engine.analyze(&row.raw_answer, context).await?;
            self.store.save_analysis(row.id, &analysis).await?;
            tracing::debug!(result_id = row.id, engine = %analysis.engine, "analysis stored");
        }

        // Stage 2: positions.
        let fact_id = if let Some(fact_id) = self.store.get_fact_id(row.id).await? {
            tracing::debug!(result_id = row.id, fact_id, "metric fact exists; skipping stage 2");
            fact_id
        } else {
            let positions = compute_positions(&row.raw_answer, context);
            self.store.save_positions(row, &positions).await?
        };

        // Stage 3: sentiments, read back from the stored analysis.
        if self.store.has_brand_sentiment(fact_id).await? {
            tracing::debug!(result_id = row.id, fact_id, "sentiment exists; skipping stage 3");
        } else {
            let analysis = self
                .store
                .get_analysis(row.id)
                .await?
                .ok_or(ScoringError::MissingAnalysis { result_id: row.id })?;
            let records = sentiment_records(&analysis.sentiments, context);
            self.store.save_sentiments(fact_id, &records).await?;
        }

        Ok(())
    }

    async fn categorize_citations(&self, row: &ScoringCandidateRow, context: &BrandContext) {
        let Some(categorizer) = &self.categorizer else {
            return;
        };
        let mut names = vec![context.brand_name.as_str()];
        names.extend(context.competitor_names());

        for url in &row.citations {
            if let Err(e) = categorizer.categorize_url(url, &names).await {
                tracing::warn!(
                    result_id = row.id,
                    %url,
                    error = %e,
                    "citation categorization failed"
                );
            }
        }
    }
}

/// Builds the extraction engine selected by `AIVIS_ANALYSIS_ENGINE`.
///
/// # Errors
///
/// Returns [`ScoringError::Config`] if the LLM engine is selected without an
/// API key, or its client cannot be built.
pub fn engine_from_config(config: &AppConfig) -> Result<Arc<dyn ExtractionEngine>, ScoringError> {
    match config.analysis_engine {
        AnalysisEngineKind::Lexicon => Ok(Arc::new(LexiconEngine)),
        AnalysisEngineKind::Llm => {
            let api_key = config.llm_api_key.clone().ok_or_else(|| {
                ScoringError::Config(
                    "AIVIS_LLM_API_KEY is required when AIVIS_ANALYSIS_ENGINE=llm".to_owned(),
                )
            })?;
            let engine = LlmEngine::new(LlmEngineConfig {
                base_url: config.llm_base_url.clone(),
                api_key,
                model: config.llm_model.clone(),
                timeout: Duration::from_secs(config.provider_request_timeout_secs),
            })?;
            Ok(Arc::new(engine))
        }
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
