//! Persistence seam for the scoring coordinator.
//!
//! [`ScoringStore`] is the set of reads and writes the three stages need.
//! [`PgScoringStore`] maps them onto `aivis-db`; the coordinator tests use an
//! in-memory implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use aivis_db::{CompetitorPosition, NewMetricFact, ScoringCandidateRow};

use crate::analysis::{ConsolidatedAnalysis, ProductMention, SentimentSet};
use crate::context::{BrandContext, CompetitorRef};
use crate::error::ScoringError;
use crate::positions::PositionSet;
use crate::sentiment::SentimentRecord;

#[async_trait]
pub trait ScoringStore: Send + Sync {
    /// Returns the number of claims returned to `pending`.
    async fn reset_stale(&self, stale_after_secs: i64) -> Result<u64, ScoringError>;

    async fn candidates(
        &self,
        brand_id: Uuid,
        customer_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ScoringCandidateRow>, ScoringError>;

    /// `Ok(None)` means another worker holds, or has finished, the row.
    async fn claim(
        &self,
        result_id: i64,
        worker_id: &str,
    ) -> Result<Option<ScoringCandidateRow>, ScoringError>;

    /// The brand and its active competitors, or `None` if the brand does not
    /// exist for this customer.
    async fn load_context(
        &self,
        brand_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<BrandContext>, ScoringError>;

    async fn get_analysis(&self, result_id: i64)
        -> Result<Option<ConsolidatedAnalysis>, ScoringError>;

    async fn save_analysis(
        &self,
        result_id: i64,
        analysis: &ConsolidatedAnalysis,
    ) -> Result<(), ScoringError>;

    /// Id of the metric fact for a result, if stage 2 has run.
    async fn get_fact_id(&self, result_id: i64) -> Result<Option<i64>, ScoringError>;

    /// Writes the fact plus the brand and competitor metrics, returning the fact id.
    async fn save_positions(
        &self,
        candidate: &ScoringCandidateRow,
        positions: &PositionSet,
    ) -> Result<i64, ScoringError>;

    async fn has_brand_sentiment(&self, fact_id: i64) -> Result<bool, ScoringError>;

    async fn save_sentiments(
        &self,
        fact_id: i64,
        records: &[SentimentRecord],
    ) -> Result<(), ScoringError>;

    async fn complete(&self, result_id: i64, worker_id: &str) -> Result<(), ScoringError>;

    async fn fail(&self, result_id: i64, worker_id: &str, message: &str)
        -> Result<(), ScoringError>;
}

pub struct PgScoringStore {
    pool: PgPool,
}

impl PgScoringStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoringStore for PgScoringStore {
    async fn reset_stale(&self, stale_after_secs: i64) -> Result<u64, ScoringError> {
        Ok(aivis_db::reset_stale_claims(&self.pool, stale_after_secs).await?)
    }

    async fn candidates(
        &self,
        brand_id: Uuid,
        customer_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ScoringCandidateRow>, ScoringError> {
        Ok(aivis_db::list_scoring_candidates(&self.pool, brand_id, customer_id, limit).await?)
    }

    async fn claim(
        &self,
        result_id: i64,
        worker_id: &str,
    ) -> Result<Option<ScoringCandidateRow>, ScoringError> {
        Ok(aivis_db::claim_for_scoring(&self.pool, result_id, worker_id).await?)
    }

    async fn load_context(
        &self,
        brand_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<BrandContext>, ScoringError> {
        let Some(brand) = aivis_db::get_brand(&self.pool, brand_id, customer_id).await? else {
            return Ok(None);
        };
        let competitors = aivis_db::list_active_competitors(&self.pool, brand_id)
            .await?
            .into_iter()
            .map(|row| CompetitorRef {
                id: row.id,
                name: row.name,
            })
            .collect();
        Ok(Some(BrandContext::new(
            brand.id,
            brand.customer_id,
            brand.name,
            competitors,
        )))
    }

    async fn get_analysis(
        &self,
        result_id: i64,
    ) -> Result<Option<ConsolidatedAnalysis>, ScoringError> {
        let Some(row) = aivis_db::get_consolidated_analysis(&self.pool, result_id).await? else {
            return Ok(None);
        };
        let products: Vec<ProductMention> = serde_json::from_value(row.products)?;
        let sentiments: SentimentSet = serde_json::from_value(row.sentiments)?;
        Ok(Some(ConsolidatedAnalysis {
            engine: row.engine,
            products,
            sentiments,
        }))
    }

    async fn save_analysis(
        &self,
        result_id: i64,
        analysis: &ConsolidatedAnalysis,
    ) -> Result<(), ScoringError> {
        let products = serde_json::to_value(&analysis.products)?;
        let sentiments = serde_json::to_value(&analysis.sentiments)?;
        aivis_db::upsert_consolidated_analysis(
            &self.pool,
            result_id,
            &analysis.engine,
            &products,
            &sentiments,
        )
        .await?;
        Ok(())
    }

    async fn get_fact_id(&self, result_id: i64) -> Result<Option<i64>, ScoringError> {
        Ok(aivis_db::get_metric_fact_for_result(&self.pool, result_id)
            .await?
            .map(|fact| fact.id))
    }

    async fn save_positions(
        &self,
        candidate: &ScoringCandidateRow,
        positions: &PositionSet,
    ) -> Result<i64, ScoringError> {
        let fact = NewMetricFact {
            collector_result_id: candidate.id,
            brand_id: candidate.brand_id,
            customer_id: candidate.customer_id,
            query_id: candidate.query_id,
            collector_type: &candidate.collector_type,
            topic: candidate.topic.as_deref(),
            collected_at: candidate.created_at,
        };
        let competitors: Vec<CompetitorPosition<'_>> = positions
            .competitors
            .iter()
            .map(|c| CompetitorPosition {
                competitor_id: c.competitor_id,
                competitor_name: &c.name,
                metrics: &c.metrics,
            })
            .collect();
        // The fact row marks stage 2 as done, so it commits with its metrics.
        let fact_id =
            aivis_db::save_position_metrics(&self.pool, &fact, &positions.brand, &competitors)
                .await?;
        Ok(fact_id)
    }

    async fn has_brand_sentiment(&self, fact_id: i64) -> Result<bool, ScoringError> {
        Ok(aivis_db::get_brand_sentiment(&self.pool, fact_id)
            .await?
            .is_some())
    }

    async fn save_sentiments(
        &self,
        fact_id: i64,
        records: &[SentimentRecord],
    ) -> Result<(), ScoringError> {
        // Brand row last: its presence marks stage 3 as done.
        for (competitor_id, record) in records
            .iter()
            .filter_map(|r| r.competitor_id.map(|id| (id, r)))
        {
            aivis_db::upsert_competitor_sentiment(
                &self.pool,
                fact_id,
                competitor_id,
                record.label.as_str(),
                record.score,
                &record.positive_sentences,
                &record.negative_sentences,
            )
            .await?;
        }
        for record in records.iter().filter(|r| r.competitor_id.is_none()) {
            aivis_db::upsert_brand_sentiment(
                &self.pool,
                fact_id,
                record.label.as_str(),
                record.score,
                &record.positive_sentences,
                &record.negative_sentences,
            )
            .await?;
        }
        Ok(())
    }

    async fn complete(&self, result_id: i64, worker_id: &str) -> Result<(), ScoringError> {
        Ok(aivis_db::complete_scoring(&self.pool, result_id, worker_id).await?)
    }

    async fn fail(
        &self,
        result_id: i64,
        worker_id: &str,
        message: &str,
    ) -> Result<(), ScoringError> {
        Ok(aivis_db::fail_scoring(&self.pool, result_id, worker_id, message).await?)
    }
}
