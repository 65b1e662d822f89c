//! Scoring pipeline for collected answers.
//!
//! Turns each raw answer in `collector_results` into a consolidated analysis,
//! position metrics for the brand and its competitors, and per-entity
//! sentiment rows. Work is claimed per row so any number of workers can run
//! sweeps side by side.

pub mod analysis;
pub mod categorizer;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod llm;
pub mod positions;
pub mod scorer;
pub mod sentiment;
pub mod store;

pub use analysis::{
    CompetitorSentiment, ConsolidatedAnalysis, EntitySentiment, ExtractionEngine, LexiconEngine,
    ProductMention, SentimentSet,
};
pub use categorizer::{
    domain_of, Categorize, CategoryCache, CitationCategorizer, CitationCategory,
    DomainClassifier, HeuristicClassifier, MemoryCategoryCache, PgCategoryCache,
};
pub use context::{BrandContext, CompetitorRef};
pub use coordinator::{engine_from_config, Coordinator, CoordinatorSettings, SweepReport};
pub use error::ScoringError;
pub use llm::{parse_model_output, LlmEngine, LlmEngineConfig};
pub use positions::{compute_positions, find_mentions, CompetitorPositions, PositionSet};
pub use scorer::lexicon_score;
pub use sentiment::{sentiment_records, SentimentRecord};
pub use store::{PgScoringStore, ScoringStore};
