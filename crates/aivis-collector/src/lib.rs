//! Collection orchestrator: fans queries out to logical collectors and
//! persists one result row per (query, collector).

pub mod chain_source;
pub mod orchestrator;
pub mod store;

use thiserror::Error;

pub use chain_source::{build_chains, ChainSource, DbChainSource, FileChainSource};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use store::{MemoryResultStore, PgResultStore, ResultStore, StoredExecution, StoredResult};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("chain configuration error: {0}")]
    Config(#[from] aivis_core::ConfigError),

    #[error("provider setup failed: {0}")]
    Provider(#[from] aivis_providers::ProviderError),

    #[error("database error: {0}")]
    Db(#[from] aivis_db::DbError),
}
