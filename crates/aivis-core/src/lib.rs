//! Shared configuration and domain types for the aivis workspace.

pub mod app_config;
pub mod collectors;
pub mod config;
pub mod requests;
pub mod status;

use thiserror::Error;

pub use app_config::{AnalysisEngineKind, AppConfig, ChainSourceKind, Environment};
pub use collectors::{
    load_collectors, ChainEntryConfig, CollectorConfig, CollectorsFile, ProviderConfig,
    ProviderKind,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use requests::{QueryExecutionRequest, QueryExecutionResult, QueryIntent, DEFAULT_COUNTRY};
pub use status::{CollectionStatus, ExecutionStatus, ScoringStatus, SentimentLabel};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read collectors file {path}: {source}")]
    CollectorsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse collectors file: {0}")]
    CollectorsFileParse(#[from] serde_yaml::Error),

    #[error("collectors config validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown collection status: {0}")]
    UnknownCollectionStatus(String),

    #[error("unknown scoring status: {0}")]
    UnknownScoringStatus(String),

    #[error("unknown execution status: {0}")]
    UnknownExecutionStatus(String),

    #[error("unknown sentiment label: {0}")]
    UnknownSentimentLabel(String),

    #[error("unknown query intent: {0}")]
    UnknownIntent(String),
}
