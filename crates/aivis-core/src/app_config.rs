use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where fallback-chain entries are read from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSourceKind {
    /// Chains come from the `collectors` section of the YAML file.
    File,
    /// Chains come from the `collector_provider_settings` table.
    Database,
}

/// Which engine produces the consolidated analysis in scoring stage 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisEngineKind {
    Lexicon,
    Llm,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub collectors_path: PathBuf,
    pub chain_source: ChainSourceKind,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub provider_request_timeout_secs: u64,
    pub provider_user_agent: String,
    pub provider_retry_backoff_base_ms: u64,
    pub orchestrator_batch_size: usize,
    pub orchestrator_batch_pause_ms: u64,
    pub scoring_batch_size: i64,
    pub scoring_stale_after_secs: u64,
    pub worker_id: String,
    pub analysis_engine: AnalysisEngineKind,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("collectors_path", &self.collectors_path)
            .field("chain_source", &self.chain_source)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "provider_request_timeout_secs",
                &self.provider_request_timeout_secs,
            )
            .field("provider_user_agent", &self.provider_user_agent)
            .field(
                "provider_retry_backoff_base_ms",
                &self.provider_retry_backoff_base_ms,
            )
            .field("orchestrator_batch_size", &self.orchestrator_batch_size)
            .field(
                "orchestrator_batch_pause_ms",
                &self.orchestrator_batch_pause_ms,
            )
            .field("scoring_batch_size", &self.scoring_batch_size)
            .field("scoring_stale_after_secs", &self.scoring_stale_after_secs)
            .field("worker_id", &self.worker_id)
            .field("analysis_engine", &self.analysis_engine)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .finish()
    }
}
