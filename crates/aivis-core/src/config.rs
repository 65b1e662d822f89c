use crate::app_config::{AnalysisEngineKind, AppConfig, ChainSourceKind, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("AIVIS_ENV", "development"));
    let log_level = or_default("AIVIS_LOG_LEVEL", "info");
    let collectors_path = PathBuf::from(or_default(
        "AIVIS_COLLECTORS_PATH",
        "./config/collectors.yaml",
    ));
    let chain_source = parse_chain_source(&or_default("AIVIS_CHAIN_SOURCE", "file"))
        .ok_or_else(|| invalid("AIVIS_CHAIN_SOURCE", "expected 'file' or 'database'".into()))?;

    let db_max_connections = parse_u32("AIVIS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("AIVIS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("AIVIS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let provider_request_timeout_secs = parse_u64("AIVIS_PROVIDER_REQUEST_TIMEOUT_SECS", "120")?;
    let provider_user_agent = or_default(
        "AIVIS_PROVIDER_USER_AGENT",
        "aivis/0.1 (answer-engine-visibility)",
    );
    let provider_retry_backoff_base_ms = parse_u64("AIVIS_PROVIDER_RETRY_BACKOFF_BASE_MS", "500")?;

    let orchestrator_batch_size = parse_positive_usize("AIVIS_ORCHESTRATOR_BATCH_SIZE", "3")?;
    let orchestrator_batch_pause_ms = parse_u64("AIVIS_ORCHESTRATOR_BATCH_PAUSE_MS", "1000")?;

    let scoring_batch_size = i64::try_from(parse_positive_usize("AIVIS_SCORING_BATCH_SIZE", "50")?)
        .map_err(|e| invalid("AIVIS_SCORING_BATCH_SIZE", e.to_string()))?;
    let scoring_stale_after_secs = parse_u64("AIVIS_SCORING_STALE_AFTER_SECS", "1800")?;

    let worker_id = lookup("AIVIS_WORKER_ID").unwrap_or_else(|_| {
        let host = lookup("HOSTNAME").unwrap_or_else(|_| "aivis".to_string());
        format!("{host}-{}", std::process::id())
    });

    let analysis_engine = parse_analysis_engine(&or_default("AIVIS_ANALYSIS_ENGINE", "lexicon"))
        .ok_or_else(|| invalid("AIVIS_ANALYSIS_ENGINE", "expected 'lexicon' or 'llm'".into()))?;
    let llm_api_key = lookup("AIVIS_LLM_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    if analysis_engine == AnalysisEngineKind::Llm && llm_api_key.is_none() {
        return Err(ConfigError::MissingEnvVar("AIVIS_LLM_API_KEY".to_string()));
    }
    let llm_base_url = or_default("AIVIS_LLM_BASE_URL", "https://api.openai.com/v1");
    let llm_model = or_default("AIVIS_LLM_MODEL", "gpt-4o-mini");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        collectors_path,
        chain_source,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        provider_request_timeout_secs,
        provider_user_agent,
        provider_retry_backoff_base_ms,
        orchestrator_batch_size,
        orchestrator_batch_pause_ms,
        scoring_batch_size,
        scoring_stale_after_secs,
        worker_id,
        analysis_engine,
        llm_api_key,
        llm_base_url,
        llm_model,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_chain_source(s: &str) -> Option<ChainSourceKind> {
    match s {
        "file" => Some(ChainSourceKind::File),
        "database" | "db" => Some(ChainSourceKind::Database),
        _ => None,
    }
}

fn parse_analysis_engine(s: &str) -> Option<AnalysisEngineKind> {
    match s {
        "lexicon" => Some(AnalysisEngineKind::Lexicon),
        "llm" => Some(AnalysisEngineKind::Llm),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
