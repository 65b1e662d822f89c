//! Offline unit tests for aivis-db pool configuration and row types.
//! These tests do not require a live database connection.

use aivis_core::{AnalysisEngineKind, AppConfig, ChainSourceKind, Environment};
use aivis_db::{CollectorResultRow, PoolConfig, PositionMetrics, QueryExecutionRow};
use rust_decimal::Decimal;
use std::path::PathBuf;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        collectors_path: PathBuf::from("./config/collectors.yaml"),
        chain_source: ChainSourceKind::File,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        provider_request_timeout_secs: 120,
        provider_user_agent: "ua".to_string(),
        provider_retry_backoff_base_ms: 500,
        orchestrator_batch_size: 3,
        orchestrator_batch_pause_ms: 1000,
        scoring_batch_size: 50,
        scoring_stale_after_secs: 1800,
        worker_id: "worker-1".to_string(),
        analysis_engine: AnalysisEngineKind::Lexicon,
        llm_api_key: None,
        llm_base_url: "https://api.openai.com/v1".to_string(),
        llm_model: "gpt-4o-mini".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`CollectorResultRow`] has all
/// expected fields with the correct types. No database required.
#[test]
fn collector_result_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = CollectorResultRow {
        id: 1_i64,
        execution_id: Some(9),
        query_id: Uuid::new_v4(),
        brand_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        collector_type: "chatgpt".to_string(),
        query_text: "best crm".to_string(),
        topic: None,
        intent: "comparison".to_string(),
        locale: "en-US".to_string(),
        country: "US".to_string(),
        raw_answer: None,
        citations: vec![],
        urls: vec![],
        provider: None,
        provider_metadata: serde_json::json!({}),
        error_message: None,
        execution_time_ms: None,
        status: "pending".to_string(),
        status_log: serde_json::json!([{"status": "pending"}]),
        scoring_status: None,
        scoring_started_at: None,
        scoring_completed_at: None,
        scoring_error: None,
        scoring_worker_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.status, "pending");
    assert!(row.raw_answer.is_none());
    assert!(row.scoring_status.is_none());
}

#[test]
fn query_execution_row_retry_metadata_is_optional() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = QueryExecutionRow {
        id: 1,
        public_id: Uuid::new_v4(),
        query_id: Uuid::new_v4(),
        brand_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        collectors: vec!["chatgpt".to_string()],
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        error_message: None,
        retry_metadata: None,
        created_at: Utc::now(),
    };

    assert!(row.retry_metadata.is_none());
    assert_eq!(row.collectors, vec!["chatgpt"]);
}

#[test]
fn position_metrics_compare_by_value() {
    let a = PositionMetrics {
        visibility_score: Decimal::new(8500, 2),
        share_of_answers: Decimal::new(5000, 2),
        has_presence: true,
        first_mention_offset: Some(12),
        mention_offsets: vec![12, 40],
        mentions: 2,
        answer_word_count: 30,
    };
    let b = a.clone();
    assert_eq!(a, b);
}
