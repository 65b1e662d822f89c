use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("database error: {0}")]
    Db(#[from] aivis_db::DbError),

    #[error("extraction engine failed: {0}")]
    Extraction(String),

    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("brand {brand_id} not found for customer {customer_id}")]
    MissingBrand { brand_id: Uuid, customer_id: Uuid },

    #[error("no consolidated analysis for result {result_id}")]
    MissingAnalysis { result_id: i64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ScoringError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScoringError::Extraction(format!("request timed out: {e}"))
        } else {
            ScoringError::Extraction(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(e: serde_json::Error) -> Self {
        ScoringError::MalformedModelOutput(e.to_string())
    }
}
